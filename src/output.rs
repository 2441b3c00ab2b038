//! Output types: optimisation results and the per-invocation processing report.

use crate::error::ErrorInfo;
use crate::pipeline::StageTiming;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an optimisation rule or decoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    CollapseBlankLines,
    NormalizeHeadings,
    CollapseTableSeparators,
    TrimTrailingWhitespace,
    TrimDocument,
    NormalizeListMarkers,
    TableOfContents,
    MetadataHeader,
}

impl RuleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollapseBlankLines => "collapse_blank_lines",
            Self::NormalizeHeadings => "normalize_headings",
            Self::CollapseTableSeparators => "collapse_table_separators",
            Self::TrimTrailingWhitespace => "trim_trailing_whitespace",
            Self::TrimDocument => "trim_document",
            Self::NormalizeListMarkers => "normalize_list_markers",
            Self::TableOfContents => "table_of_contents",
            Self::MetadataHeader => "metadata_header",
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Character count used for every size in this crate (Unicode scalar values).
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Result of running the Markdown optimiser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub optimized_markdown: String,
    pub applied_rules: Vec<RuleName>,
    pub size_before: usize,
    pub size_after: usize,
}

impl OptimizationResult {
    /// Pass-through result used when optimisation is disabled.
    pub fn identity(raw: &str) -> Self {
        let size = char_len(raw);
        Self {
            optimized_markdown: raw.to_string(),
            applied_rules: Vec::new(),
            size_before: size,
            size_after: size,
        }
    }

    /// `size_after - size_before`; negative when the optimiser shrank the text.
    pub fn size_delta(&self) -> i64 {
        self.size_after as i64 - self.size_before as i64
    }

    /// Percentage removed, rounded to two decimals. `0.0` for empty input.
    pub fn reduction_percent(&self) -> f64 {
        if self.size_before == 0 {
            return 0.0;
        }
        let pct = (self.size_before as f64 - self.size_after as f64) / self.size_before as f64
            * 100.0;
        (pct * 100.0).round() / 100.0
    }

    pub fn summary(&self) -> OptimizationSummary {
        OptimizationSummary {
            applied_rules: self.applied_rules.clone(),
            size_before: self.size_before,
            size_after: self.size_after,
            size_delta: self.size_delta(),
            reduction_percent: self.reduction_percent(),
        }
    }
}

/// The optimisation figures carried on a report (without the Markdown body).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationSummary {
    pub applied_rules: Vec<RuleName>,
    pub size_before: usize,
    pub size_after: usize,
    pub size_delta: i64,
    pub reduction_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Failure,
}

/// Where the artefacts of a successful run were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputLocations {
    pub markdown_location: String,
    pub metadata_location: String,
}

/// Structured outcome of one invocation.
///
/// `error_detail` is `Some` exactly when `status` is
/// [`ReportStatus::Failure`]; use [`ProcessingReport::fail`] to move a report
/// into the failed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingReport {
    pub status: ReportStatus,
    pub request_id: String,
    pub page_count: usize,
    pub table_count: usize,
    pub image_count: usize,
    /// Character length of the delivered Markdown.
    pub content_length: usize,
    /// Size and rule bookkeeping from the Optimizing stage. The optimised
    /// text itself is not carried here: it is written to
    /// `outputs.markdown_location` during Delivering and is never held on
    /// the report.
    pub optimization: OptimizationSummary,
    pub stage_timings: Vec<StageTiming>,
    pub total_elapsed_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<OutputLocations>,
}

impl ProcessingReport {
    /// An empty successful report; fields are filled in as stages complete.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            status: ReportStatus::Success,
            request_id: request_id.into(),
            page_count: 0,
            table_count: 0,
            image_count: 0,
            content_length: 0,
            optimization: OptimizationSummary::default(),
            stage_timings: Vec::new(),
            total_elapsed_seconds: 0.0,
            error_detail: None,
            outputs: None,
        }
    }

    /// Replace the stage timings and recompute the total from them.
    pub fn set_stage_timings(&mut self, timings: Vec<StageTiming>) {
        self.total_elapsed_seconds = timings.iter().map(|t| t.elapsed_seconds).sum();
        self.stage_timings = timings;
    }

    /// Mark the report failed. Outputs are dropped: nothing was delivered.
    pub fn fail(mut self, error: ErrorInfo) -> Self {
        self.status = ReportStatus::Failure;
        self.error_detail = Some(error);
        self.outputs = None;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ReportStatus::Success
    }

    /// Whether `errorDetail` and the total agree with `status` and the timings.
    pub fn is_consistent(&self) -> bool {
        let detail_ok = self.error_detail.is_some() == (self.status == ReportStatus::Failure);
        let sum: f64 = self.stage_timings.iter().map(|t| t.elapsed_seconds).sum();
        detail_ok && (sum - self.total_elapsed_seconds).abs() < 1e-9
    }
}
