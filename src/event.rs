//! Wire contract for invocations: the request payload and the result envelope.
//!
//! ```json
//! { "sourceLocation": "s3://in/report.pdf",
//!   "outputLocation": "s3://out/report.md",
//!   "options": { "preserveTables": false } }
//! ```

use crate::config::PipelineOptions;
use crate::error::{Doc2MdError, ErrorKind};
use crate::output::{OutputLocations, ProcessingReport, ReportStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single conversion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InvocationRequest {
    pub source_location: String,
    /// Defaults to the source location with a `.md` extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    /// Defaults to the Markdown location with a `.metadata.json` suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_location: Option<String>,
    /// Caller-supplied correlation id; a UUID is generated otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub options: PipelineOptions,
}

impl InvocationRequest {
    pub fn new(source_location: impl Into<String>) -> Self {
        Self {
            source_location: source_location.into(),
            output_location: None,
            metadata_location: None,
            request_id: None,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_output(mut self, location: impl Into<String>) -> Self {
        self.output_location = Some(location.into());
        self
    }

    pub fn with_metadata(mut self, location: impl Into<String>) -> Self {
        self.metadata_location = Some(location.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Decode a JSON payload. Any decoding failure is an input error.
    pub fn from_json(payload: &str) -> Result<Self, Doc2MdError> {
        serde_json::from_str(payload).map_err(|e| Doc2MdError::InvalidRequest(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSummary {
    pub total_time: f64,
    pub page_count: usize,
    pub content_length: usize,
    pub table_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBody {
    pub request_id: String,
    pub outputs: OutputLocations,
    pub processing_summary: ProcessingSummary,
    /// Stage name → elapsed seconds.
    pub performance_metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub request_id: String,
    /// `"<Kind>: <message>"`.
    pub error: String,
    pub error_kind: ErrorKind,
    pub processing_time: f64,
}

/// The result envelope returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum InvocationResponse {
    #[serde(rename = "success")]
    Success(SuccessBody),
    #[serde(rename = "error")]
    Error(ErrorBody),
}

impl InvocationResponse {
    pub fn from_report(report: &ProcessingReport) -> Self {
        match (report.status, &report.outputs, &report.error_detail) {
            (ReportStatus::Success, Some(outputs), _) => Self::Success(SuccessBody {
                request_id: report.request_id.clone(),
                outputs: outputs.clone(),
                processing_summary: ProcessingSummary {
                    total_time: report.total_elapsed_seconds,
                    page_count: report.page_count,
                    content_length: report.content_length,
                    table_count: report.table_count,
                },
                performance_metrics: report
                    .stage_timings
                    .iter()
                    .map(|t| (t.stage.to_string(), t.elapsed_seconds))
                    .collect(),
            }),
            (ReportStatus::Failure, _, Some(detail)) => Self::Error(ErrorBody {
                request_id: report.request_id.clone(),
                error: detail.to_string(),
                error_kind: detail.kind,
                processing_time: report.total_elapsed_seconds,
            }),
            _ => Self::Error(ErrorBody {
                request_id: report.request_id.clone(),
                error: format!(
                    "{}: report is inconsistent (status {:?}, outputs {}, error detail {})",
                    ErrorKind::InternalError,
                    report.status,
                    report.outputs.is_some(),
                    report.error_detail.is_some()
                ),
                error_kind: ErrorKind::InternalError,
                processing_time: report.total_elapsed_seconds,
            }),
        }
    }

    /// Build an error envelope for a payload that never became a request.
    pub fn rejected(request_id: impl Into<String>, error: &Doc2MdError) -> Self {
        let info = error.to_info(None);
        Self::Error(ErrorBody {
            request_id: request_id.into(),
            error: info.to_string(),
            error_kind: info.kind,
            processing_time: 0.0,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn request_id(&self) -> &str {
        match self {
            Self::Success(b) => &b.request_id,
            Self::Error(b) => &b.request_id,
        }
    }

    /// HTTP-style status code for handler integrations.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::Error(b) if b.error_kind == ErrorKind::InputError => 400,
            Self::Error(_) => 500,
        }
    }
}

impl From<&ProcessingReport> for InvocationResponse {
    fn from(report: &ProcessingReport) -> Self {
        Self::from_report(report)
    }
}
