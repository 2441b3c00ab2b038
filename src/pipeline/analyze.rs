//! Metadata analysis: turn parse output, optimised Markdown and stage timings
//! into the [`ProcessingReport`] and the delivered [`MetadataDocument`].
//!
//! Everything here is pure; wall-clock values (`processed_at`) are passed in
//! by the caller.

use crate::config::PipelineOptions;
use crate::document::{Block, BlockKind, ParsedDocument, StructuralDocument};
use crate::output::{char_len, OptimizationResult, ProcessingReport, RuleName};
use crate::pipeline::StageTiming;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Build the report for a run that reached the Analyzing stage.
///
/// `page_count` passes through from the parser, table/image counts come from
/// block kinds, `content_length` is the character length of the optimised
/// Markdown and the total is the sum of `timings`.
pub fn analyze(
    request_id: &str,
    parsed: &ParsedDocument,
    optimization: &OptimizationResult,
    timings: &[StageTiming],
) -> ProcessingReport {
    let mut report = ProcessingReport::new(request_id);
    report.page_count = parsed.page_count;
    report.table_count = parsed.document.count(BlockKind::Table);
    report.image_count = parsed.document.count(BlockKind::Image);
    report.content_length = char_len(&optimization.optimized_markdown);
    report.optimization = optimization.summary();
    report.set_stage_timings(timings.to_vec());
    report
}

// ── Content statistics ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCounts {
    pub h1: usize,
    pub h2: usize,
    pub h3: usize,
    pub h4: usize,
    pub h5: usize,
    pub h6: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCounts {
    pub unordered: usize,
    pub ordered: usize,
}

/// Regex-level counts over a Markdown string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStatistics {
    pub characters: usize,
    pub words: usize,
    pub lines: usize,
    pub headings: HeadingCounts,
    pub lists: ListCounts,
    pub table_rows: usize,
    pub links: usize,
    pub images: usize,
    pub code_blocks: usize,
    pub inline_code: usize,
    /// `$$ … $$` display-math blocks.
    pub formulas: usize,
}

static RE_HEADING_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]+\S").expect("valid heading regex"));
static RE_UNORDERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+\S").expect("valid list regex"));
static RE_ORDERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+\S").expect("valid list regex"));
static RE_TABLE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\|.+\|[ \t]*$").expect("valid table regex"));
static RE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));
static RE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("valid image regex"));
static RE_INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`[^`\n]+`").expect("valid inline code regex"));

pub fn content_statistics(markdown: &str) -> ContentStatistics {
    let mut headings = HeadingCounts::default();
    for caps in RE_HEADING_LEVEL.captures_iter(markdown) {
        match caps[1].len() {
            1 => headings.h1 += 1,
            2 => headings.h2 += 1,
            3 => headings.h3 += 1,
            4 => headings.h4 += 1,
            5 => headings.h5 += 1,
            _ => headings.h6 += 1,
        }
        headings.total += 1;
    }

    let images = RE_IMAGE.find_iter(markdown).count();
    ContentStatistics {
        characters: char_len(markdown),
        words: markdown.split_whitespace().count(),
        lines: markdown.lines().count(),
        headings,
        lists: ListCounts {
            unordered: RE_UNORDERED.find_iter(markdown).count(),
            ordered: RE_ORDERED.find_iter(markdown).count(),
        },
        table_rows: RE_TABLE_ROW.find_iter(markdown).count(),
        // Image syntax contains link syntax; do not count it twice.
        links: RE_LINK.find_iter(markdown).count().saturating_sub(images),
        images,
        code_blocks: markdown.matches("```").count() / 2,
        inline_code: markdown
            .split("```")
            .step_by(2)
            .map(|outside| RE_INLINE_CODE.find_iter(outside).count())
            .sum(),
        formulas: markdown.matches("$$").count() / 2,
    }
}

// ── Content richness ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentRichness {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl fmt::Display for ContentRichness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::VeryLow => "Very Low",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        };
        f.write_str(s)
    }
}

/// Score structure and volume: tables +2, formulas +2, headings +1,
/// lists +1, and +1/+2/+3 for more than 1k/5k/10k words.
pub fn content_richness(stats: &ContentStatistics, table_count: usize) -> ContentRichness {
    let mut score = 0;
    if table_count > 0 {
        score += 2;
    }
    if stats.formulas > 0 {
        score += 2;
    }
    if stats.headings.total > 0 {
        score += 1;
    }
    if stats.lists.unordered + stats.lists.ordered > 0 {
        score += 1;
    }
    score += match stats.words {
        w if w > 10_000 => 3,
        w if w > 5_000 => 2,
        w if w > 1_000 => 1,
        _ => 0,
    };

    match score {
        s if s >= 7 => ContentRichness::VeryHigh,
        s if s >= 5 => ContentRichness::High,
        s if s >= 3 => ContentRichness::Medium,
        s if s >= 1 => ContentRichness::Low,
        _ => ContentRichness::VeryLow,
    }
}

/// Words processed per second of total pipeline time, two decimals.
pub fn words_per_second(words: usize, total_seconds: f64) -> f64 {
    if total_seconds <= 0.0 {
        return 0.0;
    }
    (words as f64 / total_seconds * 100.0).round() / 100.0
}

// ── Structure analysis ───────────────────────────────────────────────────────

/// Counts taken from the parsed blocks rather than the rendered Markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCounts {
    pub headings: usize,
    pub paragraphs: usize,
    pub lists: usize,
    pub tables: usize,
    pub images: usize,
    pub other: usize,
}

pub fn block_counts(doc: &StructuralDocument) -> BlockCounts {
    let mut counts = BlockCounts::default();
    for block in &doc.blocks {
        let slot = match block.kind {
            BlockKind::Heading => &mut counts.headings,
            BlockKind::Paragraph => &mut counts.paragraphs,
            BlockKind::List => &mut counts.lists,
            BlockKind::Table => &mut counts.tables,
            BlockKind::Image => &mut counts.images,
            BlockKind::Other => &mut counts.other,
        };
        *slot += 1;
    }
    counts
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBreakdown {
    pub page_number: usize,
    pub element_count: usize,
    pub table_count: usize,
    pub heading_count: usize,
    pub paragraph_count: usize,
    pub character_count: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub page_number: usize,
    /// 1-based position of the table among its page's blocks.
    pub element_number: usize,
    pub row_count: usize,
    pub column_count: usize,
}

/// Page of every block. A block without a page hint stays on the page of
/// the block before it; leading blocks without one land on page 1.
fn resolved_pages(doc: &StructuralDocument) -> Vec<usize> {
    let mut current = 1;
    doc.blocks
        .iter()
        .map(|block| {
            if let Some(page) = block.page.filter(|&p| p > 0) {
                current = page;
            }
            current
        })
        .collect()
}

/// Text a block contributes to character and word counts.
fn block_text(block: &Block) -> String {
    match &block.table_data {
        Some(rows) => rows
            .iter()
            .flatten()
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        None => block.text.trim().to_string(),
    }
}

/// Per-page element counts for pages `1..=max(page_count, last page seen)`.
/// Pages without blocks are listed with zero counts.
pub fn page_breakdown(doc: &StructuralDocument, page_count: usize) -> Vec<PageBreakdown> {
    let pages = resolved_pages(doc);
    let last = pages.iter().copied().max().unwrap_or(0).max(page_count);
    let mut breakdown: Vec<PageBreakdown> = (1..=last)
        .map(|page_number| PageBreakdown {
            page_number,
            ..PageBreakdown::default()
        })
        .collect();

    for (block, page) in doc.blocks.iter().zip(pages) {
        let entry = &mut breakdown[page - 1];
        entry.element_count += 1;
        match block.kind {
            BlockKind::Table => entry.table_count += 1,
            BlockKind::Heading => entry.heading_count += 1,
            BlockKind::Paragraph => entry.paragraph_count += 1,
            _ => {}
        }
        let text = block_text(block);
        entry.character_count += char_len(&text);
        entry.word_count += text.split_whitespace().count();
    }
    breakdown
}

/// One entry per table block, in document order.
pub fn table_analysis(doc: &StructuralDocument) -> Vec<TableInfo> {
    let mut seen_on_page: BTreeMap<usize, usize> = BTreeMap::new();
    let mut tables = Vec::new();
    for (block, page) in doc.blocks.iter().zip(resolved_pages(doc)) {
        let position = seen_on_page.entry(page).or_insert(0);
        *position += 1;
        if block.kind != BlockKind::Table {
            continue;
        }
        let rows = block.table_data.as_deref().unwrap_or_default();
        tables.push(TableInfo {
            page_number: page,
            element_number: *position,
            row_count: rows.len(),
            column_count: rows.first().map(Vec::len).unwrap_or(0),
        });
    }
    tables
}

// ── Metadata document ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub request_id: String,
    pub source_location: String,
    pub markdown_location: String,
    pub processed_at: DateTime<Utc>,
    pub total_processing_seconds: f64,
    /// Stage name → elapsed seconds.
    pub processing_breakdown: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysis {
    pub page_count: usize,
    pub table_count: usize,
    pub image_count: usize,
    pub content_length: usize,
    pub block_counts: BlockCounts,
    pub statistics: ContentStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownOutput {
    pub original_length: usize,
    pub optimized_length: usize,
    pub size_delta: i64,
    /// Percent of characters removed.
    pub optimization_ratio: f64,
    pub optimizations_applied: Vec<RuleName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIndicators {
    pub has_tables: bool,
    pub has_headings: bool,
    pub has_lists: bool,
    pub has_images: bool,
    pub has_formulas: bool,
    pub content_richness: ContentRichness,
    pub words_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub processor: String,
    pub version: String,
    pub parser: String,
}

/// The JSON artefact delivered next to the Markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    pub document_info: DocumentInfo,
    pub content_analysis: ContentAnalysis,
    pub page_breakdown: Vec<PageBreakdown>,
    pub table_analysis: Vec<TableInfo>,
    pub markdown_output: MarkdownOutput,
    pub processing_options: PipelineOptions,
    pub quality_indicators: QualityIndicators,
    pub system_info: SystemInfo,
}

/// Inputs to [`metadata_document`] that do not live on the report.
#[derive(Debug, Clone)]
pub struct MetadataContext<'a> {
    /// The parsed structure behind the report.
    pub document: &'a StructuralDocument,
    pub source_location: &'a str,
    pub markdown_location: &'a str,
    pub processed_at: DateTime<Utc>,
    pub options: PipelineOptions,
    pub parser: &'a str,
}

pub fn metadata_document(
    report: &ProcessingReport,
    markdown: &str,
    ctx: &MetadataContext<'_>,
) -> MetadataDocument {
    let stats = content_statistics(markdown);
    let richness = content_richness(&stats, report.table_count);

    MetadataDocument {
        document_info: DocumentInfo {
            request_id: report.request_id.clone(),
            source_location: ctx.source_location.to_string(),
            markdown_location: ctx.markdown_location.to_string(),
            processed_at: ctx.processed_at,
            total_processing_seconds: report.total_elapsed_seconds,
            processing_breakdown: report
                .stage_timings
                .iter()
                .map(|t| (t.stage.to_string(), t.elapsed_seconds))
                .collect(),
        },
        quality_indicators: QualityIndicators {
            has_tables: report.table_count > 0,
            has_headings: stats.headings.total > 0,
            has_lists: stats.lists.unordered + stats.lists.ordered > 0,
            has_images: report.image_count > 0,
            has_formulas: stats.formulas > 0,
            content_richness: richness,
            words_per_second: words_per_second(stats.words, report.total_elapsed_seconds),
        },
        content_analysis: ContentAnalysis {
            page_count: report.page_count,
            table_count: report.table_count,
            image_count: report.image_count,
            content_length: report.content_length,
            block_counts: block_counts(ctx.document),
            statistics: stats,
        },
        page_breakdown: page_breakdown(ctx.document, report.page_count),
        table_analysis: table_analysis(ctx.document),
        markdown_output: MarkdownOutput {
            original_length: report.optimization.size_before,
            optimized_length: report.optimization.size_after,
            size_delta: report.optimization.size_delta,
            optimization_ratio: report.optimization.reduction_percent,
            optimizations_applied: report.optimization.applied_rules.clone(),
        },
        processing_options: ctx.options,
        system_info: SystemInfo {
            processor: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            parser: ctx.parser.to_string(),
        },
    }
}

/// Human-readable Markdown summary of a metadata document.
pub fn summary_text(meta: &MetadataDocument) -> String {
    let info = &meta.document_info;
    let content = &meta.content_analysis;
    let output = &meta.markdown_output;

    let mut lines = vec![
        "# Document Processing Summary".to_string(),
        String::new(),
        format!("**Source**: {}", info.source_location),
        format!("**Markdown**: {}", info.markdown_location),
        format!(
            "**Processed**: {}",
            info.processed_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        format!("**Total Time**: {:.2}s", info.total_processing_seconds),
        String::new(),
        "## Content Analysis".to_string(),
        format!("- **Pages**: {}", content.page_count),
        format!("- **Words**: {}", content.statistics.words),
        format!("- **Characters**: {}", content.content_length),
        format!("- **Tables**: {}", content.table_count),
        format!("- **Images**: {}", content.image_count),
        format!("- **Headings**: {}", content.statistics.headings.total),
        String::new(),
        "## Output Quality".to_string(),
        format!("- **Markdown Length**: {} characters", output.optimized_length),
        format!("- **Optimization**: {}% reduction", output.optimization_ratio),
        format!(
            "- **Optimizations Applied**: {}",
            output.optimizations_applied.len()
        ),
        format!(
            "- **Content Richness**: {}",
            meta.quality_indicators.content_richness
        ),
        String::new(),
        "## Processing Performance".to_string(),
    ];
    for (stage, secs) in &info.processing_breakdown {
        lines.push(format!("- **{}**: {secs:.2}s", title_case(stage)));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
