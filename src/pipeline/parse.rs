//! Document parsing: the [`DocumentParser`] capability, its lifecycle handle,
//! and a lightweight text-layer implementation.
//!
//! ## Why a trait?
//!
//! The pipeline never cares *how* PDF bytes become blocks. A layout engine, a
//! remote service, or the bundled [`TextLayerParser`] can all sit behind the
//! same interface, and tests can inject a fake without touching a PDF.
//!
//! Parsing is synchronous and may be CPU-heavy; the orchestrator runs it on
//! the blocking pool via `tokio::task::spawn_blocking`.

use crate::config::PipelineOptions;
use crate::document::{Block, ParsedDocument, StructuralDocument};
use crate::error::ParseError;
use lopdf::Document;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Switches forwarded to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub ocr_enabled: bool,
    pub preserve_tables: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from(&PipelineOptions::default())
    }
}

impl From<&PipelineOptions> for ParseOptions {
    fn from(o: &PipelineOptions) -> Self {
        Self {
            ocr_enabled: o.ocr_enabled,
            preserve_tables: o.preserve_tables,
        }
    }
}

/// Anything that can turn document bytes into a [`ParsedDocument`].
///
/// Implementations must be `Send + Sync`: one instance is shared by every
/// concurrent run of an orchestrator.
pub trait DocumentParser: Send + Sync {
    /// Short identifier recorded in the metadata artefact.
    fn name(&self) -> &str;

    /// Load models, open pools, etc. Called once by [`ParserHandle::init`].
    fn warm_up(&self) -> Result<(), ParseError> {
        Ok(())
    }

    /// Parse one document. Blocking.
    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParsedDocument, ParseError>;

    /// Release whatever `warm_up` acquired. Called by [`ParserHandle::shutdown`].
    fn teardown(&self) {}
}

/// An initialised, externally owned parser.
///
/// Created once per process with [`ParserHandle::init`], cloned cheaply into
/// each orchestrator, and torn down explicitly with [`ParserHandle::shutdown`].
#[derive(Clone)]
pub struct ParserHandle {
    parser: Arc<dyn DocumentParser>,
}

impl std::fmt::Debug for ParserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserHandle")
            .field("parser", &self.parser.name())
            .finish()
    }
}

impl ParserHandle {
    /// Warm the parser up and wrap it.
    pub fn init(parser: Arc<dyn DocumentParser>) -> Result<Self, ParseError> {
        parser.warm_up()?;
        info!(parser = parser.name(), "Parser ready");
        Ok(Self { parser })
    }

    pub fn name(&self) -> &str {
        self.parser.name()
    }

    /// A shared reference suitable for moving into a blocking task.
    pub fn parser(&self) -> Arc<dyn DocumentParser> {
        Arc::clone(&self.parser)
    }

    pub fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParsedDocument, ParseError> {
        self.parser.parse(bytes, options)
    }

    pub fn shutdown(self) {
        info!(parser = self.parser.name(), "Parser shutting down");
        self.parser.teardown();
    }
}

// ── Text-layer parser ────────────────────────────────────────────────────────

/// Classifies the embedded text layer of a PDF into blocks using `lopdf`.
///
/// Heuristics per page, applied to groups of lines separated by blank lines:
///
/// - 2+ lines that all split into the same number (≥ 2) of columns on runs of
///   two or more spaces → `Table`
/// - lines starting with a bullet or an ordinal → `List`
/// - a lone short line that is numbered (`2.3 Methods`) or ALL CAPS → `Heading`
/// - everything else → `Paragraph`
///
/// Scanned pages have no text layer. This parser cannot OCR; when OCR is
/// requested such pages are logged and contribute no blocks.
#[derive(Debug, Clone)]
pub struct TextLayerParser {
    /// Longest line (in characters) still considered for a heading.
    pub max_heading_chars: usize,
}

impl Default for TextLayerParser {
    fn default() -> Self {
        Self {
            max_heading_chars: 80,
        }
    }
}

impl DocumentParser for TextLayerParser {
    fn name(&self) -> &str {
        "text-layer"
    }

    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParsedDocument, ParseError> {
        if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
            return Err(ParseError::NotAPdf {
                magic: bytes.iter().take(4).copied().collect(),
            });
        }

        let doc = Document::load_mem(bytes).map_err(|e| ParseError::Corrupt(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(ParseError::Encrypted);
        }

        let pages = doc.get_pages();
        let page_count = pages.len();
        let mut blocks = Vec::new();
        let mut textless = 0usize;

        for &page_num in pages.keys() {
            let text = match doc.extract_text(&[page_num]) {
                Ok(t) => t,
                Err(e) => {
                    warn!(page = page_num, error = %e, "Text extraction failed; page skipped");
                    String::new()
                }
            };
            if text.trim().is_empty() {
                textless += 1;
                if options.ocr_enabled {
                    warn!(
                        page = page_num,
                        "Page has no text layer and this parser cannot OCR"
                    );
                }
                continue;
            }
            blocks.extend(self.blocks_from_text(&text, page_num as usize));
        }

        debug!(
            pages = page_count,
            blocks = blocks.len(),
            textless_pages = textless,
            "Text layer classified"
        );
        Ok(ParsedDocument::new(StructuralDocument::new(blocks), page_count))
    }
}

static RE_COLUMN_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\t+| {2,}").expect("valid column regex"));
static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*+•▪◦]|\d+[.)]|[a-z][.)])\s+\S").expect("valid list regex"));
static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\s+\p{Lu}").expect("valid numbered heading regex"));

impl TextLayerParser {
    /// Classify the text of one page.
    pub fn blocks_from_text(&self, text: &str, page: usize) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut group: Vec<&str> = Vec::new();

        for line in text.lines().map(str::trim_end) {
            if line.trim().is_empty() {
                self.flush_group(&group, page, &mut blocks);
                group.clear();
            } else {
                group.push(line);
            }
        }
        self.flush_group(&group, page, &mut blocks);
        blocks
    }

    fn flush_group(&self, group: &[&str], page: usize, out: &mut Vec<Block>) {
        if group.is_empty() {
            return;
        }
        if let Some(rows) = table_rows(group) {
            out.push(Block::table(rows).on_page(page));
            return;
        }
        if let [line] = group {
            if let Some(level) = self.heading_level(line.trim()) {
                out.push(Block::heading(level, line.trim()).on_page(page));
                return;
            }
        }

        let mut list: Vec<&str> = Vec::new();
        let mut para: Vec<&str> = Vec::new();
        for line in group {
            let trimmed = line.trim();
            if RE_LIST_ITEM.is_match(trimmed) {
                if !para.is_empty() {
                    out.push(Block::paragraph(para.join(" ")).on_page(page));
                    para.clear();
                }
                list.push(trimmed);
            } else {
                if !list.is_empty() {
                    out.push(Block::list(list.join("\n")).on_page(page));
                    list.clear();
                }
                para.push(trimmed);
            }
        }
        if !list.is_empty() {
            out.push(Block::list(list.join("\n")).on_page(page));
        }
        if !para.is_empty() {
            out.push(Block::paragraph(para.join(" ")).on_page(page));
        }
    }

    fn heading_level(&self, line: &str) -> Option<u8> {
        if line.chars().count() > self.max_heading_chars
            || line.ends_with(['.', ',', ';', ':'])
            || RE_LIST_ITEM.is_match(line)
        {
            return None;
        }
        if let Some(caps) = RE_NUMBERED_HEADING.captures(line) {
            let depth = caps[1].split('.').count().clamp(1, 6);
            return u8::try_from(depth).ok();
        }
        let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase()) {
            return Some(2);
        }
        None
    }
}

/// `Some(grid)` when every line splits into the same number (≥ 2) of columns.
fn table_rows(group: &[&str]) -> Option<Vec<Vec<String>>> {
    if group.len() < 2 {
        return None;
    }
    let rows: Vec<Vec<String>> = group
        .iter()
        .map(|line| {
            RE_COLUMN_GAP
                .split(line.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        })
        .collect();
    let width = rows[0].len();
    (width >= 2 && rows.iter().all(|r| r.len() == width)).then_some(rows)
}
