//! Naive block rendering: [`StructuralDocument`] → raw Markdown.
//!
//! Paragraph text is copied as-is and blocks are joined with one blank line.
//! Whatever the parser left behind (double blank lines, trailing spaces, odd
//! bullets) reaches the optimiser unchanged.

use crate::document::{Block, BlockKind, StructuralDocument};

/// Placeholder emitted for image blocks.
pub const IMAGE_PLACEHOLDER: &str = "<!-- image -->";

/// Render every block and join the non-empty results with a blank line.
pub fn render_markdown(doc: &StructuralDocument) -> String {
    let rendered: Vec<String> = doc
        .blocks
        .iter()
        .map(render_block)
        .filter(|s| !s.is_empty())
        .collect();
    if rendered.is_empty() {
        return String::new();
    }
    let mut out = rendered.join("\n\n");
    out.push('\n');
    out
}

pub fn render_block(block: &Block) -> String {
    match block.kind {
        BlockKind::Heading => {
            let level = block.level.unwrap_or(2).clamp(1, 6) as usize;
            format!("{} {}", "#".repeat(level), block.text.trim())
        }
        BlockKind::Table => block
            .table_data
            .as_deref()
            .map(render_table)
            .unwrap_or_default(),
        BlockKind::Image => {
            let caption = block.text.trim();
            if caption.is_empty() {
                IMAGE_PLACEHOLDER.to_string()
            } else {
                format!("{IMAGE_PLACEHOLDER}\n*{caption}*")
            }
        }
        BlockKind::List => render_list(&block.text),
        BlockKind::Paragraph | BlockKind::Other => block.text.clone(),
    }
}

/// GFM table: first row is the header, then one separator row, then the body.
fn render_table(rows: &[Vec<String>]) -> String {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    let row_line = |row: &[String]| {
        let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(row_line(&rows[0]));
    lines.push(format!("|{}", "---|".repeat(width)));
    lines.extend(rows[1..].iter().map(|r| row_line(r)));
    lines.join("\n")
}

fn escape_cell(cell: &str) -> String {
    cell.trim().replace('|', "\\|").replace('\n', " ")
}

/// One item per non-blank line. Lines that already carry a bullet or an
/// ordinal keep it; the rest get `- `.
fn render_list(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            if has_list_marker(line.trim_start()) {
                line.to_string()
            } else {
                format!("- {}", line.trim())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn has_list_marker(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some('-' | '*' | '+' | '•') => chars.next().is_some_and(char::is_whitespace),
        Some(c) if c.is_ascii_digit() => {
            let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
            rest.starts_with(". ") || rest.starts_with(") ")
        }
        _ => false,
    }
}

/// Replace every table block with a paragraph holding one line per row
/// (cells separated by spaces). Used when tables are not preserved.
pub fn flatten_tables(doc: &StructuralDocument) -> StructuralDocument {
    let blocks = doc
        .blocks
        .iter()
        .map(|block| match (&block.kind, &block.table_data) {
            (BlockKind::Table, Some(rows)) => {
                let text = rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|c| c.trim())
                            .filter(|c| !c.is_empty())
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                Block {
                    page: block.page,
                    ..Block::paragraph(text)
                }
            }
            _ => block.clone(),
        })
        .collect();
    StructuralDocument::new(blocks)
}
