//! The structural document contract between a parser and the pipeline.
//!
//! A parser emits an ordered list of [`Block`]s; everything downstream
//! (rendering, counting, analysis) reads this representation only.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    Heading,
    Paragraph,
    Table,
    Image,
    List,
    Other,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Heading => "Heading",
            Self::Paragraph => "Paragraph",
            Self::Table => "Table",
            Self::Image => "Image",
            Self::List => "List",
            Self::Other => "Other",
        };
        f.write_str(s)
    }
}

/// One unit of document structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub kind: BlockKind,
    /// Raw text. For tables this is usually empty; for images, the caption.
    #[serde(default)]
    pub text: String,
    /// Row-major cell grid. Only ever `Some` on table blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_data: Option<Vec<Vec<String>>>,
    /// Heading depth (1-6) when the parser knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// 1-indexed source page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl Block {
    fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            table_data: None,
            level: None,
            page: None,
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self {
            level: Some(level),
            ..Self::new(BlockKind::Heading, text)
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockKind::Paragraph, text)
    }

    pub fn list(text: impl Into<String>) -> Self {
        Self::new(BlockKind::List, text)
    }

    pub fn image(caption: impl Into<String>) -> Self {
        Self::new(BlockKind::Image, caption)
    }

    pub fn other(text: impl Into<String>) -> Self {
        Self::new(BlockKind::Other, text)
    }

    /// Build a table block, padding short rows with empty cells so the grid
    /// is rectangular.
    pub fn table(rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self {
            table_data: Some(rows),
            ..Self::new(BlockKind::Table, "")
        }
    }

    pub fn on_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }
}

/// Ordered blocks produced by a parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralDocument {
    pub blocks: Vec<Block>,
}

impl StructuralDocument {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn count(&self, kind: BlockKind) -> usize {
        self.blocks.iter().filter(|b| b.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Check the block invariants: table blocks carry a rectangular grid,
    /// other blocks carry none, heading levels stay within 1-6.
    pub fn validate(&self) -> Result<(), DocumentError> {
        for (index, block) in self.blocks.iter().enumerate() {
            match (block.kind, &block.table_data) {
                (BlockKind::Table, None) => {
                    return Err(DocumentError::MissingTableData { index });
                }
                (BlockKind::Table, Some(rows)) => {
                    let expected = rows.first().map(Vec::len).unwrap_or(0);
                    if let Some((row, r)) =
                        rows.iter().enumerate().find(|(_, r)| r.len() != expected)
                    {
                        return Err(DocumentError::RaggedTable {
                            index,
                            row,
                            found: r.len(),
                            expected,
                        });
                    }
                }
                (kind, Some(_)) => {
                    return Err(DocumentError::UnexpectedTableData {
                        index,
                        kind: kind.to_string(),
                    });
                }
                (_, None) => {}
            }
            if let Some(level) = block.level {
                if block.kind == BlockKind::Heading && !(1..=6).contains(&level) {
                    return Err(DocumentError::InvalidHeadingLevel { index, level });
                }
            }
        }
        Ok(())
    }
}

/// Everything a parser hands back for one source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    pub document: StructuralDocument,
    /// Page count reported by the parser; never derived from blocks.
    pub page_count: usize,
}

impl ParsedDocument {
    pub fn new(document: StructuralDocument, page_count: usize) -> Self {
        Self {
            document,
            page_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(row: &[&str]) -> Vec<String> {
        row.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn table_constructor_pads_ragged_rows() {
        let b = Block::table(vec![cells(&["a", "b", "c"]), cells(&["1"])]);
        let rows = b.table_data.unwrap();
        assert_eq!(rows[1], cells(&["1", "", ""]));
    }

    #[test]
    fn validate_accepts_well_formed_document() {
        let doc = StructuralDocument::new(vec![
            Block::heading(1, "Title"),
            Block::paragraph("Body"),
            Block::table(vec![cells(&["a", "b"]), cells(&["1", "2"])]),
            Block::image("Figure 1"),
        ]);
        assert_eq!(doc.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_ragged_table() {
        let mut block = Block::table(vec![cells(&["a", "b"])]);
        block.table_data = Some(vec![cells(&["a", "b"]), cells(&["1"])]);
        let doc = StructuralDocument::new(vec![Block::paragraph("x"), block]);
        assert!(matches!(
            doc.validate(),
            Err(DocumentError::RaggedTable {
                index: 1,
                row: 1,
                found: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn validate_rejects_table_data_on_paragraph() {
        let mut block = Block::paragraph("x");
        block.table_data = Some(vec![]);
        let doc = StructuralDocument::new(vec![block]);
        assert!(matches!(
            doc.validate(),
            Err(DocumentError::UnexpectedTableData { index: 0, .. })
        ));
    }

    #[test]
    fn validate_rejects_table_without_grid() {
        let mut block = Block::table(vec![]);
        block.table_data = None;
        let doc = StructuralDocument::new(vec![block]);
        assert_eq!(
            doc.validate(),
            Err(DocumentError::MissingTableData { index: 0 })
        );
    }

    #[test]
    fn validate_rejects_heading_level_out_of_range() {
        let doc = StructuralDocument::new(vec![Block::heading(9, "deep")]);
        assert_eq!(
            doc.validate(),
            Err(DocumentError::InvalidHeadingLevel { index: 0, level: 9 })
        );
    }

    #[test]
    fn count_by_kind() {
        let doc = StructuralDocument::new(vec![
            Block::table(vec![cells(&["a"])]),
            Block::table(vec![cells(&["b"])]),
            Block::image(""),
            Block::paragraph("p"),
        ]);
        assert_eq!(doc.count(BlockKind::Table), 2);
        assert_eq!(doc.count(BlockKind::Image), 1);
        assert_eq!(doc.count(BlockKind::Heading), 0);
    }

    #[test]
    fn block_deserialises_camel_case() {
        let json = r#"{"kind":"Table","tableData":[["a","b"]]}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(block.kind, BlockKind::Table);
        assert_eq!(block.table_data.unwrap()[0], cells(&["a", "b"]));
    }
}
