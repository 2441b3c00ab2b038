//! Pipeline stages and the pure transformations they run.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ parse ──▶ render ──▶ optimize ──▶ analyze
//! (store)  (parser)  (blocks→md)  (6 rules)   (report + metadata)
//! ```
//!
//! 1. [`parse`]    — the [`DocumentParser`] capability and the lopdf-backed
//!    [`TextLayerParser`]; blocking, run via `spawn_blocking`
//! 2. [`render`]   — naive block rendering and table flattening
//! 3. [`optimize`] — the ordered Markdown clean-up rules and decorations
//! 4. [`analyze`]  — report assembly, content statistics, metadata document
//! 5. [`stage`]    — the run state machine and stage timings
//!
//! Only parsing blocks. Everything from `render` on is pure and thread-safe.

pub mod analyze;
pub mod optimize;
pub mod parse;
pub mod render;
pub mod stage;

pub use analyze::{analyze, content_statistics, metadata_document, MetadataDocument};
pub use optimize::optimize;
pub use parse::{DocumentParser, ParseOptions, ParserHandle, TextLayerParser};
pub use render::render_markdown;
pub use stage::{PipelineState, Stage, StageTimer, StageTiming};
