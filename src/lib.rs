//! # doc2md
//!
//! Post-parse PDF → Markdown pipeline: fetch a document, hand it to a parser,
//! render and clean up the Markdown, analyse it, and deliver the Markdown plus
//! a JSON metadata artefact.
//!
//! ## Pipeline Overview
//!
//! ```text
//! InvocationRequest
//!  │
//!  ├─ 1. Fetching    read the source from an ObjectStore (s3/mem/http/file)
//!  ├─ 2. Parsing     DocumentParser → StructuralDocument (spawn_blocking)
//!  ├─ 3. Optimizing  render blocks, apply 6 clean-up rules, decorations
//!  ├─ 4. Analyzing   ProcessingReport + content statistics
//!  └─ 5. Delivering  write <name>.md and <name>.metadata.json
//! ```
//!
//! Every run yields a [`ProcessingReport`]; failures are data, not `Err`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2md::{
//!     InvocationRequest, LocalStore, ParserHandle, PipelineOptions, PipelineOrchestrator,
//!     TextLayerParser,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let parser = ParserHandle::init(Arc::new(TextLayerParser::default()))?;
//!     let orchestrator = PipelineOrchestrator::builder(parser.clone(), Arc::new(LocalStore::new())).build();
//!
//!     let request = InvocationRequest::new("report.pdf")
//!         .with_options(PipelineOptions::builder().generate_toc(true).build());
//!     let report = orchestrator.run(&request).await;
//!     eprintln!("{:?}: {} pages", report.status, report.page_count);
//!
//!     parser.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `s3`    | off     | Enables [`storage::S3Store`] via `aws-sdk-s3` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder, PipelineOptions, PipelineOptionsBuilder};
pub use document::{Block, BlockKind, ParsedDocument, StructuralDocument};
pub use error::{Doc2MdError, DocumentError, ErrorInfo, ErrorKind, ParseError, StorageError};
pub use event::{InvocationRequest, InvocationResponse};
pub use orchestrator::{PipelineOrchestrator, PipelineOrchestratorBuilder};
pub use output::{OptimizationResult, OptimizationSummary, ProcessingReport, ReportStatus, RuleName};
pub use pipeline::{
    analyze, optimize, DocumentParser, ParseOptions, ParserHandle, Stage, StageTiming,
    TextLayerParser,
};
pub use progress::{NoopStageObserver, SharedObserver, StageObserver};
pub use storage::{HttpStore, LocalStore, MemoryStore, ObjectStore, StorageLocation, StoreRouter};
