//! Stage observer: per-stage lifecycle events for one pipeline run.
//!
//! Attach an [`Arc<dyn StageObserver>`] via
//! [`crate::orchestrator::PipelineOrchestratorBuilder::observer`] to drive a
//! progress bar, forward events to a channel, or collect test assertions.
//! The orchestrator emits its own `tracing` events regardless.
//!
//! # Example
//!
//! ```rust
//! use doc2md::{Stage, StageObserver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! impl StageObserver for Counter {
//!     fn on_stage_complete(&self, _stage: Stage, _elapsed_seconds: f64) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::ErrorInfo;
use crate::output::ProcessingReport;
use crate::pipeline::Stage;
use std::sync::Arc;

/// Called by the orchestrator as a request moves through its stages.
///
/// Every method has a no-op default. Concurrent runs sharing one observer
/// call it from different tasks, so implementations must synchronise any
/// mutable state themselves.
pub trait StageObserver: Send + Sync {
    /// Called once, after the request id is fixed and before any stage runs.
    fn on_pipeline_start(&self, request_id: &str) {
        let _ = request_id;
    }

    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_seconds: f64) {
        let _ = (stage, elapsed_seconds);
    }

    /// Called at most once per run; no further stage events follow.
    fn on_stage_failed(&self, stage: Stage, error: &ErrorInfo) {
        let _ = (stage, error);
    }

    /// Called exactly once with the final report, success or failure.
    fn on_pipeline_complete(&self, report: &ProcessingReport) {
        let _ = report;
    }
}

/// Default observer.
pub struct NoopStageObserver;

impl StageObserver for NoopStageObserver {}

pub type SharedObserver = Arc<dyn StageObserver>;
