//! Pipeline orchestration: one invocation from source bytes to delivered
//! Markdown and metadata.
//!
//! ```text
//! InvocationRequest
//!   │ resolve locations, request id      (InputError → zero timings)
//!   ▼
//! Fetching    store.get(source)
//! Parsing     parser.parse(bytes)          spawn_blocking
//! Optimizing  validate → render → optimise → decorate
//! Analyzing   analyze(...) → ProcessingReport
//! Delivering  store.put(markdown), store.put(metadata JSON)
//!   ▼
//! ProcessingReport (never an Err)
//! ```
//!
//! The first failing stage ends the run. Its timing is still recorded and
//! its error becomes the report's `errorDetail`.

use crate::config::{OrchestratorConfig, PipelineOptions};
use crate::document::ParsedDocument;
use crate::error::Doc2MdError;
use crate::event::{InvocationRequest, InvocationResponse};
use crate::output::{char_len, OptimizationResult, OutputLocations, ProcessingReport, RuleName};
use crate::pipeline::analyze::{analyze, metadata_document, MetadataContext};
use crate::pipeline::optimize::{
    document_title, metadata_header, optimize, prepend_table_of_contents,
};
use crate::pipeline::render::{flatten_tables, render_markdown};
use crate::pipeline::{ParseOptions, ParserHandle, PipelineState, Stage, StageTimer};
use crate::progress::{NoopStageObserver, SharedObserver};
use crate::storage::{ObjectStore, StorageLocation, CONTENT_TYPE_JSON, CONTENT_TYPE_MARKDOWN};
use chrono::Utc;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sequences the five stages for each request.
///
/// Cheap to clone: every field is shared. Concurrent `run` calls on one
/// orchestrator keep their state on their own stacks.
///
/// # Example
/// ```rust,no_run
/// use doc2md::{InvocationRequest, LocalStore, ParserHandle, PipelineOrchestrator, TextLayerParser};
/// use std::sync::Arc;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let parser = ParserHandle::init(Arc::new(TextLayerParser::default()))?;
/// let orchestrator = PipelineOrchestrator::builder(parser, Arc::new(LocalStore::new())).build();
///
/// let report = orchestrator.run(&InvocationRequest::new("paper.pdf")).await;
/// println!("{} pages, {} chars", report.page_count, report.content_length);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PipelineOrchestrator {
    parser: ParserHandle,
    store: Arc<dyn ObjectStore>,
    observer: SharedObserver,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("parser", &self.parser)
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`PipelineOrchestrator`].
pub struct PipelineOrchestratorBuilder {
    parser: ParserHandle,
    store: Arc<dyn ObjectStore>,
    observer: SharedObserver,
    config: OrchestratorConfig,
}

impl PipelineOrchestratorBuilder {
    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Use a config produced by [`OrchestratorConfig::builder`].
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> PipelineOrchestrator {
        PipelineOrchestrator {
            parser: self.parser,
            store: self.store,
            observer: self.observer,
            config: self.config,
        }
    }
}

/// Resolved addresses for one run.
#[derive(Debug, Clone)]
struct Locations {
    source: StorageLocation,
    markdown: StorageLocation,
    metadata: StorageLocation,
}

/// Per-run, read-only context.
struct Run {
    request_id: String,
    options: PipelineOptions,
    locations: Locations,
}

/// Data handed from one stage to the next.
enum InFlight {
    Nothing,
    Source(Vec<u8>),
    Parsed(ParsedDocument),
    Optimized(ParsedDocument, OptimizationResult),
    Analyzed(ParsedDocument, OptimizationResult),
    Delivered,
}

impl PipelineOrchestrator {
    pub fn builder(parser: ParserHandle, store: Arc<dyn ObjectStore>) -> PipelineOrchestratorBuilder {
        PipelineOrchestratorBuilder {
            parser,
            store,
            observer: Arc::new(NoopStageObserver),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn parser(&self) -> &ParserHandle {
        &self.parser
    }

    /// Decode a JSON payload, run it, and wrap the outcome in the wire envelope.
    pub async fn run_event(&self, payload: &str) -> InvocationResponse {
        match InvocationRequest::from_json(payload) {
            Ok(request) => InvocationResponse::from_report(&self.run(&request).await),
            Err(e) => {
                let request_id = new_request_id();
                warn!(
                    request_id = %request_id,
                    action = "request_rejected",
                    error_kind = %e.kind(),
                    error = %e,
                    "Could not decode invocation payload"
                );
                InvocationResponse::rejected(request_id, &e)
            }
        }
    }

    /// Process one request. Every failure is folded into the report.
    pub async fn run(&self, request: &InvocationRequest) -> ProcessingReport {
        let request_id = request
            .request_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(new_request_id);
        self.observer.on_pipeline_start(&request_id);

        let report = match self.resolve_locations(request) {
            Ok(locations) => {
                let run = Run {
                    request_id: request_id.clone(),
                    options: request.options,
                    locations,
                };
                self.execute(&run).await
            }
            Err(e) => {
                let error = e.to_info(None);
                warn!(
                    request_id = %request_id,
                    action = "request_rejected",
                    error_kind = %error.kind,
                    error = %error.message,
                    "Request rejected"
                );
                ProcessingReport::new(&request_id).fail(error)
            }
        };

        info!(
            request_id = %report.request_id,
            action = "pipeline_complete",
            result = if report.is_success() { "success" } else { "failure" },
            total_elapsed_seconds = report.total_elapsed_seconds,
            stage_timings = %timings_field(&report),
            "Pipeline complete"
        );
        self.observer.on_pipeline_complete(&report);
        report
    }

    /// Parse and default the source, Markdown and metadata locations.
    fn resolve_locations(&self, request: &InvocationRequest) -> Result<Locations, Doc2MdError> {
        let source = StorageLocation::parse(&request.source_location)?;

        let markdown = match request.output_location.as_deref() {
            Some(raw) => StorageLocation::parse(raw)?,
            None if !source.is_writable() => {
                return Err(Doc2MdError::InvalidRequest(format!(
                    "outputLocation is required for read-only source '{source}'"
                )))
            }
            None => source.with_extension(&self.config.markdown_extension)?,
        };

        let metadata = match request.metadata_location.as_deref() {
            Some(raw) => StorageLocation::parse(raw)?,
            None => markdown.with_extension(&self.config.metadata_suffix)?,
        };

        for (name, loc) in [("output", &markdown), ("metadata", &metadata)] {
            if !loc.is_writable() {
                return Err(Doc2MdError::InvalidLocation {
                    location: loc.to_string(),
                    reason: format!("{name} location is read-only"),
                });
            }
            if *loc == source {
                return Err(Doc2MdError::InvalidLocation {
                    location: loc.to_string(),
                    reason: format!("{name} location would overwrite the source"),
                });
            }
        }
        if markdown == metadata {
            return Err(Doc2MdError::InvalidLocation {
                location: metadata.to_string(),
                reason: "metadata and output locations are the same".into(),
            });
        }

        Ok(Locations {
            source,
            markdown,
            metadata,
        })
    }

    /// Drive the state machine until `Done` or `Failed`.
    async fn execute(&self, run: &Run) -> ProcessingReport {
        let mut report = ProcessingReport::new(&run.request_id);
        let mut state = PipelineState::default();
        let mut carry = InFlight::Nothing;
        // Set while the Markdown artefact exists without its metadata.
        let mut orphan: Option<String> = None;

        while let Some(stage) = state.stage() {
            self.observer.on_stage_start(stage);
            let timer = StageTimer::start(stage);
            let outcome = self.step(stage, carry, run, &mut report, &mut orphan).await;
            let timing = timer.finish();
            let elapsed = timing.elapsed_seconds;

            let mut timings = std::mem::take(&mut report.stage_timings);
            timings.push(timing);
            report.set_stage_timings(timings);

            match outcome {
                Ok(next) => {
                    info!(
                        request_id = %run.request_id,
                        action = "stage_complete",
                        stage = %stage,
                        result = "success",
                        elapsed_seconds = elapsed,
                        "Stage complete"
                    );
                    self.observer.on_stage_complete(stage, elapsed);
                    carry = next;
                    state = state.advance();
                }
                Err(e) => {
                    let error = e.to_info(Some(stage));
                    warn!(
                        request_id = %run.request_id,
                        action = "stage_failed",
                        stage = %stage,
                        result = "failure",
                        elapsed_seconds = elapsed,
                        error_kind = %error.kind,
                        error = %error.message,
                        orphaned_markdown_location = orphan.as_deref(),
                        "Stage failed"
                    );
                    self.observer.on_stage_failed(stage, &error);
                    return report.fail(error);
                }
            }
        }

        report
    }

    async fn step(
        &self,
        stage: Stage,
        carry: InFlight,
        run: &Run,
        report: &mut ProcessingReport,
        orphan: &mut Option<String>,
    ) -> Result<InFlight, Doc2MdError> {
        match (stage, carry) {
            (Stage::Fetching, InFlight::Nothing) => self.fetch(run).await.map(InFlight::Source),

            (Stage::Parsing, InFlight::Source(bytes)) => {
                self.parse(bytes, run).await.map(InFlight::Parsed)
            }

            (Stage::Optimizing, InFlight::Parsed(parsed)) => {
                let optimization = self.optimize(&parsed, run)?;
                Ok(InFlight::Optimized(parsed, optimization))
            }

            (Stage::Analyzing, InFlight::Optimized(parsed, optimization)) => {
                *report = analyze(
                    &run.request_id,
                    &parsed,
                    &optimization,
                    &report.stage_timings,
                );
                Ok(InFlight::Analyzed(parsed, optimization))
            }

            (Stage::Delivering, InFlight::Analyzed(parsed, optimization)) => {
                self.deliver(&parsed, optimization.optimized_markdown, run, report, orphan)
                    .await?;
                Ok(InFlight::Delivered)
            }

            (stage, _) => Err(Doc2MdError::Internal(format!(
                "stage '{stage}' reached without its input"
            ))),
        }
    }

    async fn fetch(&self, run: &Run) -> Result<Vec<u8>, Doc2MdError> {
        let source = &run.locations.source;
        let bytes = self
            .store
            .get_bounded(source, self.config.max_source_bytes)
            .await?;
        debug!(request_id = %run.request_id, bytes = bytes.len(), "Fetched source");
        Ok(bytes)
    }

    /// Runs the blocking parser on the blocking pool. A panic inside the
    /// parser surfaces as [`Doc2MdError::TaskFailed`].
    async fn parse(&self, bytes: Vec<u8>, run: &Run) -> Result<ParsedDocument, Doc2MdError> {
        let parser = self.parser.parser();
        let options = ParseOptions::from(&run.options);
        let parsed = tokio::task::spawn_blocking(move || parser.parse(&bytes, &options))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    Doc2MdError::TaskFailed(format!("parser '{}' panicked", self.parser.name()))
                } else {
                    Doc2MdError::TaskFailed(e.to_string())
                }
            })??;
        debug!(
            request_id = %run.request_id,
            pages = parsed.page_count,
            blocks = parsed.document.blocks.len(),
            "Parsed source"
        );
        Ok(parsed)
    }

    fn optimize(
        &self,
        parsed: &ParsedDocument,
        run: &Run,
    ) -> Result<OptimizationResult, Doc2MdError> {
        parsed.document.validate()?;

        let document = if run.options.preserve_tables {
            Cow::Borrowed(&parsed.document)
        } else {
            Cow::Owned(flatten_tables(&parsed.document))
        };
        let raw = render_markdown(&document);

        let mut result = if run.options.markdown_optimization {
            optimize(&raw)
        } else {
            OptimizationResult::identity(&raw)
        };
        self.decorate(&mut result, parsed, run);
        Ok(result)
    }

    /// Apply the requested decorations on top of the optimised Markdown.
    /// A decoration is recorded only when it changed the text.
    fn decorate(&self, result: &mut OptimizationResult, parsed: &ParsedDocument, run: &Run) {
        if run.options.generate_toc {
            if let Some(with_toc) = prepend_table_of_contents(&result.optimized_markdown) {
                result.optimized_markdown = with_toc;
                result.applied_rules.push(RuleName::TableOfContents);
            }
        }
        if run.options.add_metadata_header {
            let title = document_title(
                &result.optimized_markdown,
                run.locations.source.stem(),
            );
            let header = metadata_header(
                &title,
                parsed.page_count,
                parsed.document.count(crate::document::BlockKind::Table),
            );
            result.optimized_markdown.insert_str(0, &header);
            result.applied_rules.push(RuleName::MetadataHeader);
        }
        result.size_after = char_len(&result.optimized_markdown);
    }

    async fn deliver(
        &self,
        parsed: &ParsedDocument,
        markdown: String,
        run: &Run,
        report: &mut ProcessingReport,
        orphan: &mut Option<String>,
    ) -> Result<(), Doc2MdError> {
        let Locations {
            source,
            markdown: markdown_location,
            metadata: metadata_location,
        } = &run.locations;

        let markdown_uri = markdown_location.to_string();
        let source_uri = source.to_string();
        let metadata = metadata_document(
            report,
            &markdown,
            &MetadataContext {
                document: &parsed.document,
                source_location: &source_uri,
                markdown_location: &markdown_uri,
                processed_at: Utc::now(),
                options: run.options,
                parser: self.parser.name(),
            },
        );
        let metadata_json = serde_json::to_vec_pretty(&metadata)?;

        self.store
            .put(markdown_location, markdown.into_bytes(), CONTENT_TYPE_MARKDOWN)
            .await?;
        *orphan = Some(markdown_uri.clone());
        self.store
            .put(metadata_location, metadata_json, CONTENT_TYPE_JSON)
            .await?;
        *orphan = None;

        report.outputs = Some(OutputLocations {
            markdown_location: markdown_uri,
            metadata_location: metadata_location.to_string(),
        });
        Ok(())
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `fetching=0.0012 parsing=0.3400 …` for the terminal log event.
fn timings_field(report: &ProcessingReport) -> String {
    report
        .stage_timings
        .iter()
        .map(|t| format!("{}={:.4}", t.stage, t.elapsed_seconds))
        .collect::<Vec<_>>()
        .join(" ")
}
