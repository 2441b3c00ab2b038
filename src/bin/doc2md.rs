//! CLI binary for doc2md.
//!
//! A thin shim over the library crate: maps flags to an `InvocationRequest`,
//! wires up the storage backends, runs the pipeline once and prints the
//! result envelope as JSON on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use doc2md::pipeline::analyze::{summary_text, MetadataDocument};
use doc2md::storage::DEFAULT_HTTP_TIMEOUT;
use doc2md::{
    ErrorInfo, HttpStore, InvocationRequest, InvocationResponse, LocalStore, MemoryStore,
    ObjectStore, OrchestratorConfig, ParserHandle, PipelineOptions, PipelineOrchestrator,
    ProcessingReport, Stage, StageObserver, StorageLocation, StoreRouter, TextLayerParser,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI stage observer using indicatif ───────────────────────────────────────

/// Spinner on stderr with one log line per finished stage.
struct CliStageObserver {
    bar: ProgressBar,
}

impl CliStageObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("doc2md");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl StageObserver for CliStageObserver {
    fn on_pipeline_start(&self, request_id: &str) {
        self.bar.set_message(format!("request {request_id}"));
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_seconds: f64) {
        self.bar.println(format!(
            "  {} {:<11} {}",
            green("✓"),
            stage,
            dim(&format!("{elapsed_seconds:.3}s"))
        ));
    }

    fn on_stage_failed(&self, stage: Stage, error: &ErrorInfo) {
        self.bar
            .println(format!("  {} {:<11} {}", red("✗"), stage, red(&error.to_string())));
    }

    fn on_pipeline_complete(&self, _report: &ProcessingReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a local PDF; writes report.md and report.metadata.json next to it
  doc2md report.pdf

  # Explicit outputs, tables flattened, table of contents
  doc2md report.pdf -o out/report.md --flatten-tables --toc

  # Public URL (an output location is required)
  doc2md https://arxiv.org/pdf/1706.03762 -o attention.md

  # S3 (build with --features s3)
  doc2md s3://inbox/q3.pdf -o s3://outbox/q3.md

  # Replay a JSON invocation payload
  doc2md --event request.json

LOCATIONS:
  /path/to/file.pdf, file:///path    local filesystem
  http(s)://host/path                read-only source
  s3://bucket/key                    S3 / MinIO (feature "s3")

ENVIRONMENT VARIABLES:
  RUST_LOG                 Override the log filter (e.g. doc2md=debug)
  AWS_REGION               S3 region (default us-east-1)
  AWS_ACCESS_KEY_ID        S3 credentials
  AWS_SECRET_ACCESS_KEY    S3 credentials
  DOC2MD_S3_ENDPOINT       Custom S3 endpoint (MinIO)
"#;

/// Convert parsed PDF documents to optimised Markdown plus metadata.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Convert PDF documents to optimised Markdown with a JSON metadata report",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source location: local path, file://, http(s):// or s3:// URI.
    #[arg(required_unless_present = "event")]
    source: Option<String>,

    /// Markdown output location (default: source with a .md extension).
    #[arg(short, long, env = "DOC2MD_OUTPUT")]
    output: Option<String>,

    /// Metadata output location (default: output with .metadata.json).
    #[arg(long, env = "DOC2MD_METADATA_OUTPUT")]
    metadata_output: Option<String>,

    /// Read a JSON invocation payload from this file instead of flags.
    #[arg(long, conflicts_with = "source")]
    event: Option<PathBuf>,

    /// Correlation id echoed in logs and the result (default: random UUID).
    /// With --event the payload's own requestId is used instead.
    #[arg(long, env = "DOC2MD_REQUEST_ID")]
    request_id: Option<String>,

    /// Tell the parser not to OCR pages without a text layer.
    #[arg(long, env = "DOC2MD_NO_OCR")]
    no_ocr: bool,

    /// Render tables as plain-text rows instead of GFM tables.
    #[arg(long, env = "DOC2MD_FLATTEN_TABLES")]
    flatten_tables: bool,

    /// Skip the Markdown optimiser.
    #[arg(long, env = "DOC2MD_NO_OPTIMIZE")]
    no_optimize: bool,

    /// Prepend a table of contents.
    #[arg(long, env = "DOC2MD_TOC")]
    toc: bool,

    /// Prepend YAML front matter (title, pages, tables).
    #[arg(long, env = "DOC2MD_METADATA_HEADER")]
    metadata_header: bool,

    /// Print a human-readable summary of the metadata artefact to stderr.
    #[arg(long)]
    summary: bool,

    /// Reject sources larger than this many bytes.
    #[arg(long, env = "DOC2MD_MAX_SOURCE_BYTES")]
    max_source_bytes: Option<u64>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOC2MD_DOWNLOAD_TIMEOUT", default_value_t = DEFAULT_HTTP_TIMEOUT.as_secs())]
    download_timeout: u64,

    /// Emit logs as JSON lines.
    #[arg(long, env = "DOC2MD_LOG_JSON")]
    log_json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOC2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result JSON.
    #[arg(short, long, env = "DOC2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level stage logs unless asked otherwise.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.log_json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    }

    // ── Wire up storage, parser and orchestrator ─────────────────────────
    let store = Arc::new(build_router(&cli)?);
    let parser = ParserHandle::init(Arc::new(TextLayerParser::default()))
        .context("Failed to initialise parser")?;

    let mut config = OrchestratorConfig::builder();
    if let Some(max) = cli.max_source_bytes {
        config = config.max_source_bytes(max);
    }
    let config = config.build().context("Invalid configuration")?;

    let mut builder = PipelineOrchestrator::builder(parser.clone(), store.clone()).config(config);
    if show_progress {
        builder = builder.observer(CliStageObserver::new());
    }
    let orchestrator = builder.build();

    // ── Run ──────────────────────────────────────────────────────────────
    let response = match &cli.event {
        Some(path) => {
            let payload = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read event payload from {path:?}"))?;
            orchestrator.run_event(&payload).await
        }
        None => {
            let request = build_request(&cli)?;
            InvocationResponse::from_report(&orchestrator.run(&request).await)
        }
    };
    parser.shutdown();

    if cli.summary {
        if let InvocationResponse::Success(body) = &response {
            print_summary(store.as_ref(), &body.outputs.metadata_location).await?;
        }
    }

    print_response(&response)
}

/// Map CLI flags to an `InvocationRequest`.
fn build_request(cli: &Cli) -> Result<InvocationRequest> {
    let source = cli
        .source
        .clone()
        .context("A source location is required")?;

    let options = PipelineOptions::builder()
        .ocr_enabled(!cli.no_ocr)
        .preserve_tables(!cli.flatten_tables)
        .markdown_optimization(!cli.no_optimize)
        .generate_toc(cli.toc)
        .add_metadata_header(cli.metadata_header)
        .build();

    let mut request = InvocationRequest::new(source).with_options(options);
    if let Some(output) = &cli.output {
        request = request.with_output(output);
    }
    if let Some(metadata) = &cli.metadata_output {
        request = request.with_metadata(metadata);
    }
    if let Some(id) = &cli.request_id {
        request = request.with_request_id(id);
    }
    Ok(request)
}

fn build_router(cli: &Cli) -> Result<StoreRouter> {
    let http = HttpStore::new(Duration::from_secs(cli.download_timeout))
        .context("Failed to build HTTP client")?;
    let router = StoreRouter::new()
        .with_file(Arc::new(LocalStore::new()))
        .with_http(Arc::new(http))
        .with_memory(Arc::new(MemoryStore::new()));

    #[cfg(feature = "s3")]
    let router = router.with_s3(Arc::new(doc2md::storage::S3Store::new(
        doc2md::storage::S3Config::default(),
    )));

    Ok(router)
}

/// Read the delivered metadata back and print its summary to stderr.
async fn print_summary(store: &dyn ObjectStore, metadata_location: &str) -> Result<()> {
    let location = StorageLocation::parse(metadata_location)?;
    let bytes = store
        .get(&location)
        .await
        .with_context(|| format!("Failed to read metadata from {metadata_location}"))?;
    let metadata: MetadataDocument =
        serde_json::from_slice(&bytes).context("Failed to decode metadata document")?;
    eprintln!("{}", summary_text(&metadata));
    Ok(())
}

fn print_response(response: &InvocationResponse) -> Result<ExitCode> {
    let json = serde_json::to_string_pretty(response).context("Failed to serialise result")?;
    println!("{json}");
    Ok(match response.status_code() {
        200 => ExitCode::SUCCESS,
        400 => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    })
}
