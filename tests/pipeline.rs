//! Integration tests for the orchestrator: full runs against in-memory and
//! local storage with scripted parsers.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use doc2md::pipeline::analyze::MetadataDocument;
use doc2md::{
    Block, DocumentParser, ErrorInfo, ErrorKind, InvocationRequest, InvocationResponse,
    LocalStore, MemoryStore, ObjectStore, OrchestratorConfig, ParseError, ParseOptions,
    ParsedDocument, ParserHandle, PipelineOptions, PipelineOrchestrator, ProcessingReport,
    ReportStatus, RuleName, Stage, StageObserver, StorageError, StorageLocation,
    StructuralDocument, TextLayerParser,
};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

// ── Test helpers ─────────────────────────────────────────────────────────────

const SOURCE: &str = "mem://inbox/report.pdf";
const MARKDOWN: &str = "mem://inbox/report.md";
const METADATA: &str = "mem://inbox/report.metadata.json";

/// What the scripted parser does when called.
enum Script {
    Document(StructuralDocument, usize),
    Fail(ParseError),
    Panic,
}

struct ScriptedParser(Script);

impl DocumentParser for ScriptedParser {
    fn name(&self) -> &str {
        "scripted"
    }

    fn parse(&self, _bytes: &[u8], _opts: &ParseOptions) -> Result<ParsedDocument, ParseError> {
        match &self.0 {
            Script::Document(doc, pages) => Ok(ParsedDocument::new(doc.clone(), *pages)),
            Script::Fail(e) => Err(e.clone()),
            Script::Panic => panic!("parser blew up"),
        }
    }
}

fn title_and_body() -> StructuralDocument {
    StructuralDocument::new(vec![
        Block::heading(1, "Title"),
        Block::paragraph("Body text.  "),
    ])
}

fn loc(raw: &str) -> StorageLocation {
    StorageLocation::parse(raw).unwrap()
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert(&loc(SOURCE), b"%PDF-1.7 fake".to_vec());
    store
}

/// Route the orchestrator's events to the test output (`RUST_LOG=doc2md=info`).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn orchestrator(script: Script, store: Arc<dyn ObjectStore>) -> PipelineOrchestrator {
    init_tracing();
    let parser = ParserHandle::init(Arc::new(ScriptedParser(script))).unwrap();
    PipelineOrchestrator::builder(parser, store).build()
}

fn stages(report: &ProcessingReport) -> Vec<Stage> {
    report.stage_timings.iter().map(|t| t.stage).collect()
}

fn stored_text(store: &MemoryStore, raw: &str) -> String {
    String::from_utf8(store.object(&loc(raw)).expect("object was written")).unwrap()
}

fn assert_consistent_failure(report: &ProcessingReport, kind: ErrorKind, stage: Option<Stage>) {
    assert_eq!(report.status, ReportStatus::Failure);
    let detail = report.error_detail.as_ref().expect("failure carries detail");
    assert_eq!(detail.kind, kind, "unexpected error: {detail}");
    assert_eq!(detail.stage, stage);
    assert!(report.outputs.is_none());
    assert!(report.is_consistent());
}

/// Store that serves reads from an inner store and refuses every write.
struct ReadOnlyBucket(Arc<MemoryStore>);

#[async_trait]
impl ObjectStore for ReadOnlyBucket {
    fn name(&self) -> &str {
        "read-only-bucket"
    }

    async fn get(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        self.0.get(location).await
    }

    async fn put(
        &self,
        location: &StorageLocation,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        Err(StorageError::AccessDenied {
            location: location.to_string(),
            detail: "bucket policy forbids PutObject".into(),
        })
    }
}

// ── Successful runs ──────────────────────────────────────────────────────────

#[tokio::test]
async fn success_delivers_markdown_and_metadata() {
    let store = seeded_store();
    let o = orchestrator(Script::Document(title_and_body(), 3), store.clone());

    let report = o
        .run(&InvocationRequest::new(SOURCE).with_request_id("req-1"))
        .await;

    assert!(report.is_success(), "{:?}", report.error_detail);
    assert!(report.is_consistent());
    assert_eq!(stages(&report), Stage::ALL);
    assert_eq!(report.page_count, 3);
    assert_eq!(report.content_length, 20);
    assert_eq!(
        report.optimization.applied_rules,
        [RuleName::TrimTrailingWhitespace]
    );

    let outputs = report.outputs.as_ref().unwrap();
    assert_eq!(outputs.markdown_location, MARKDOWN);
    assert_eq!(outputs.metadata_location, METADATA);
    assert_eq!(stored_text(&store, MARKDOWN), "# Title\n\nBody text.\n");
    assert_eq!(
        store.content_type(&loc(MARKDOWN)).as_deref(),
        Some("text/markdown; charset=utf-8")
    );
    assert_eq!(
        store.content_type(&loc(METADATA)).as_deref(),
        Some("application/json")
    );

    let meta: MetadataDocument = serde_json::from_str(&stored_text(&store, METADATA)).unwrap();
    assert_eq!(meta.document_info.request_id, "req-1");
    assert_eq!(meta.document_info.source_location, SOURCE);
    assert_eq!(meta.content_analysis.page_count, 3);
    assert_eq!(meta.system_info.parser, "scripted");
    assert_eq!(meta.content_analysis.block_counts.headings, 1);
    assert_eq!(meta.content_analysis.block_counts.paragraphs, 1);
    assert_eq!(meta.page_breakdown.len(), 3);
    assert_eq!(meta.page_breakdown[0].element_count, 2);
    assert!(meta.table_analysis.is_empty());
    // Delivering is still running when the metadata is written.
    assert_eq!(meta.document_info.processing_breakdown.len(), 4);
    assert!(!meta.document_info.processing_breakdown.contains_key("delivering"));
}

#[tokio::test]
async fn success_envelope_matches_wire_contract() {
    let o = orchestrator(Script::Document(title_and_body(), 1), seeded_store());
    let report = o.run(&InvocationRequest::new(SOURCE)).await;
    let response = InvocationResponse::from_report(&report);

    assert_eq!(response.status_code(), 200);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["requestId"], report.request_id.as_str());
    assert_eq!(json["outputs"]["markdownLocation"], MARKDOWN);
    assert_eq!(json["processingSummary"]["pageCount"], 1);
    assert_eq!(json["processingSummary"]["contentLength"], 20);
    let metrics = json["performanceMetrics"].as_object().unwrap();
    assert_eq!(metrics.len(), 5);
    assert!(metrics.contains_key("parsing"));
}

#[tokio::test]
async fn disabled_optimisation_passes_raw_rendering_through() {
    let store = seeded_store();
    let o = orchestrator(Script::Document(title_and_body(), 1), store.clone());
    let options = PipelineOptions::builder()
        .markdown_optimization(false)
        .build();

    let report = o
        .run(&InvocationRequest::new(SOURCE).with_options(options))
        .await;

    assert!(report.is_success());
    assert!(report.optimization.applied_rules.is_empty());
    assert_eq!(report.optimization.size_before, report.optimization.size_after);
    assert_eq!(stored_text(&store, MARKDOWN), "# Title\n\nBody text.  \n");
}

#[tokio::test]
async fn flattened_tables_still_count_as_tables() {
    let store = seeded_store();
    let doc = StructuralDocument::new(vec![Block::table(vec![
        vec!["Region".into(), "Revenue".into()],
        vec!["North".into(), "120".into()],
    ])]);
    let o = orchestrator(Script::Document(doc, 1), store.clone());
    let options = PipelineOptions::builder().preserve_tables(false).build();

    let report = o
        .run(&InvocationRequest::new(SOURCE).with_options(options))
        .await;

    assert!(report.is_success());
    assert_eq!(report.table_count, 1);
    assert_eq!(stored_text(&store, MARKDOWN), "Region Revenue\nNorth 120\n");
}

#[tokio::test]
async fn decorations_are_recorded_only_when_requested() {
    let store = seeded_store();
    let o = orchestrator(Script::Document(title_and_body(), 2), store.clone());
    let options = PipelineOptions::builder()
        .generate_toc(true)
        .add_metadata_header(true)
        .build();

    let report = o
        .run(&InvocationRequest::new(SOURCE).with_options(options))
        .await;

    assert!(report.is_success());
    assert_eq!(
        report.optimization.applied_rules,
        [
            RuleName::TrimTrailingWhitespace,
            RuleName::TableOfContents,
            RuleName::MetadataHeader
        ]
    );
    let md = stored_text(&store, MARKDOWN);
    assert_eq!(
        md,
        "---\ntitle: \"Title\"\npages: 2\ntables: 0\n---\n\n\
         ## Table of Contents\n\n- [Title](#title)\n\n\
         # Title\n\nBody text.\n"
    );
    assert_eq!(report.content_length, md.chars().count());
    assert_eq!(report.optimization.size_after, report.content_length);

    let plain = o.run(&InvocationRequest::new(SOURCE)).await;
    assert!(!plain
        .optimization
        .applied_rules
        .contains(&RuleName::TableOfContents));
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn parse_failure_stops_after_parsing() {
    let store = seeded_store();
    let o = orchestrator(Script::Fail(ParseError::Encrypted), store.clone());

    let report = o.run(&InvocationRequest::new(SOURCE)).await;

    assert_consistent_failure(&report, ErrorKind::ParseError, Some(Stage::Parsing));
    assert_eq!(stages(&report), [Stage::Fetching, Stage::Parsing]);
    assert!(store.object(&loc(MARKDOWN)).is_none());
    assert_eq!(store.len(), 1);

    let response = InvocationResponse::from_report(&report);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["errorKind"], "ParseError");
    assert!(json["error"].as_str().unwrap().starts_with("ParseError: "));
    assert_eq!(response.status_code(), 500);
}

#[tokio::test]
async fn invalid_location_fails_before_any_stage() {
    let o = orchestrator(Script::Document(title_and_body(), 1), seeded_store());

    let report = o
        .run(&InvocationRequest::new("s3://bucket//double.pdf"))
        .await;

    assert_consistent_failure(&report, ErrorKind::InputError, None);
    assert!(report.stage_timings.is_empty());
    assert_eq!(report.total_elapsed_seconds, 0.0);
    assert_eq!(InvocationResponse::from_report(&report).status_code(), 400);
}

#[tokio::test]
async fn http_source_requires_output_location() {
    let o = orchestrator(Script::Document(title_and_body(), 1), seeded_store());
    let report = o
        .run(&InvocationRequest::new("https://example.com/paper.pdf"))
        .await;
    assert_consistent_failure(&report, ErrorKind::InputError, None);
    assert!(report.stage_timings.is_empty());
}

#[tokio::test]
async fn missing_source_is_a_storage_error() {
    let o = orchestrator(Script::Document(title_and_body(), 1), Arc::new(MemoryStore::new()));
    let report = o.run(&InvocationRequest::new(SOURCE)).await;
    assert_consistent_failure(&report, ErrorKind::StorageError, Some(Stage::Fetching));
    assert_eq!(stages(&report), [Stage::Fetching]);
}

#[tokio::test]
async fn oversized_source_is_an_input_error() {
    let parser =
        ParserHandle::init(Arc::new(ScriptedParser(Script::Document(title_and_body(), 1))))
            .unwrap();
    let config = OrchestratorConfig::builder()
        .max_source_bytes(4)
        .build()
        .unwrap();
    let o = PipelineOrchestrator::builder(parser, seeded_store())
        .config(config)
        .build();

    let report = o.run(&InvocationRequest::new(SOURCE)).await;
    assert_consistent_failure(&report, ErrorKind::InputError, Some(Stage::Fetching));
    let message = &report.error_detail.as_ref().unwrap().message;
    assert!(message.contains("4-byte limit"), "got: {message}");
}

#[tokio::test]
async fn delivery_failure_keeps_all_five_timings() {
    let o = orchestrator(
        Script::Document(title_and_body(), 2),
        Arc::new(ReadOnlyBucket(seeded_store())),
    );

    let report = o.run(&InvocationRequest::new(SOURCE)).await;

    assert_consistent_failure(&report, ErrorKind::StorageError, Some(Stage::Delivering));
    assert_eq!(stages(&report), Stage::ALL);
    assert_eq!(report.page_count, 2);
}

#[tokio::test]
async fn parser_panic_is_an_internal_error() {
    let o = orchestrator(Script::Panic, seeded_store());
    let report = o.run(&InvocationRequest::new(SOURCE)).await;
    assert_consistent_failure(&report, ErrorKind::InternalError, Some(Stage::Parsing));
    assert_eq!(stages(&report), [Stage::Fetching, Stage::Parsing]);
}

#[tokio::test]
async fn malformed_document_is_an_internal_error() {
    let mut ragged = Block::table(vec![vec!["a".into(), "b".into()]]);
    ragged.table_data = Some(vec![vec!["a".into(), "b".into()], vec!["c".into()]]);
    let o = orchestrator(
        Script::Document(StructuralDocument::new(vec![ragged]), 1),
        seeded_store(),
    );

    let report = o.run(&InvocationRequest::new(SOURCE)).await;

    assert_consistent_failure(&report, ErrorKind::InternalError, Some(Stage::Optimizing));
    assert_eq!(
        stages(&report),
        [Stage::Fetching, Stage::Parsing, Stage::Optimizing]
    );
}

// ── Events and concurrency ───────────────────────────────────────────────────

#[tokio::test]
async fn run_event_rejects_unknown_option_keys() {
    let o = orchestrator(Script::Document(title_and_body(), 1), seeded_store());

    let rejected = o
        .run_event(r#"{"sourceLocation":"mem://inbox/report.pdf","options":{"ocr":false}}"#)
        .await;
    assert!(!rejected.is_success());
    assert_eq!(rejected.status_code(), 400);
    assert!(uuid::Uuid::parse_str(rejected.request_id()).is_ok());

    let garbage = o.run_event("not json").await;
    assert_eq!(garbage.status_code(), 400);
    assert!(uuid::Uuid::parse_str(garbage.request_id()).is_ok());
    assert_ne!(garbage.request_id(), rejected.request_id());

    let accepted = o
        .run_event(
            r#"{"sourceLocation":"mem://inbox/report.pdf","requestId":"evt-9",
                "options":{"preserveTables":false}}"#,
        )
        .await;
    assert!(accepted.is_success());
    assert_eq!(accepted.request_id(), "evt-9");
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl StageObserver for Recorder {
    fn on_pipeline_start(&self, _request_id: &str) {
        self.events.lock().unwrap().push("start".into());
    }
    fn on_stage_complete(&self, stage: Stage, _elapsed: f64) {
        self.events.lock().unwrap().push(format!("ok:{stage}"));
    }
    fn on_stage_failed(&self, stage: Stage, error: &ErrorInfo) {
        self.events
            .lock()
            .unwrap()
            .push(format!("failed:{stage}:{}", error.kind));
    }
    fn on_pipeline_complete(&self, report: &ProcessingReport) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done:{}", report.is_success()));
    }
}

#[tokio::test]
async fn observer_sees_each_stage_once() {
    let recorder = Arc::new(Recorder::default());
    let parser =
        ParserHandle::init(Arc::new(ScriptedParser(Script::Fail(ParseError::Corrupt(
            "xref".into(),
        )))))
        .unwrap();
    let o = PipelineOrchestrator::builder(parser, seeded_store())
        .observer(recorder.clone())
        .build();

    o.run(&InvocationRequest::new(SOURCE)).await;

    assert_eq!(
        *recorder.events.lock().unwrap(),
        [
            "start",
            "ok:fetching",
            "failed:parsing:ParseError",
            "done:false"
        ]
    );
}

#[tokio::test]
async fn concurrent_runs_do_not_interfere() {
    let store = Arc::new(MemoryStore::new());
    for i in 0..8 {
        store.insert(&loc(&format!("mem://inbox/doc{i}.pdf")), b"%PDF".to_vec());
    }
    let o = orchestrator(Script::Document(title_and_body(), 1), store.clone());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let o = o.clone();
            tokio::spawn(async move {
                let request = InvocationRequest::new(format!("mem://inbox/doc{i}.pdf"))
                    .with_request_id(format!("req-{i}"));
                o.run(&request).await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let report = handle.await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.request_id, format!("req-{i}"));
        assert_eq!(report.stage_timings.len(), 5);
        assert_eq!(
            report.outputs.unwrap().markdown_location,
            format!("mem://inbox/doc{i}.md")
        );
    }
    assert_eq!(store.len(), 8 * 3);
}

// ── Structured log events ────────────────────────────────────────────────────

type Fields = BTreeMap<String, String>;

/// Layer that keeps the fields of every event it sees.
#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<Fields>>>);

impl EventLog {
    /// Events that carry an `action` field, in emission order.
    fn actions(&self) -> Vec<Fields> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|fields| fields.contains_key("action"))
            .cloned()
            .collect()
    }
}

struct FieldRecorder<'a>(&'a mut Fields);

impl Visit for FieldRecorder<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

impl<S: tracing::Subscriber> Layer<S> for EventLog {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::new();
        event.record(&mut FieldRecorder(&mut fields));
        self.0.lock().unwrap().push(fields);
    }
}

/// Run `fut` with an [`EventLog`] installed as this thread's subscriber.
async fn with_event_log<F: Future>(fut: F) -> (F::Output, Vec<Fields>) {
    let log = EventLog::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(log.clone()));
    let output = fut.await;
    (output, log.actions())
}

fn with_action<'a>(events: &'a [Fields], action: &str) -> Vec<&'a Fields> {
    events.iter().filter(|e| e["action"] == action).collect()
}

fn assert_seconds(event: &Fields, key: &str) {
    let value = event.get(key).unwrap_or_else(|| panic!("missing {key} in {event:?}"));
    assert!(value.parse::<f64>().is_ok(), "{key} = {value}");
}

#[tokio::test]
async fn success_logs_every_stage_transition_and_one_terminal_event() {
    let o = orchestrator(Script::Document(title_and_body(), 1), seeded_store());

    let (report, events) =
        with_event_log(o.run(&InvocationRequest::new(SOURCE).with_request_id("req-log"))).await;
    assert!(report.is_success(), "{:?}", report.error_detail);

    let transitions = with_action(&events, "stage_complete");
    assert_eq!(transitions.len(), 5);
    assert!(with_action(&events, "stage_failed").is_empty());
    for (event, stage) in transitions.iter().zip(Stage::ALL) {
        assert_eq!(event["request_id"], "req-log");
        assert_eq!(event["stage"], stage.to_string());
        assert_eq!(event["result"], "success");
        assert_seconds(event, "elapsed_seconds");
    }

    let terminal = with_action(&events, "pipeline_complete");
    assert_eq!(terminal.len(), 1);
    let terminal = terminal[0];
    assert_eq!(events.last(), Some(terminal));
    assert_eq!(terminal["request_id"], "req-log");
    assert_eq!(terminal["result"], "success");
    assert_seconds(terminal, "total_elapsed_seconds");
    for stage in Stage::ALL {
        assert!(
            terminal["stage_timings"].contains(&format!("{stage}=")),
            "{stage} missing from {}",
            terminal["stage_timings"]
        );
    }
}

#[tokio::test]
async fn parse_failure_logs_failed_stage_and_failure_result() {
    let o = orchestrator(Script::Fail(ParseError::Encrypted), seeded_store());

    let (report, events) =
        with_event_log(o.run(&InvocationRequest::new(SOURCE).with_request_id("req-bad"))).await;
    assert!(!report.is_success());

    let completed = with_action(&events, "stage_complete");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["stage"], "fetching");

    let failed = with_action(&events, "stage_failed");
    assert_eq!(failed.len(), 1);
    let failed = failed[0];
    assert_eq!(failed["request_id"], "req-bad");
    assert_eq!(failed["stage"], "parsing");
    assert_eq!(failed["result"], "failure");
    assert_eq!(failed["error_kind"], "ParseError");
    assert_seconds(failed, "elapsed_seconds");
    assert!(!failed.contains_key("orphaned_markdown_location"));

    let terminal = with_action(&events, "pipeline_complete");
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0]["result"], "failure");
    assert_eq!(terminal[0]["stage_timings"].split(' ').count(), 2);
}

/// Accepts the Markdown artefact and refuses the JSON metadata.
struct MetadataRejectingBucket(Arc<MemoryStore>);

#[async_trait]
impl ObjectStore for MetadataRejectingBucket {
    fn name(&self) -> &str {
        "metadata-rejecting-bucket"
    }

    async fn get(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        self.0.get(location).await
    }

    async fn put(
        &self,
        location: &StorageLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if content_type == "application/json" {
            return Err(StorageError::AccessDenied {
                location: location.to_string(),
                detail: "JSON uploads are blocked".into(),
            });
        }
        self.0.put(location, bytes, content_type).await
    }
}

#[tokio::test]
async fn failed_metadata_write_logs_the_orphaned_markdown() {
    let store = seeded_store();
    let o = orchestrator(
        Script::Document(title_and_body(), 1),
        Arc::new(MetadataRejectingBucket(store.clone())),
    );

    let (report, events) = with_event_log(o.run(&InvocationRequest::new(SOURCE))).await;

    assert_consistent_failure(&report, ErrorKind::StorageError, Some(Stage::Delivering));
    assert_eq!(report.stage_timings.len(), 5);
    assert_eq!(stored_text(&store, MARKDOWN), "# Title\n\nBody text.\n");
    assert!(store.object(&loc(METADATA)).is_none());

    let failed = with_action(&events, "stage_failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["stage"], "delivering");
    assert_eq!(failed[0]["orphaned_markdown_location"], MARKDOWN);
}

// ── Local filesystem with the text-layer parser ──────────────────────────────

fn one_page_pdf(text: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1_i64,
            "Kids" => vec![Object::Reference(page_id)],
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

#[tokio::test]
async fn local_pdf_round_trip_with_text_layer_parser() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("quarterly.pdf");
    std::fs::write(&source, one_page_pdf("QUARTERLY REPORT")).unwrap();

    let parser = ParserHandle::init(Arc::new(TextLayerParser::default())).unwrap();
    let o = PipelineOrchestrator::builder(parser.clone(), Arc::new(LocalStore::new())).build();

    let report = o
        .run(&InvocationRequest::new(source.to_str().unwrap()))
        .await;
    parser.shutdown();

    assert!(report.is_success(), "{:?}", report.error_detail);
    assert_eq!(report.page_count, 1);

    let md = std::fs::read_to_string(dir.path().join("quarterly.md")).unwrap();
    assert_eq!(md.chars().count(), report.content_length);

    let meta = std::fs::read_to_string(dir.path().join("quarterly.metadata.json")).unwrap();
    let meta: MetadataDocument = serde_json::from_str(&meta).unwrap();
    assert_eq!(meta.system_info.parser, "text-layer");
}

#[tokio::test]
async fn local_non_pdf_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("notes.pdf");
    std::fs::write(&source, b"just some text").unwrap();

    let parser = ParserHandle::init(Arc::new(TextLayerParser::default())).unwrap();
    let o = PipelineOrchestrator::builder(parser, Arc::new(LocalStore::new())).build();
    let report = o
        .run(&InvocationRequest::new(source.to_str().unwrap()))
        .await;

    assert_consistent_failure(&report, ErrorKind::ParseError, Some(Stage::Parsing));
    assert!(!dir.path().join("notes.md").exists());
}
