//! Failed handler invocations emit exactly one structured `error` event.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracelens_core::handler::{handle_analyze, handle_extract, AnalyzeEvent, S3Event};
use tracelens_core::judge::{JudgeConfig, JudgeService};
use tracelens_core::providers::llm::fake::FakeClient;
use tracelens_core::providers::validator::AcceptAllValidator;
use tracelens_core::sink::MemorySink;
use tracelens_core::storage::LocalObjectStore;
use tracelens_core::trace::record::TaskRecord;
use tracelens_core::{Analyzer, ExtractOptions};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct MockWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MockWriter {
    type Writer = MockWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn setup_capture() -> (MockWriter, tracing::subscriber::DefaultGuard) {
    let writer = MockWriter {
        buf: Arc::new(Mutex::new(Vec::new())),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .json()
        .finish();
    (writer, tracing::subscriber::set_default(subscriber))
}

/// Parsed `ERROR` lines of the captured output.
fn error_events(writer: &MockWriter) -> Vec<Value> {
    let output = String::from_utf8(writer.buf.lock().unwrap().clone()).unwrap();
    output
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|v| v["level"] == "ERROR")
        .collect()
}

fn generation_batch() -> Vec<TaskRecord> {
    serde_json::from_value(json!([{
        "trace_id": "abc",
        "task": "llm_call",
        "full_prompt": "Human: sys\n\nHuman:\nmake a bucket\n\nAssistant:",
        "completion": "```yaml\nResources: {}\n```"
    }]))
    .unwrap()
}

#[tokio::test]
async fn missing_object_logs_one_object_store_failure() {
    let (writer, _guard) = setup_capture();
    let root = tempfile::tempdir().unwrap();
    let store = LocalObjectStore::new(root.path());

    let event = S3Event::for_object("traces", "missing.json");
    let err = handle_extract(&event, &store, &ExtractOptions::default())
        .await
        .unwrap_err();

    let events = error_events(&writer);
    assert_eq!(events.len(), 1, "{events:?}");
    let fields = &events[0]["fields"];
    assert_eq!(fields["stage"], "extract");
    assert_eq!(fields["kind"], "object_store");
    assert_eq!(fields["kind"], err.kind());
    assert!(fields["error"].as_str().unwrap().contains("s3://traces/missing.json"));
}

#[tokio::test]
async fn judge_failure_logs_and_writes_nothing() {
    let (writer, _guard) = setup_capture();
    let analyzer = Analyzer::new(
        Arc::new(AcceptAllValidator),
        JudgeService::new(
            JudgeConfig::default(),
            Arc::new(FakeClient::new().with_error("connection refused")),
        ),
    );
    let sink = MemorySink::new();
    let event = AnalyzeEvent::direct(&generation_batch()).unwrap();

    handle_analyze(&event, &analyzer, &sink, "cfn-analysis")
        .await
        .unwrap_err();

    let events = error_events(&writer);
    assert_eq!(events.len(), 1, "{events:?}");
    assert_eq!(events[0]["fields"]["stage"], "analyze");
    assert_eq!(events[0]["fields"]["kind"], "judge");
    assert_eq!(sink.batch_count(), 0);
}

#[tokio::test]
async fn malformed_analyze_body_is_logged() {
    let (writer, _guard) = setup_capture();
    let analyzer = Analyzer::new(
        Arc::new(AcceptAllValidator),
        JudgeService::new(JudgeConfig::default(), Arc::new(FakeClient::new())),
    );
    let event = AnalyzeEvent::Direct { body: json!(42) };

    handle_analyze(&event, &analyzer, &MemorySink::new(), "s")
        .await
        .unwrap_err();

    let events = error_events(&writer);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["fields"]["kind"], "malformed_event");
}

#[tokio::test]
async fn successful_invocation_logs_no_error() {
    let (writer, _guard) = setup_capture();
    let analyzer = Analyzer::new(
        Arc::new(AcceptAllValidator),
        JudgeService::new(
            JudgeConfig::default(),
            Arc::new(FakeClient::new().with_response("1. no\n2. yes")),
        ),
    );
    let sink = MemorySink::new();
    let event = AnalyzeEvent::direct(&generation_batch()).unwrap();

    handle_analyze(&event, &analyzer, &sink, "s").await.unwrap();

    assert!(error_events(&writer).is_empty());
    assert_eq!(sink.batch_count(), 1);
}
