//! Analyze stage end to end: event decoding, dispatch, judge, sink write.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracelens_core::handler::{handle_analyze, AnalyzeEvent, ANALYZE_COMPLETE};
use tracelens_core::judge::{JudgeConfig, JudgeService};
use tracelens_core::providers::llm::fake::FakeClient;
use tracelens_core::providers::validator::{AcceptAllValidator, FnValidator};
use tracelens_core::sink::{MemorySink, RecordSink};
use tracelens_core::trace::record::{AnalyzedRecord, TaskRecord};
use tracelens_core::{Analyzer, PipelineError};

const STREAM: &str = "cfn-analysis";

fn batch() -> Vec<TaskRecord> {
    serde_json::from_value(json!([
        {
            "start_time": "1", "end_time": "2", "trace_id": "abc",
            "workflow": "cfn_chat", "task": "check_toxicity",
            "user_input": "Call it audit-logs", "toxicity_detected": false,
            "full_prompt": null, "model": null, "completion": null,
            "feedback": null, "conversation": null
        },
        {
            "start_time": "3", "end_time": "4", "trace_id": "abc",
            "workflow": "cfn_chat", "task": "llm_call",
            "user_input": null, "toxicity_detected": null,
            "full_prompt": "Human: sys\n\nHuman:\nmake a bucket\n\nAssistant:\nok\n\nHuman:\nname it logs\n\nAssistant:",
            "model": "anthropic.claude-v2",
            "completion": "Sure:\n```yaml\nResources:\n  Logs:\n    Type: AWS::S3::Bucket\n```",
            "feedback": null, "conversation": null
        },
        {
            "start_time": "5", "end_time": "6", "trace_id": "abc",
            "workflow": "cfn_chat", "task": "llm_call",
            "user_input": null, "toxicity_detected": null,
            "full_prompt": "Human: sys\n\nHuman:\nwrite a poem\n\nAssistant:",
            "model": "anthropic.claude-v2",
            "completion": "I can only help with templates.",
            "feedback": null, "conversation": null
        },
        {
            "start_time": 7, "end_time": 8, "trace_id": "abc",
            "workflow": "cfn_chat", "task": "cfn_user_feedback",
            "user_input": null, "toxicity_detected": null,
            "full_prompt": null, "model": "anthropic.claude-v2", "completion": null,
            "feedback": "not helpful", "conversation": "Human:\nhi\n\n"
        }
    ]))
    .unwrap()
}

fn analyzer(client: Arc<FakeClient>) -> Analyzer {
    Analyzer::new(
        Arc::new(AcceptAllValidator),
        JudgeService::new(JudgeConfig::default(), client),
    )
}

#[tokio::test]
async fn analyzes_and_delivers_whole_batch() {
    let client = Arc::new(FakeClient::new().with_response(" 1. No\n2. Yes, it does"));
    let sink = MemorySink::new();
    let event = AnalyzeEvent::direct(&batch()).unwrap();

    let resp = handle_analyze(&event, &analyzer(client.clone()), &sink, STREAM)
        .await
        .unwrap();
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body, ANALYZE_COMPLETE);

    assert_eq!(sink.batch_count(), 1);
    let delivered = sink.records();
    assert_eq!(delivered.len(), 4);
    assert!(delivered.iter().all(|(stream, _)| stream == STREAM));
    assert!(delivered.iter().all(|(_, data)| data.ends_with(b"\n")));

    let out = sink.json_records();
    for rec in &out {
        for key in AnalyzedRecord::NULLABLE_KEYS {
            assert!(rec.get(key).is_some(), "missing {key}");
        }
    }

    // toxicity passes through untouched
    assert_eq!(out[0]["user_input"], "Call it audit-logs");
    assert!(out[0]["valid_template"].is_null());
    assert!(out[0].get("dialogue_turns").is_none());

    // generation with an artifact
    assert_eq!(out[1]["valid_template"], true);
    assert_eq!(out[1]["llm_security_issue_found"], "no");
    assert_eq!(out[1]["llm_answered_question"], "yes");
    assert_eq!(out[1]["dialogue_turns"], 1);

    // generation without an artifact
    assert!(out[2]["valid_template"].is_null());
    assert!(out[2]["llm_security_issue_found"].is_null());
    assert_eq!(out[2]["dialogue_turns"], 0);

    // feedback keeps its numeric timestamps
    assert_eq!(out[3]["feedback"], "not helpful");
    assert_eq!(out[3]["start_time"], 7);

    assert_eq!(client.call_count(), 1);
    let (prompt, _) = &client.calls()[0];
    assert!(prompt.contains("H:\nname it logs"));
    assert!(prompt.contains("Type: AWS::S3::Bucket"));
}

#[tokio::test]
async fn destination_envelope_is_accepted() {
    let body = serde_json::to_string(&batch()).unwrap();
    let event: AnalyzeEvent = serde_json::from_value(json!({
        "version": "1.0",
        "timestamp": "2024-01-01T00:00:00.000Z",
        "requestContext": { "condition": "Success", "approximateInvokeCount": 1 },
        "responseContext": { "statusCode": 200 },
        "responsePayload": { "statusCode": 200, "body": body }
    }))
    .unwrap();

    let sink = MemorySink::new();
    handle_analyze(&event, &analyzer(Arc::new(FakeClient::new())), &sink, STREAM)
        .await
        .unwrap();
    assert_eq!(sink.records().len(), 4);
}

#[tokio::test]
async fn judge_failure_writes_nothing() {
    let client = Arc::new(FakeClient::new().with_error("ThrottlingException: slow down"));
    let sink = MemorySink::new();
    let event = AnalyzeEvent::direct(&batch()).unwrap();

    let err = handle_analyze(&event, &analyzer(client), &sink, STREAM)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Judge { .. }));
    assert_eq!(sink.batch_count(), 0);
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn rejected_template_is_recorded_as_invalid() {
    let analyzer = Analyzer::new(
        Arc::new(FnValidator::new("reject", |_body: &str| {
            anyhow::bail!("Template format error: YAML not well-formed")
        })),
        JudgeService::new(JudgeConfig::default(), Arc::new(FakeClient::new())),
    );
    let sink = MemorySink::new();
    let event = AnalyzeEvent::direct(&batch()).unwrap();

    handle_analyze(&event, &analyzer, &sink, STREAM).await.unwrap();
    let out = sink.json_records();
    assert_eq!(out[1]["valid_template"], false);
    assert_eq!(out[1]["llm_security_issue_found"], "no");
}

#[tokio::test]
async fn empty_batch_skips_the_sink() {
    let sink = MemorySink::new();
    let event: AnalyzeEvent = serde_json::from_value(json!({ "body": "[]" })).unwrap();
    let resp = handle_analyze(&event, &analyzer(Arc::new(FakeClient::new())), &sink, STREAM)
        .await
        .unwrap();
    assert_eq!(resp.body, ANALYZE_COMPLETE);
    assert_eq!(sink.batch_count(), 0);
}

struct PartialFailureSink;

#[async_trait]
impl RecordSink for PartialFailureSink {
    async fn put_batch(&self, stream: &str, records: Vec<Vec<u8>>) -> tracelens_core::errors::PipelineResult<()> {
        Err(PipelineError::SinkDelivery {
            stream: stream.to_string(),
            failed: 1,
            total: records.len(),
        })
    }
}

#[tokio::test]
async fn sink_partial_failure_fails_the_invocation() {
    let event = AnalyzeEvent::direct(&batch()).unwrap();
    let err = handle_analyze(
        &event,
        &analyzer(Arc::new(FakeClient::new())),
        &PartialFailureSink,
        STREAM,
    )
    .await
    .unwrap_err();
    match err {
        PipelineError::SinkDelivery { failed, total, .. } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 4);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unknown_input_keys_are_dropped() {
    let event: AnalyzeEvent = serde_json::from_value(json!({
        "body": r#"[{"task":"check_toxicity","extra":"ignored"}]"#
    }))
    .unwrap();
    let sink = MemorySink::new();
    handle_analyze(&event, &analyzer(Arc::new(FakeClient::new())), &sink, STREAM)
        .await
        .unwrap();
    let out: Value = sink.json_records().remove(0);
    assert!(out.get("extra").is_none());
    assert!(out["user_input"].is_null());
}
