//! Span-tree walker and record normalizer.
//!
//! Walks the task-tracking scope of one resource-span tree and flattens every
//! task span into a [`TaskRecord`]. Payload decoding problems are isolated to
//! the span they occur in: the span is still emitted with whatever could be
//! read, and the problem is reported in [`ExtractionReport::issues`].

use serde_json::Value;
use tracing::{debug, info, warn};

use super::conversation::{format_history, ChatMessage};
use super::keys;
use super::kind::TaskKind;
use super::record::TaskRecord;
use super::schema::{ResourceSpans, Span};
use crate::errors::{ExtractIssue, PipelineError, PipelineResult};

/// Span-name marker for task spans; workflow spans are skipped.
pub const TASK_SPAN_MARKER: &str = "task";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Name of the instrumentation scope holding task spans.
    pub scope_name: String,
    /// Abort on the first span issue instead of isolating it.
    pub strict: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            scope_name: super::TASK_SCOPE_NAME.to_string(),
            strict: false,
        }
    }
}

/// Issues found on one emitted record.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanIssues {
    /// Index of the record in [`ExtractionReport::records`].
    pub record_index: usize,
    pub span_name: String,
    pub trace_id: Value,
    pub issues: Vec<ExtractIssue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    pub records: Vec<TaskRecord>,
    pub issues: Vec<SpanIssues>,
}

impl ExtractionReport {
    pub fn issue_count(&self) -> usize {
        self.issues.iter().map(|s| s.issues.len()).sum()
    }
}

/// Flatten the task spans of `resource` into records, in encounter order.
pub fn extract_task_records(
    resource: &ResourceSpans,
    options: &ExtractOptions,
) -> PipelineResult<ExtractionReport> {
    let mut report = ExtractionReport::default();

    let task_spans = resource
        .scope_spans
        .iter()
        .filter(|scope| scope.scope_name() == Some(options.scope_name.as_str()))
        .flat_map(|scope| scope.spans.iter())
        .filter(|span| span.name.contains(TASK_SPAN_MARKER));

    for span in task_spans {
        let record_index = report.records.len();
        let (record, issues) = normalize_span(span);

        debug!(
            span = %span.name,
            task = record.task.as_deref().unwrap_or("-"),
            issues = issues.len(),
            "normalized task span"
        );

        if !issues.is_empty() {
            for issue in &issues {
                warn!(
                    span = %span.name,
                    record_index,
                    trace_id = %record.trace_id_display(),
                    issue = %issue,
                    "span payload could not be fully decoded"
                );
            }
            if options.strict {
                return Err(PipelineError::Extract {
                    span_index: record_index,
                    span_name: span.name.clone(),
                    issue: issues[0].clone(),
                });
            }
            report.issues.push(SpanIssues {
                record_index,
                span_name: span.name.clone(),
                trace_id: span.trace_id.clone(),
                issues,
            });
        }

        report.records.push(record);
    }

    info!(
        records = report.records.len(),
        issues = report.issue_count(),
        "extracted task records"
    );
    Ok(report)
}

/// Flatten one task span. Never fails; problems come back as issues.
pub fn normalize_span(span: &Span) -> (TaskRecord, Vec<ExtractIssue>) {
    let mut record = TaskRecord {
        start_time: span.start_time_unix_nano.clone(),
        end_time: span.end_time_unix_nano.clone(),
        trace_id: span.trace_id.clone(),
        workflow: span.attribute_str(keys::WORKFLOW_NAME).map(String::from),
        task: span.attribute_str(keys::ENTITY_NAME).map(String::from),
        ..Default::default()
    };
    let mut issues = Vec::new();

    if record.task.is_none() {
        issues.push(ExtractIssue::missing_attribute(keys::ENTITY_NAME));
    }

    match TaskKind::for_extraction(record.task.as_deref()) {
        TaskKind::Feedback => extract_feedback(span, &mut record, &mut issues),
        TaskKind::Toxicity => extract_toxicity(span, &mut record, &mut issues),
        TaskKind::Generation => extract_generation(span, &mut record, &mut issues),
        TaskKind::Other => {}
    }

    (record, issues)
}

fn extract_feedback(span: &Span, record: &mut TaskRecord, issues: &mut Vec<ExtractIssue>) {
    if let Some(input) = collect(issues, decode_attribute(span, keys::ENTITY_INPUT)) {
        record.feedback = collect(
            issues,
            positional_arg(keys::ENTITY_INPUT, &input, 0)
                .and_then(|v| expect_str(keys::ENTITY_INPUT, "args[0]", v)),
        );
    }

    if let Some(output) = collect(issues, decode_attribute(span, keys::ENTITY_OUTPUT)) {
        record.model = collect(
            issues,
            named_field(keys::ENTITY_OUTPUT, &output, "model_id")
                .and_then(|v| expect_str(keys::ENTITY_OUTPUT, "model_id", v)),
        );
        record.conversation = collect(
            issues,
            named_field(keys::ENTITY_OUTPUT, &output, "messages").and_then(|v| {
                serde_json::from_value::<Vec<ChatMessage>>(v.clone())
                    .map(|messages| format_history(&messages))
                    .map_err(|_| {
                        ExtractIssue::unexpected_shape(
                            keys::ENTITY_OUTPUT,
                            "messages",
                            "list of {role, content}",
                        )
                    })
            }),
        );
    }
}

fn extract_toxicity(span: &Span, record: &mut TaskRecord, issues: &mut Vec<ExtractIssue>) {
    if let Some(input) = collect(issues, decode_attribute(span, keys::ENTITY_INPUT)) {
        record.user_input = collect(
            issues,
            positional_arg(keys::ENTITY_INPUT, &input, 0)
                .and_then(|v| expect_str(keys::ENTITY_INPUT, "args[0]", v)),
        );
    }

    if let Some(output) = collect(issues, decode_attribute(span, keys::ENTITY_OUTPUT)) {
        record.toxicity_detected = collect(
            issues,
            output
                .get(0)
                .ok_or_else(|| ExtractIssue::missing_field(keys::ENTITY_OUTPUT, "[0]"))
                .and_then(|v| {
                    v.as_bool().ok_or_else(|| {
                        ExtractIssue::unexpected_shape(keys::ENTITY_OUTPUT, "[0]", "boolean")
                    })
                }),
        );
    }
}

fn extract_generation(span: &Span, record: &mut TaskRecord, issues: &mut Vec<ExtractIssue>) {
    if let Some(input) = collect(issues, decode_attribute(span, keys::ENTITY_INPUT)) {
        record.full_prompt = collect(
            issues,
            positional_arg(keys::ENTITY_INPUT, &input, 0)
                .and_then(|v| expect_str(keys::ENTITY_INPUT, "args[0]", v)),
        );
        record.model = collect(
            issues,
            positional_arg(keys::ENTITY_INPUT, &input, 1)
                .and_then(|v| expect_str(keys::ENTITY_INPUT, "args[1]", v)),
        );
    }

    if let Some(output) = collect(issues, decode_attribute(span, keys::ENTITY_OUTPUT)) {
        record.completion = Some(output);
    }
}

fn collect<T>(issues: &mut Vec<ExtractIssue>, result: Result<T, ExtractIssue>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(issue) => {
            issues.push(issue);
            None
        }
    }
}

/// Decode a JSON-encoded string attribute.
fn decode_attribute(span: &Span, key: &str) -> Result<Value, ExtractIssue> {
    let value = span
        .attribute(key)
        .ok_or_else(|| ExtractIssue::missing_attribute(key))?;
    let raw = value
        .as_str()
        .ok_or_else(|| ExtractIssue::unexpected_shape(key, "value", "stringValue"))?;
    serde_json::from_str(raw).map_err(|e| ExtractIssue::MalformedJson {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn positional_arg<'a>(key: &str, input: &'a Value, idx: usize) -> Result<&'a Value, ExtractIssue> {
    let args = input
        .get("args")
        .ok_or_else(|| ExtractIssue::missing_field(key, "args"))?;
    args.get(idx)
        .ok_or_else(|| ExtractIssue::missing_field(key, format!("args[{idx}]")))
}

fn named_field<'a>(key: &str, output: &'a Value, field: &str) -> Result<&'a Value, ExtractIssue> {
    output
        .get(field)
        .ok_or_else(|| ExtractIssue::missing_field(key, field))
}

fn expect_str(key: &str, field: &str, v: &Value) -> Result<String, ExtractIssue> {
    v.as_str()
        .map(String::from)
        .ok_or_else(|| ExtractIssue::unexpected_shape(key, field, "string"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::conversation::ConversationContext;
    use crate::trace::schema::{AnyValue, InstrumentationScope, KeyValue, ScopeSpans};

    fn kv(key: &str, value: &str) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: AnyValue::string(value),
        }
    }

    fn task_span(name: &str, task: &str, input: &str, output: &str) -> Span {
        Span {
            trace_id: Value::String("t1".into()),
            name: name.to_string(),
            start_time_unix_nano: Value::String("100".into()),
            end_time_unix_nano: Value::String("200".into()),
            attributes: vec![
                kv(keys::WORKFLOW_NAME, "generate_cfn"),
                kv(keys::ENTITY_NAME, task),
                kv(keys::ENTITY_INPUT, input),
                kv(keys::ENTITY_OUTPUT, output),
            ],
            ..Default::default()
        }
    }

    fn resource(scope: &str, spans: Vec<Span>) -> ResourceSpans {
        ResourceSpans {
            resource: None,
            scope_spans: vec![ScopeSpans {
                scope: Some(InstrumentationScope {
                    name: scope.to_string(),
                    version: None,
                }),
                spans,
            }],
        }
    }

    #[test]
    fn feedback_span_yields_label_model_and_transcript() {
        let span = task_span(
            "cfn_user_feedback.task",
            "cfn_user_feedback",
            r#"{"args":["helpful"]}"#,
            r#"{"model_id":"m1","messages":[{"role":"user","content":"hi"}],"user_feedback":1}"#,
        );
        let (rec, issues) = normalize_span(&span);
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(rec.feedback.as_deref(), Some("helpful"));
        assert_eq!(rec.model.as_deref(), Some("m1"));
        assert_eq!(rec.conversation.as_deref(), Some("Human:\nhi\n\n"));
        assert_eq!(rec.workflow.as_deref(), Some("generate_cfn"));
        assert!(rec.full_prompt.is_none());
    }

    #[test]
    fn null_message_content_keeps_the_transcript() {
        let span = task_span(
            "cfn_user_feedback.task",
            "cfn_user_feedback",
            r#"{"args":["not helpful"]}"#,
            r#"{"model_id":"m1","messages":[{"role":"user","content":"hi"},{"role":"assistant","content":null}],"user_feedback":-1}"#,
        );
        let (rec, issues) = normalize_span(&span);
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(
            rec.conversation.as_deref(),
            Some("Human:\nhi\n\nAssistant:\nnull\n\n")
        );
    }

    #[test]
    fn decodes_feedback_recorded_by_the_chat_side() {
        let mut ctx = ConversationContext::new("anthropic.claude-v2");
        ctx.push_user("make a bucket");
        ctx.push_assistant("```yaml\nResources: {}\n```");
        let output = serde_json::to_string(&ctx.record_feedback("helpful")).unwrap();

        let span = task_span(
            "cfn_user_feedback.task",
            "cfn_user_feedback",
            r#"{"args":["helpful"]}"#,
            &output,
        );
        let (rec, issues) = normalize_span(&span);
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(rec.model.as_deref(), Some("anthropic.claude-v2"));
        assert_eq!(rec.conversation, Some(format_history(&ctx.messages)));
    }

    #[test]
    fn toxicity_span_reads_first_output_element() {
        let span = task_span(
            "check_toxicity.task",
            "check_toxicity",
            r#"{"args":["you are great"],"kwargs":{}}"#,
            r#"[false, [{"Name":"PROFANITY","Score":0.01}]]"#,
        );
        let (rec, issues) = normalize_span(&span);
        assert!(issues.is_empty());
        assert_eq!(rec.user_input.as_deref(), Some("you are great"));
        assert_eq!(rec.toxicity_detected, Some(false));
    }

    #[test]
    fn generation_span_keeps_raw_completion() {
        let span = task_span(
            "llm_call.task",
            "llm_call",
            r#"{"args":["Human: hi\n\nAssistant:","anthropic.claude-v2"]}"#,
            r#""```yaml\nResources: {}\n```""#,
        );
        let (rec, issues) = normalize_span(&span);
        assert!(issues.is_empty());
        assert_eq!(rec.model.as_deref(), Some("anthropic.claude-v2"));
        assert_eq!(rec.completion_text(), Some("```yaml\nResources: {}\n```"));
    }

    #[test]
    fn malformed_payload_is_isolated_to_its_span() {
        let bad = task_span("llm_call.task", "llm_call", "{not json", r#""ok""#);
        let good = task_span(
            "check_toxicity.task",
            "check_toxicity",
            r#"{"args":["x"]}"#,
            "[true]",
        );
        let report =
            extract_task_records(&resource("traceloop.tracer", vec![bad, good]), &ExtractOptions::default())
                .unwrap();

        assert_eq!(report.records.len(), 2);
        assert!(report.records[0].full_prompt.is_none());
        assert_eq!(report.records[0].completion_text(), Some("ok"));
        assert_eq!(report.records[1].toxicity_detected, Some(true));
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].record_index, 0);
        assert!(matches!(
            report.issues[0].issues[0],
            ExtractIssue::MalformedJson { .. }
        ));
    }

    #[test]
    fn strict_mode_aborts_on_first_issue() {
        let bad = task_span("llm_call.task", "llm_call", r#"{"args":["only prompt"]}"#, r#""x""#);
        let opts = ExtractOptions {
            strict: true,
            ..Default::default()
        };
        let err = extract_task_records(&resource("traceloop.tracer", vec![bad]), &opts).unwrap_err();
        match err {
            PipelineError::Extract { span_index, issue, .. } => {
                assert_eq!(span_index, 0);
                assert_eq!(issue, ExtractIssue::missing_field(keys::ENTITY_INPUT, "args[1]"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn skips_other_scopes_and_workflow_spans() {
        let mut workflow = task_span("generate_cfn.workflow", "generate_cfn", "{}", "{}");
        workflow.name = "generate_cfn.workflow".into();
        let task = task_span("check_toxicity.task", "check_toxicity", r#"{"args":["x"]}"#, "[false]");

        let mut rs = resource("traceloop.tracer", vec![workflow, task.clone()]);
        rs.scope_spans.push(ScopeSpans {
            scope: Some(InstrumentationScope {
                name: "opentelemetry.instrumentation.botocore".into(),
                version: None,
            }),
            spans: vec![task],
        });

        let report = extract_task_records(&rs, &ExtractOptions::default()).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].task.as_deref(), Some("check_toxicity"));
    }

    #[test]
    fn missing_task_name_is_reported_and_record_still_emitted() {
        let span = Span {
            name: "anonymous.task".into(),
            ..Default::default()
        };
        let (rec, issues) = normalize_span(&span);
        assert!(rec.task.is_none());
        assert_eq!(issues, vec![ExtractIssue::missing_attribute(keys::ENTITY_NAME)]);
    }

    #[test]
    fn non_string_attribute_is_unexpected_shape() {
        let mut span = task_span("llm_call.task", "llm_call", "{}", r#""x""#);
        span.attributes[2].value = AnyValue {
            bool_value: Some(true),
            ..Default::default()
        };
        let (_, issues) = normalize_span(&span);
        assert_eq!(
            issues,
            vec![ExtractIssue::unexpected_shape(keys::ENTITY_INPUT, "value", "stringValue")]
        );
    }
}
