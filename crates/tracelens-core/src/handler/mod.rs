//! Event handlers for the two pipeline stages.
//!
//! The event and response shapes are those of the serverless deployment:
//! the extractor is triggered by an object-created notification, the
//! analyzer receives the extractor's response either directly or wrapped in
//! an asynchronous-invocation destination envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, info_span, Instrument};

use crate::analyze::{encode_batch, Analyzer};
use crate::errors::{PipelineError, PipelineResult};
use crate::sink::RecordSink;
use crate::storage::ObjectStore;
use crate::trace::extract::{extract_task_records, ExtractOptions, ExtractionReport};
use crate::trace::record::{AnalyzedRecord, TaskRecord};
use crate::trace::schema::TraceExport;

/// Body of a successful analyze response.
pub const ANALYZE_COMPLETE: &str = "complete";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }
}

/// Object-created notification. Only the first record is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// URL-encoded as delivered in notifications.
    pub key: String,
}

impl S3Event {
    /// Event for one object; `key` is encoded the way notifications encode it.
    pub fn for_object(bucket: impl Into<String>, key: &str) -> Self {
        let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
        Self {
            records: vec![S3EventRecord {
                s3: S3Entity {
                    bucket: S3Bucket { name: bucket.into() },
                    object: S3Object {
                        key: encoded.replace("%2F", "/"),
                    },
                },
            }],
        }
    }

    /// Bucket and decoded key of the first record.
    pub fn first_object(&self) -> PipelineResult<(String, String)> {
        let record = self
            .records
            .first()
            .ok_or_else(|| PipelineError::malformed_event("event has no Records"))?;
        Ok((
            record.s3.bucket.name.clone(),
            decode_object_key(&record.s3.object.key),
        ))
    }
}

/// Notification keys are form-encoded: `+` is a space, `%XX` a byte.
pub fn decode_object_key(raw: &str) -> String {
    let escaped = raw.replace('&', "%26").replace('=', "%3D");
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
        .unwrap_or_default()
}

/// Analyze-stage event: the extractor's response, bare or inside the
/// destination envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyzeEvent {
    Direct {
        body: Value,
    },
    Destination {
        #[serde(rename = "responsePayload")]
        response_payload: AnalyzePayload,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzePayload {
    pub body: Value,
}

impl AnalyzeEvent {
    pub fn direct(records: &[TaskRecord]) -> PipelineResult<Self> {
        let body = serde_json::to_string(records)
            .map_err(|e| PipelineError::decode("task records", e))?;
        Ok(Self::Direct {
            body: Value::String(body),
        })
    }

    fn body(&self) -> &Value {
        match self {
            Self::Direct { body } => body,
            Self::Destination { response_payload } => &response_payload.body,
        }
    }

    /// Decode the record batch. The body is normally a JSON-encoded string;
    /// an inline array is accepted too.
    pub fn records(&self) -> PipelineResult<Vec<TaskRecord>> {
        match self.body() {
            Value::String(s) => {
                serde_json::from_str(s).map_err(|e| PipelineError::decode("task record batch", e))
            }
            v @ Value::Array(_) => serde_json::from_value(v.clone())
                .map_err(|e| PipelineError::decode("task record batch", e)),
            other => Err(PipelineError::malformed_event(format!(
                "body must be a JSON array or a string holding one, got {}",
                json_type(other)
            ))),
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode an export and keep its first resource-span tree.
pub fn decode_export(bytes: &[u8]) -> PipelineResult<TraceExport> {
    let export: TraceExport =
        serde_json::from_slice(bytes).map_err(|e| PipelineError::decode("trace export", e))?;
    if export.resource_spans.is_empty() {
        return Err(PipelineError::EmptyExport);
    }
    Ok(export)
}

/// Fetch the object named by the event and extract its task records.
pub async fn extract_from_event(
    event: &S3Event,
    store: &dyn ObjectStore,
    options: &ExtractOptions,
) -> PipelineResult<ExtractionReport> {
    let (bucket, key) = event.first_object()?;
    let span = info_span!("tracelens.extract", bucket = %bucket, key = %key);
    async move {
        let bytes = store.get_object(&bucket, &key).await?;
        let export = decode_export(&bytes)?;
        let resource = &export.resource_spans[0];
        info!(
            service = resource.service_name().unwrap_or("-"),
            resource_spans = export.resource_spans.len(),
            "processing trace export"
        );
        extract_task_records(resource, options)
    }
    .instrument(span)
    .await
}

/// Extractor entry point. The response body is the JSON array of records.
pub async fn handle_extract(
    event: &S3Event,
    store: &dyn ObjectStore,
    options: &ExtractOptions,
) -> PipelineResult<HandlerResponse> {
    let result = async {
        let report = extract_from_event(event, store, options).await?;
        let body = serde_json::to_string(&report.records)
            .map_err(|e| PipelineError::decode("task records", e))?;
        Ok::<_, PipelineError>(HandlerResponse::ok(body))
    }
    .await;
    result.inspect_err(|e| log_failure("extract", e))
}

/// Analyze every record, then deliver the whole batch in one write. Nothing
/// is written if any record fails, and an empty batch writes nothing.
pub async fn analyze_and_deliver(
    records: Vec<TaskRecord>,
    analyzer: &Analyzer,
    sink: &dyn RecordSink,
    stream: &str,
) -> PipelineResult<Vec<AnalyzedRecord>> {
    let span = info_span!("tracelens.analyze", stream = %stream, records = records.len());
    async move {
        let analyzed = analyzer.analyze_batch(records).await?;
        if analyzed.is_empty() {
            info!("empty batch, nothing to deliver");
            return Ok(analyzed);
        }
        let payloads = encode_batch(&analyzed)?;
        sink.put_batch(stream, payloads).await?;
        Ok(analyzed)
    }
    .instrument(span)
    .await
}

/// Analyzer entry point.
pub async fn handle_analyze(
    event: &AnalyzeEvent,
    analyzer: &Analyzer,
    sink: &dyn RecordSink,
    stream: &str,
) -> PipelineResult<HandlerResponse> {
    let result = async {
        let records = event.records()?;
        analyze_and_deliver(records, analyzer, sink, stream).await?;
        Ok::<_, PipelineError>(HandlerResponse::ok(ANALYZE_COMPLETE))
    }
    .await;
    result.inspect_err(|e| log_failure("analyze", e))
}

/// One `error` event per failed invocation, keyed by [`PipelineError::kind`].
pub fn log_failure(stage: &str, err: &PipelineError) {
    error!(stage, kind = err.kind(), error = %err, "invocation failed");
}
