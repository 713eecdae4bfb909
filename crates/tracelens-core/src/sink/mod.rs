//! Delivery-stream sink for analyzed records.
//!
//! A sink receives one batch per invocation. Each payload is a complete,
//! newline-terminated JSON document; sinks never re-frame them.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::errors::{PipelineError, PipelineResult};
use crate::providers::aws::{AwsConfig, AwsCredentials, AwsHttpBackend, AwsRequest, AwsService};

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Deliver every payload, in order. Partial delivery is an error.
    async fn put_batch(&self, stream: &str, records: Vec<Vec<u8>>) -> PipelineResult<()>;
}

/// `PutRecordBatch` limits.
pub const MAX_BATCH_RECORDS: usize = 500;
pub const MAX_BATCH_BYTES: usize = 4 * 1024 * 1024;

/// Kinesis Data Firehose `PutRecordBatch`.
#[derive(Debug, Clone)]
pub struct FirehoseSink {
    http: AwsHttpBackend,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutRecordBatchOutput {
    #[serde(default)]
    failed_put_count: usize,
}

impl FirehoseSink {
    pub fn new(config: &AwsConfig, credentials: AwsCredentials) -> anyhow::Result<Self> {
        let http = AwsHttpBackend::new(config, AwsService::Firehose, credentials)?;
        Ok(Self { http })
    }

    pub fn from_env(config: &AwsConfig) -> anyhow::Result<Self> {
        Self::new(config, AwsCredentials::from_env()?)
    }

    async fn put_chunk(&self, stream: &str, chunk: &[Vec<u8>]) -> PipelineResult<usize> {
        let engine = base64::engine::general_purpose::STANDARD;
        let records: Vec<_> = chunk
            .iter()
            .map(|data| json!({ "Data": engine.encode(data) }))
            .collect();
        let body = json!({
            "DeliveryStreamName": stream,
            "Records": records,
        });
        let body = serde_json::to_vec(&body).map_err(|e| sink_error(stream, e))?;

        let request = AwsRequest::post("/", body)
            .header("content-type", "application/x-amz-json-1.1")
            .header("x-amz-target", "Firehose_20150804.PutRecordBatch");

        let raw = self
            .http
            .send(&request)
            .await
            .map_err(|e| sink_error(stream, e))?;
        let out: PutRecordBatchOutput = serde_json::from_slice(&raw)
            .map_err(|e| sink_error(stream, format!("unreadable PutRecordBatch response: {e}")))?;
        Ok(out.failed_put_count)
    }
}

#[async_trait]
impl RecordSink for FirehoseSink {
    async fn put_batch(&self, stream: &str, records: Vec<Vec<u8>>) -> PipelineResult<()> {
        let total = records.len();
        let mut failed = 0;
        for chunk in chunk_batch(&records) {
            let chunk_failed = self.put_chunk(stream, chunk).await?;
            if chunk_failed > 0 {
                warn!(stream, failed = chunk_failed, size = chunk.len(), "records rejected");
            }
            failed += chunk_failed;
        }
        if failed > 0 {
            return Err(PipelineError::SinkDelivery {
                stream: stream.to_string(),
                failed,
                total,
            });
        }
        info!(stream, records = total, "delivered batch");
        Ok(())
    }
}

/// Split a batch into request-sized chunks, keeping order.
pub fn chunk_batch(records: &[Vec<u8>]) -> Vec<&[Vec<u8>]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut bytes = 0;
    for (i, record) in records.iter().enumerate() {
        let full = i - start == MAX_BATCH_RECORDS || (i > start && bytes + record.len() > MAX_BATCH_BYTES);
        if full {
            chunks.push(&records[start..i]);
            start = i;
            bytes = 0;
        }
        bytes += record.len();
    }
    if start < records.len() {
        chunks.push(&records[start..]);
    }
    chunks
}

/// Appends each stream's records to `<dir>/<stream>.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonlFileSink {
    dir: PathBuf,
}

impl JsonlFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{stream}.jsonl"))
    }
}

#[async_trait]
impl RecordSink for JsonlFileSink {
    async fn put_batch(&self, stream: &str, records: Vec<Vec<u8>>) -> PipelineResult<()> {
        if stream.is_empty() || stream.contains(['/', '\\']) {
            return Err(sink_error(stream, "stream name is not a valid file name"));
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| sink_error(stream, e))?;
        let path = self.path_for(stream);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| sink_error(stream, format!("{}: {e}", path.display())))?;
        for record in &records {
            file.write_all(record)
                .await
                .map_err(|e| sink_error(stream, e))?;
        }
        file.flush().await.map_err(|e| sink_error(stream, e))?;
        debug!(path = %path.display(), records = records.len(), "appended batch");
        Ok(())
    }
}

/// Keeps every delivered payload in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<(String, Vec<u8>)>>,
    batches: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads delivered so far, with their stream names.
    pub fn records(&self) -> Vec<(String, Vec<u8>)> {
        self.delivered
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Delivered payloads decoded as JSON.
    pub fn json_records(&self) -> Vec<serde_json::Value> {
        self.records()
            .iter()
            .filter_map(|(_, data)| serde_json::from_slice(data).ok())
            .collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().map(|g| *g).unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn put_batch(&self, stream: &str, records: Vec<Vec<u8>>) -> PipelineResult<()> {
        let mut delivered = self
            .delivered
            .lock()
            .map_err(|_| sink_error(stream, "memory sink poisoned"))?;
        delivered.extend(records.into_iter().map(|r| (stream.to_string(), r)));
        if let Ok(mut batches) = self.batches.lock() {
            *batches += 1;
        }
        Ok(())
    }
}

fn sink_error(stream: &str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Sink {
        stream: stream.to_string(),
        message: err.to_string(),
    }
}
