//! Object store seam: fetch one trace export by bucket and key.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{PipelineError, PipelineResult};
use crate::providers::aws::sigv4::uri_encode;
use crate::providers::aws::{AwsConfig, AwsCredentials, AwsHttpBackend, AwsRequest, AwsService};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> PipelineResult<Vec<u8>>;
}

/// S3 `GetObject`, path-style addressing.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    http: AwsHttpBackend,
}

impl S3ObjectStore {
    pub fn new(config: &AwsConfig, credentials: AwsCredentials) -> anyhow::Result<Self> {
        let http = AwsHttpBackend::new(config, AwsService::S3, credentials)?;
        Ok(Self { http })
    }

    pub fn from_env(config: &AwsConfig) -> anyhow::Result<Self> {
        Self::new(config, AwsCredentials::from_env()?)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> PipelineResult<Vec<u8>> {
        let path = format!("/{}/{}", uri_encode(bucket, true), uri_encode(key, false));
        let body = self
            .http
            .send(&AwsRequest::get(path))
            .await
            .map_err(|e| object_error(bucket, key, e))?;
        debug!(bucket, key, bytes = body.len(), "fetched object");
        Ok(body)
    }
}

/// Reads `<root>/<bucket>/<key>` from the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, bucket: &str, key: &str) -> PipelineResult<PathBuf> {
        let escapes = |s: &str| s.split('/').any(|part| part == "..");
        if escapes(bucket) || escapes(key) || bucket.contains('/') {
            return Err(object_error(bucket, key, "path escapes the store root"));
        }
        Ok(self.root.join(bucket).join(key.trim_start_matches('/')))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> PipelineResult<Vec<u8>> {
        let path = self.path_for(bucket, key)?;
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| object_error(bucket, key, format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), bytes = body.len(), "read local object");
        Ok(body)
    }
}

fn object_error(bucket: &str, key: &str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::ObjectStore {
        bucket: bucket.to_string(),
        key: key.to_string(),
        message: err.to_string(),
    }
}
