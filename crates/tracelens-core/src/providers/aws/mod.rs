//! Shared plumbing for the AWS adapters: credentials, region and endpoint
//! configuration, SigV4 signing and the retrying HTTP backend.

pub mod http;
pub mod sigv4;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use http::{AwsError, AwsHttpBackend, AwsRequest, AwsResult};

/// The services the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AwsService {
    S3,
    CloudFormation,
    Bedrock,
    Firehose,
}

impl AwsService {
    /// Service name used in the SigV4 credential scope.
    pub fn signing_name(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::CloudFormation => "cloudformation",
            Self::Bedrock => "bedrock",
            Self::Firehose => "firehose",
        }
    }

    pub fn default_endpoint(self, region: &str) -> String {
        match self {
            Self::S3 => format!("https://s3.{region}.amazonaws.com"),
            Self::CloudFormation => format!("https://cloudformation.{region}.amazonaws.com"),
            Self::Bedrock => format!("https://bedrock-runtime.{region}.amazonaws.com"),
            Self::Firehose => format!("https://firehose.{region}.amazonaws.com"),
        }
    }
}

/// Static credentials. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Read credentials from the standard environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `AWS_ACCESS_KEY_ID` | Access key (required) |
    /// | `AWS_SECRET_ACCESS_KEY` | Secret key (required) |
    /// | `AWS_SESSION_TOKEN` | Session token (set inside Lambda) |
    pub fn from_env() -> AwsResult<Self> {
        let access_key_id = non_empty_env("AWS_ACCESS_KEY_ID").ok_or_else(|| {
            AwsError::Credentials {
                message: "AWS_ACCESS_KEY_ID is not set".to_string(),
            }
        })?;
        let secret_access_key = non_empty_env("AWS_SECRET_ACCESS_KEY").ok_or_else(|| {
            AwsError::Credentials {
                message: "AWS_SECRET_ACCESS_KEY is not set".to_string(),
            }
        })?;
        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: non_empty_env("AWS_SESSION_TOKEN"),
        })
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Endpoint overrides, for local stacks and tests. Unset services use the
/// regional default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointOverrides {
    pub s3: Option<String>,
    pub cloudformation: Option<String>,
    pub bedrock: Option<String>,
    pub firehose: Option<String>,
}

impl EndpointOverrides {
    pub fn get(&self, service: AwsService) -> Option<&str> {
        match service {
            AwsService::S3 => self.s3.as_deref(),
            AwsService::CloudFormation => self.cloudformation.as_deref(),
            AwsService::Bedrock => self.bedrock.as_deref(),
            AwsService::Firehose => self.firehose.as_deref(),
        }
    }

    pub fn set(&mut self, service: AwsService, url: impl Into<String>) {
        let slot = match service {
            AwsService::S3 => &mut self.s3,
            AwsService::CloudFormation => &mut self.cloudformation,
            AwsService::Bedrock => &mut self.bedrock,
            AwsService::Firehose => &mut self.firehose,
        };
        *slot = Some(url.into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConfig {
    pub region: String,
    /// Per-attempt request timeout.
    pub timeout_secs: u64,
    /// Retries for throttling and transient failures.
    pub max_retries: u32,
    pub endpoints: EndpointOverrides,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            timeout_secs: 30,
            max_retries: 1,
            endpoints: EndpointOverrides::default(),
        }
    }
}

impl AwsConfig {
    /// Base URL for a service, without trailing slash.
    pub fn endpoint(&self, service: AwsService) -> String {
        match self.endpoints.get(service) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => service.default_endpoint(&self.region),
        }
    }

    pub fn with_endpoint(mut self, service: AwsService, url: impl Into<String>) -> Self {
        self.endpoints.set(service, url);
        self
    }
}

pub(crate) fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
