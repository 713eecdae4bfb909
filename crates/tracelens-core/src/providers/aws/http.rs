//! HTTP layer for the AWS adapters: signing, status mapping, retry.
//!
//! This is the only place that interprets status codes. Adapters hand in an
//! [`AwsRequest`] and get the response body back.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use tracing::{debug, warn};

use super::sigv4::{self, SigningInput};
use super::{AwsConfig, AwsCredentials, AwsService};

const USER_AGENT_VALUE: &str = concat!("tracelens/", env!("CARGO_PKG_VERSION"));
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Errors from AWS calls.
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    /// No usable credentials.
    #[error("missing AWS credentials: {message}")]
    Credentials { message: String },

    /// 401/403.
    #[error("access denied: {message}")]
    AccessDenied { message: String },

    /// 404.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// 429, or a throttling error code.
    #[error("throttled: retry after {retry_after:?}")]
    Throttled { retry_after: Option<Duration> },

    /// Any other 4xx. `message` is the service's own error message.
    #[error("HTTP {status}: {message}")]
    Service { status: u16, message: String },

    /// Transport failures and 5xx.
    #[error("network error: {message}")]
    Network { message: String },

    /// The configured endpoint is not a usable URL.
    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    /// The body of a successful response did not decode.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl AwsError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::Network { .. })
    }
}

impl From<reqwest::Error> for AwsError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

pub type AwsResult<T> = Result<T, AwsError>;

/// One request against a service endpoint.
#[derive(Debug, Clone)]
pub struct AwsRequest {
    pub method: reqwest::Method,
    /// Percent-encoded path, starting with `/`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl AwsRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::GET,
            path: path.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: reqwest::Method::POST,
            path: path.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Clone)]
enum Auth {
    SigV4(AwsCredentials),
    Bearer(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SigV4(creds) => f.debug_tuple("SigV4").field(creds).finish(),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// HTTP backend bound to one service endpoint.
#[derive(Debug, Clone)]
pub struct AwsHttpBackend {
    client: reqwest::Client,
    service: AwsService,
    endpoint: String,
    host: String,
    region: String,
    auth: Auth,
    max_retries: u32,
}

impl AwsHttpBackend {
    pub fn new(
        config: &AwsConfig,
        service: AwsService,
        credentials: AwsCredentials,
    ) -> AwsResult<Self> {
        Self::build(config, service, Auth::SigV4(credentials))
    }

    /// Authenticate with a bearer token instead of SigV4 (Bedrock API keys).
    pub fn with_bearer_token(
        config: &AwsConfig,
        service: AwsService,
        token: impl Into<String>,
    ) -> AwsResult<Self> {
        Self::build(config, service, Auth::Bearer(token.into()))
    }

    fn build(config: &AwsConfig, service: AwsService, auth: Auth) -> AwsResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| AwsError::Network {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        let endpoint = config.endpoint(service);
        let host = host_of(&endpoint)?;

        Ok(Self {
            client,
            service,
            endpoint,
            host,
            region: config.region.clone(),
            auth,
            max_retries: config.max_retries,
        })
    }

    pub fn service(&self) -> AwsService {
        self.service
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send with retry on throttling and transient errors. Returns the body
    /// of the first 2xx response.
    pub async fn send(&self, request: &AwsRequest) -> AwsResult<Vec<u8>> {
        use rand::Rng;

        let mut retries = 0;
        loop {
            match self.send_once(request).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;

                    let backoff = match &e {
                        AwsError::Throttled {
                            retry_after: Some(retry_after),
                        } => {
                            let capped = (*retry_after).min(MAX_BACKOFF);
                            let jitter: f64 = rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
                            let ms = ((capped.as_millis() as f64) * jitter).round() as u64;
                            Duration::from_millis(ms.max(100))
                        }
                        _ => {
                            let base = backoff_ceiling(retries);
                            let ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64);
                            Duration::from_millis(ms.max(10))
                        }
                    };

                    warn!(
                        service = self.service.signing_name(),
                        error = %e,
                        retry = retries,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying AWS request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &AwsRequest) -> AwsResult<Vec<u8>> {
        let url = format!("{}{}", self.endpoint, request.path);
        debug!(
            service = self.service.signing_name(),
            method = %request.method,
            url = %url,
            bytes = request.body.len(),
            "AWS request"
        );

        let mut builder = self.client.request(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        match &self.auth {
            Auth::SigV4(credentials) => {
                let input = SigningInput {
                    method: request.method.as_str(),
                    path: &request.path,
                    host: &self.host,
                    headers: &request.headers,
                    payload: &request.body,
                    region: &self.region,
                    service: self.service.signing_name(),
                    double_encode_path: self.service != AwsService::S3,
                    content_sha256_header: self.service == AwsService::S3,
                };
                for (name, value) in sigv4::sign(&input, credentials, Utc::now()) {
                    builder = builder.header(name, value);
                }
            }
            Auth::Bearer(token) => {
                builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
            }
        }

        let response = builder.body(request.body.clone()).send().await?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.bytes().await?.to_vec();

        match status.as_u16() {
            200..=299 => Ok(body),

            401 | 403 => Err(AwsError::AccessDenied {
                message: error_message(&body),
            }),

            404 => Err(AwsError::NotFound {
                message: error_message(&body),
            }),

            429 => Err(AwsError::Throttled { retry_after }),

            400..=499 => {
                let text = String::from_utf8_lossy(&body);
                if text.contains("Throttling") || text.contains("SlowDown") {
                    return Err(AwsError::Throttled { retry_after });
                }
                Err(AwsError::Service {
                    status: status.as_u16(),
                    message: error_message(&body),
                })
            }

            _ => Err(AwsError::Network {
                message: format!("HTTP {}: {}", status.as_u16(), error_message(&body)),
            }),
        }
    }
}

/// `host[:port]` as reqwest will send it in the Host header.
fn host_of(endpoint: &str) -> AwsResult<String> {
    let url = url::Url::parse(endpoint).map_err(|e| AwsError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;
    let host = url.host_str().ok_or_else(|| AwsError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: "no host".to_string(),
    })?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Best-effort extraction of the service's error message from a JSON
/// (`message`/`Message`) or XML (`<Message>`) error body.
pub(crate) fn error_message(body: &[u8]) -> String {
    if let Ok(v) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "Message"] {
            if let Some(m) = v.get(key).and_then(|m| m.as_str()) {
                return m.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    if let Some((_, rest)) = text.split_once("<Message>") {
        if let Some((msg, _)) = rest.split_once("</Message>") {
            return msg.to_string();
        }
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(512).collect()
    }
}

/// Upper bound of the jittered backoff before retry number `retry`.
fn backoff_ceiling(retry: u32) -> Duration {
    Duration::from_secs(1u64 << retry.min(5)).min(MAX_BACKOFF)
}
