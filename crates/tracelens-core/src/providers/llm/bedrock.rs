use super::LlmClient;
use crate::model::{GenerationParams, LlmResponse};
use crate::providers::aws::sigv4::uri_encode;
use crate::providers::aws::{AwsConfig, AwsCredentials, AwsHttpBackend, AwsRequest, AwsService};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

/// Bedrock runtime client for text-completion models (`InvokeModel`).
#[derive(Debug, Clone)]
pub struct BedrockClient {
    http: AwsHttpBackend,
}

impl BedrockClient {
    pub fn new(config: &AwsConfig, credentials: AwsCredentials) -> anyhow::Result<Self> {
        let http = AwsHttpBackend::new(config, AwsService::Bedrock, credentials)?;
        Ok(Self { http })
    }

    /// Authenticate with a Bedrock API key.
    pub fn with_api_key(config: &AwsConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let http = AwsHttpBackend::with_bearer_token(config, AwsService::Bedrock, api_key)?;
        Ok(Self { http })
    }

    /// Use `AWS_BEARER_TOKEN_BEDROCK` when set, SigV4 credentials otherwise.
    pub fn from_env(config: &AwsConfig) -> anyhow::Result<Self> {
        match crate::providers::aws::non_empty_env("AWS_BEARER_TOKEN_BEDROCK") {
            Some(token) => Self::with_api_key(config, token),
            None => Self::new(config, AwsCredentials::from_env()?),
        }
    }
}

#[async_trait]
impl LlmClient for BedrockClient {
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> anyhow::Result<LlmResponse> {
        let body = json!({
            "prompt": prompt,
            "max_tokens_to_sample": params.max_tokens,
            "temperature": params.temperature,
        });
        let path = format!("/model/{}/invoke", uri_encode(&params.model_id, true));
        let request = AwsRequest::post(path, serde_json::to_vec(&body)?)
            .header("content-type", "application/json")
            .header("accept", "application/json");

        let raw = self.http.send(&request).await?;
        let json: serde_json::Value =
            serde_json::from_slice(&raw).context("Bedrock response is not JSON")?;

        let text = json
            .get("completion")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Bedrock response has no 'completion' field"))?
            .to_string();

        let meta = json!({
            "stop_reason": json.get("stop_reason").cloned().unwrap_or(serde_json::Value::Null),
        });

        Ok(LlmResponse {
            text,
            provider: "bedrock".to_string(),
            model: params.model_id.clone(),
            meta,
        })
    }

    fn provider_name(&self) -> &'static str {
        "bedrock"
    }
}
