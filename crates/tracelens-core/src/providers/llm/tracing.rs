use crate::model::{GenerationParams, LlmResponse};
use crate::providers::llm::LlmClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// Wraps a client in a `gen_ai.client.request` span. Prompts are never
/// recorded on the span; only their length is.
pub struct TracingLlmClient {
    inner: Arc<dyn LlmClient>,
}

impl TracingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LlmClient for TracingLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> anyhow::Result<LlmResponse> {
        let span = info_span!(
            "gen_ai.client.request",
            "gen_ai.system" = self.inner.provider_name(),
            "gen_ai.request.model" = params.model_id.as_str(),
            "gen_ai.request.max_tokens" = params.max_tokens,
            "gen_ai.request.temperature" = params.temperature as f64,
            "tracelens.prompt_chars" = prompt.len(),
            "tracelens.completion_chars" = tracing::field::Empty,
            "tracelens.duration_ms" = tracing::field::Empty,
            "error" = tracing::field::Empty,
            "error.message" = tracing::field::Empty
        );

        async move {
            let start = std::time::Instant::now();
            let result = self.inner.complete(prompt, params).await;

            let span = tracing::Span::current();
            span.record("tracelens.duration_ms", start.elapsed().as_millis() as u64);
            match &result {
                Ok(resp) => {
                    span.record("tracelens.completion_chars", resp.text.len());
                }
                Err(e) => {
                    span.record("error", true);
                    span.record("error.message", format!("{e:#}").as_str());
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::fake::FakeClient;

    fn params() -> GenerationParams {
        GenerationParams {
            model_id: "anthropic.claude-instant-v1".into(),
            max_tokens: 100,
            temperature: 0.9,
        }
    }

    #[tokio::test]
    async fn passes_through_success() {
        let inner = Arc::new(FakeClient::new().with_response("1. no\n2. no"));
        let client = TracingLlmClient::new(inner.clone());
        let resp = client.complete("prompt", &params()).await.unwrap();
        assert_eq!(resp.text, "1. no\n2. no");
        assert_eq!(client.provider_name(), "fake");
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn passes_through_errors() {
        let inner = Arc::new(FakeClient::new().with_error("boom"));
        let client = TracingLlmClient::new(inner);
        let err = client.complete("prompt", &params()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
