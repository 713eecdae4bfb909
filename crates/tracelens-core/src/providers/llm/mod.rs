use crate::model::{GenerationParams, LlmResponse};
use async_trait::async_trait;

pub mod bedrock;
pub mod fake;
pub mod tracing;

/// Generative-model inference: one prompt in, one completion out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> anyhow::Result<LlmResponse>;

    fn provider_name(&self) -> &'static str;
}
