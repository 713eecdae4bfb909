use super::LlmClient;
use crate::model::{GenerationParams, LlmResponse};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// Scripted client for tests and offline runs.
///
/// Returns queued results in order, then the fixed response. Every call is
/// recorded so tests can assert on prompts and parameters.
#[derive(Debug, Default)]
pub struct FakeClient {
    fixed_response: Option<String>,
    queued: Mutex<Vec<anyhow::Result<String>>>,
    calls: Mutex<Vec<(String, GenerationParams)>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    /// Queue a failing call.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Err(anyhow::anyhow!(message.into())));
        self
    }

    pub fn calls(&self) -> Vec<(String, GenerationParams)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> anyhow::Result<LlmResponse> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((prompt.to_string(), params.clone()));

        let next = {
            let mut queued = self.queued.lock().unwrap_or_else(PoisonError::into_inner);
            if queued.is_empty() {
                None
            } else {
                Some(queued.remove(0))
            }
        };

        let text = match next {
            Some(result) => result?,
            None => self
                .fixed_response
                .clone()
                .unwrap_or_else(|| "1. no\n2. yes\n".to_string()),
        };

        Ok(LlmResponse {
            text,
            provider: "fake".to_string(),
            model: params.model_id.clone(),
            meta: serde_json::json!({}),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
