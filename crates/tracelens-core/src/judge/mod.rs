mod judge_internal;

use crate::model::GenerationParams;
use crate::providers::llm::LlmClient;
use crate::trace::record::JudgeAnswer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use judge_internal::parse::{parse_judge_output, ParseFailure};
pub use judge_internal::prompt::{build_judge_prompt, normalize_roles};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub model_id: String,
    pub max_tokens: u32,
    /// Deliberately high: the judge is asked to self-critique.
    pub temperature: f32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model_id: "anthropic.claude-instant-v1".to_string(),
            max_tokens: 100,
            temperature: 0.9,
        }
    }
}

impl JudgeConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            model_id: self.model_id.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// The judge's two answers, in question order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JudgeVerdict {
    pub security_issue_found: JudgeAnswer,
    pub answered_question: JudgeAnswer,
}

impl JudgeVerdict {
    pub fn unparsed() -> Self {
        Self {
            security_issue_found: JudgeAnswer::Unparsed,
            answered_question: JudgeAnswer::Unparsed,
        }
    }
}

/// Runs the two-question self-evaluation against a generated template.
#[derive(Clone)]
pub struct JudgeService {
    config: JudgeConfig,
    client: Arc<dyn LlmClient>,
}

impl JudgeService {
    pub fn new(config: JudgeConfig, client: Arc<dyn LlmClient>) -> Self {
        Self { config, client }
    }

    /// One inference call. A failed call is an error; an unreadable answer
    /// is not, it degrades to [`JudgeVerdict::unparsed`].
    pub async fn evaluate(&self, full_prompt: &str, artifact: &str) -> anyhow::Result<JudgeVerdict> {
        judge_internal::run::evaluate_impl(self, full_prompt, artifact).await
    }
}
