//! Analysis of `llm_call` records: dialogue depth, template artifact
//! validation and the judge self-evaluation.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{PipelineError, PipelineResult};
use crate::judge::JudgeService;
use crate::providers::validator::TemplateValidator;
use crate::trace::record::{Analysis, TaskRecord};

pub const ARTIFACT_OPEN: &str = "```yaml";
pub const ARTIFACT_CLOSE: &str = "```";
pub const HUMAN_MARKER: &str = "Human:";

/// Human turns in the prompt, not counting the system preamble and the
/// trailing scaffold. Degenerate prompts give zero or negative values.
pub fn dialogue_turns(full_prompt: &str) -> i64 {
    full_prompt.matches(HUMAN_MARKER).count() as i64 - 2
}

/// Text between the first ```` ```yaml ```` fence and the next ```` ``` ````
/// (or the end of the completion when the fence is never closed).
pub fn extract_artifact(completion: &str) -> Option<&str> {
    let (_, rest) = completion.split_once(ARTIFACT_OPEN)?;
    Some(
        rest.split_once(ARTIFACT_CLOSE)
            .map_or(rest, |(artifact, _)| artifact),
    )
}

#[derive(Clone)]
pub struct GenerationAnalyzer {
    validator: Arc<dyn TemplateValidator>,
    judge: JudgeService,
}

impl GenerationAnalyzer {
    pub fn new(validator: Arc<dyn TemplateValidator>, judge: JudgeService) -> Self {
        Self { validator, judge }
    }

    pub async fn analyze(&self, record: &TaskRecord) -> PipelineResult<Analysis> {
        let mut analysis = Analysis {
            dialogue_turns: record.full_prompt.as_deref().map(dialogue_turns),
            ..Analysis::empty()
        };

        let Some(artifact) = record.completion_text().and_then(extract_artifact) else {
            debug!(
                trace_id = %record.trace_id_display(),
                "no yaml artifact in completion"
            );
            return Ok(analysis);
        };

        analysis.valid_template = Some(self.validate(record, artifact).await);

        let full_prompt = record.full_prompt.as_deref().unwrap_or_default();
        let verdict = self
            .judge
            .evaluate(full_prompt, artifact)
            .await
            .map_err(|e| PipelineError::Judge {
                trace_id: record.trace_id_display(),
                message: format!("{e:#}"),
            })?;

        analysis.llm_security_issue_found = Some(verdict.security_issue_found);
        analysis.llm_answered_question = Some(verdict.answered_question);
        Ok(analysis)
    }

    /// Any validator error, including transport failures, counts as invalid.
    async fn validate(&self, record: &TaskRecord, artifact: &str) -> bool {
        match self.validator.validate(artifact).await {
            Ok(()) => true,
            Err(e) => {
                info!(
                    trace_id = %record.trace_id_display(),
                    validator = self.validator.name(),
                    error = %format!("{e:#}"),
                    "template rejected"
                );
                false
            }
        }
    }
}
