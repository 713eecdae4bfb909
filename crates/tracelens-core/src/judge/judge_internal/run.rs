use crate::judge::{JudgeService, JudgeVerdict};
use anyhow::Context;
use tracing::{debug, warn};

pub(crate) async fn evaluate_impl(
    svc: &JudgeService,
    full_prompt: &str,
    artifact: &str,
) -> anyhow::Result<JudgeVerdict> {
    let conversation = super::prompt::normalize_roles(full_prompt);
    let prompt = super::prompt::build_judge_prompt(&conversation, artifact);
    let params = svc.config.params();

    let resp = svc
        .client
        .complete(&prompt, &params)
        .await
        .with_context(|| {
            format!(
                "judge call to {} ({}) failed",
                params.model_id,
                svc.client.provider_name()
            )
        })?;

    match super::parse::parse_judge_output(&resp.text) {
        Ok(verdict) => {
            debug!(
                security_issue_found = verdict.security_issue_found.as_str(),
                answered_question = verdict.answered_question.as_str(),
                "judge verdict parsed"
            );
            Ok(verdict)
        }
        Err(failure) => {
            warn!(
                error = %failure,
                completion_len = resp.text.len(),
                "judge output not in numbered-list format"
            );
            Ok(JudgeVerdict::unparsed())
        }
    }
}
