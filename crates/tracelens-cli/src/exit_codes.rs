//! Process exit codes. Part of the CLI contract.

use tracelens_core::PipelineError;

pub const SUCCESS: i32 = 0;
pub const PIPELINE_FAILED: i32 = 1; // An invocation ran and failed
pub const CONFIG_ERROR: i32 = 2; // Bad config, credentials or arguments

pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Config { .. }) => CONFIG_ERROR,
        Some(_) => PIPELINE_FAILED,
        None => CONFIG_ERROR,
    }
}

/// Log field for a failed command: the pipeline error kind, or `setup`.
pub fn failure_kind(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<PipelineError>()
        .map_or("setup", PipelineError::kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn pipeline_failures_and_setup_failures_differ() {
        let judge: anyhow::Error = PipelineError::Judge {
            trace_id: "t".into(),
            message: "timeout".into(),
        }
        .into();
        assert_eq!(for_error(&judge), PIPELINE_FAILED);

        let cfg = Err::<(), _>(PipelineError::config("bad"))
            .context("loading config")
            .unwrap_err();
        assert_eq!(for_error(&cfg), CONFIG_ERROR);

        assert_eq!(for_error(&anyhow::anyhow!("no credentials")), CONFIG_ERROR);

        assert_eq!(failure_kind(&judge), "judge");
        assert_eq!(failure_kind(&cfg), "config");
        assert_eq!(failure_kind(&anyhow::anyhow!("no credentials")), "setup");
    }
}
