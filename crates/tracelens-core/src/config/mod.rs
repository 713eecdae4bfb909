//! Pipeline configuration: optional YAML file, then environment overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, PipelineResult};
use crate::judge::JudgeConfig;
use crate::providers::aws::{AwsConfig, AwsService};
use crate::trace::extract::ExtractOptions;
use crate::trace::TASK_SCOPE_NAME;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Delivery stream for analyzed records.
    pub stream_name: Option<String>,
    /// Instrumentation scope whose spans are task spans.
    pub scope_name: String,
    /// Abort extraction on the first span issue.
    pub strict_extract: bool,
    pub judge: JudgeConfig,
    pub aws: AwsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stream_name: None,
            scope_name: TASK_SCOPE_NAME.to_string(),
            strict_extract: false,
            judge: JudgeConfig::default(),
            aws: AwsConfig::default(),
        }
    }
}

/// Load from an optional YAML file, apply environment overrides, validate.
pub fn load_config(path: Option<&Path>) -> PipelineResult<PipelineConfig> {
    let mut cfg = match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    cfg.apply_env()?;
    cfg.validate()?;
    Ok(cfg)
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            PipelineError::config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Override fields from the environment.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `FIREHOSE_STREAM_NAME` | `stream_name` |
    /// | `TRACELENS_SCOPE_NAME` | `scope_name` |
    /// | `TRACELENS_STRICT_EXTRACT` | `strict_extract` (`1`/`true`) |
    /// | `TRACELENS_JUDGE_MODEL` | `judge.model_id` |
    /// | `TRACELENS_TIMEOUT_SECS` | `aws.timeout_secs` |
    /// | `TRACELENS_MAX_RETRIES` | `aws.max_retries` |
    /// | `AWS_REGION`, then `AWS_DEFAULT_REGION` | `aws.region` |
    /// | `TRACELENS_S3_ENDPOINT`, `TRACELENS_CLOUDFORMATION_ENDPOINT`, `TRACELENS_BEDROCK_ENDPOINT`, `TRACELENS_FIREHOSE_ENDPOINT` | `aws.endpoints.*` |
    pub fn apply_env(&mut self) -> PipelineResult<()> {
        if let Some(v) = env("FIREHOSE_STREAM_NAME") {
            self.stream_name = Some(v);
        }
        if let Some(v) = env("TRACELENS_SCOPE_NAME") {
            self.scope_name = v;
        }
        if let Some(v) = env("TRACELENS_STRICT_EXTRACT") {
            self.strict_extract = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = env("TRACELENS_JUDGE_MODEL") {
            self.judge.model_id = v;
        }
        if let Some(v) = env("TRACELENS_TIMEOUT_SECS") {
            self.aws.timeout_secs = parse_env("TRACELENS_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = env("TRACELENS_MAX_RETRIES") {
            self.aws.max_retries = parse_env("TRACELENS_MAX_RETRIES", &v)?;
        }
        if let Some(v) = env("AWS_REGION").or_else(|| env("AWS_DEFAULT_REGION")) {
            self.aws.region = v;
        }
        for (var, service) in [
            ("TRACELENS_S3_ENDPOINT", AwsService::S3),
            ("TRACELENS_CLOUDFORMATION_ENDPOINT", AwsService::CloudFormation),
            ("TRACELENS_BEDROCK_ENDPOINT", AwsService::Bedrock),
            ("TRACELENS_FIREHOSE_ENDPOINT", AwsService::Firehose),
        ] {
            if let Some(v) = env(var) {
                self.aws.endpoints.set(service, v);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if !(0.0..=1.0).contains(&self.judge.temperature) {
            return Err(PipelineError::config(format!(
                "judge.temperature must be within 0.0..=1.0, got {}",
                self.judge.temperature
            )));
        }
        if self.judge.max_tokens == 0 {
            return Err(PipelineError::config("judge.max_tokens must be positive"));
        }
        if self.judge.model_id.trim().is_empty() {
            return Err(PipelineError::config("judge.model_id must not be empty"));
        }
        if self.scope_name.trim().is_empty() {
            return Err(PipelineError::config("scope_name must not be empty"));
        }
        if self.aws.timeout_secs == 0 {
            return Err(PipelineError::config("aws.timeout_secs must be positive"));
        }
        if self.aws.region.trim().is_empty() {
            return Err(PipelineError::config("aws.region must not be empty"));
        }
        if matches!(&self.stream_name, Some(s) if s.trim().is_empty()) {
            return Err(PipelineError::config("stream_name must not be empty when set"));
        }
        Ok(())
    }

    /// The delivery stream, required before any sink write.
    pub fn require_stream_name(&self) -> PipelineResult<&str> {
        self.stream_name.as_deref().ok_or_else(|| {
            PipelineError::config("no delivery stream configured (set FIREHOSE_STREAM_NAME)")
        })
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            scope_name: self.scope_name.clone(),
            strict: self.strict_extract,
        }
    }
}

fn env(name: &str) -> Option<String> {
    crate::providers::aws::non_empty_env(name)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> PipelineResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PipelineError::config(format!("{name}={value:?} is invalid: {e}")))
}
