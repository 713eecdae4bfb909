//! Builds the pipeline collaborators from config and command-line overrides.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracelens_core::config::load_config;
use tracelens_core::handler::S3Event;
use tracelens_core::judge::JudgeService;
use tracelens_core::providers::llm::bedrock::BedrockClient;
use tracelens_core::providers::llm::fake::FakeClient;
use tracelens_core::providers::llm::tracing::TracingLlmClient;
use tracelens_core::providers::llm::LlmClient;
use tracelens_core::providers::validator::{
    AcceptAllValidator, CloudFormationValidator, TemplateValidator,
};
use tracelens_core::sink::{FirehoseSink, JsonlFileSink, RecordSink};
use tracelens_core::storage::{LocalObjectStore, ObjectStore, S3ObjectStore};
use tracelens_core::{Analyzer, PipelineConfig};

use crate::cli::args::{AnalyzeBackendArgs, SourceArgs, ValidatorKind};

/// Load the config file and environment, then apply flag overrides.
pub fn resolve_config(
    path: Option<&Path>,
    source: Option<&SourceArgs>,
    backend: Option<&AnalyzeBackendArgs>,
) -> anyhow::Result<PipelineConfig> {
    let mut cfg = load_config(path)?;
    if let Some(source) = source {
        if let Some(scope) = &source.scope_name {
            cfg.scope_name = scope.clone();
        }
        if source.strict {
            cfg.strict_extract = true;
        }
    }
    if let Some(backend) = backend {
        if let Some(stream) = &backend.stream {
            cfg.stream_name = Some(stream.clone());
        }
        if let Some(model) = &backend.judge_model {
            cfg.judge.model_id = model.clone();
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

/// The object-created event to process, from a file or from bucket and key.
pub fn source_event(source: &SourceArgs) -> anyhow::Result<S3Event> {
    if let Some(path) = &source.event {
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read event {}", path.display()))?;
        return serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse event {}", path.display()));
    }
    match (&source.bucket, &source.key) {
        (Some(bucket), Some(key)) => Ok(S3Event::for_object(bucket.clone(), key)),
        _ => anyhow::bail!("either --event or --bucket and --key is required"),
    }
}

pub fn object_store(cfg: &PipelineConfig, source: &SourceArgs) -> anyhow::Result<Box<dyn ObjectStore>> {
    match &source.local_root {
        Some(root) => Ok(Box::new(LocalObjectStore::new(root.clone()))),
        None => Ok(Box::new(
            S3ObjectStore::from_env(&cfg.aws).context("failed to set up S3 client")?,
        )),
    }
}

pub fn analyzer(cfg: &PipelineConfig, backend: &AnalyzeBackendArgs) -> anyhow::Result<Analyzer> {
    let validator: Arc<dyn TemplateValidator> = match backend.validator {
        ValidatorKind::AcceptAll => Arc::new(AcceptAllValidator),
        ValidatorKind::Cloudformation => Arc::new(
            CloudFormationValidator::from_env(&cfg.aws)
                .context("failed to set up CloudFormation client")?,
        ),
    };

    let client: Arc<dyn LlmClient> = match &backend.judge_response {
        Some(text) => Arc::new(FakeClient::new().with_response(text.clone())),
        None => Arc::new(
            BedrockClient::from_env(&cfg.aws).context("failed to set up Bedrock client")?,
        ),
    };
    let client: Arc<dyn LlmClient> = Arc::new(TracingLlmClient::new(client));

    tracing::debug!(
        validator = validator.name(),
        model = %cfg.judge.model_id,
        "analyzer ready"
    );
    Ok(Analyzer::new(validator, JudgeService::new(cfg.judge.clone(), client)))
}

/// The sink and the stream it writes to.
pub fn sink(
    cfg: &PipelineConfig,
    backend: &AnalyzeBackendArgs,
) -> anyhow::Result<(Box<dyn RecordSink>, String)> {
    let stream = cfg.require_stream_name()?.to_string();
    let sink: Box<dyn RecordSink> = match &backend.sink_dir {
        Some(dir) => Box::new(JsonlFileSink::new(dir.clone())),
        None => Box::new(
            FirehoseSink::from_env(&cfg.aws).context("failed to set up Firehose client")?,
        ),
    };
    Ok((sink, stream))
}

/// Print `value` as JSON to `output`, or stdout when unset.
pub fn write_json(value: &impl serde::Serialize, output: Option<&Path>) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, text + "\n")
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}
