use std::path::Path;

use tracelens_core::handler::{extract_from_event, HandlerResponse};
use tracelens_core::PipelineError;

use super::backends;
use crate::cli::args::ExtractArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(args: ExtractArgs, config: Option<&Path>) -> anyhow::Result<i32> {
    let cfg = backends::resolve_config(config, Some(&args.source), None)?;
    let event = backends::source_event(&args.source)?;
    let store = backends::object_store(&cfg, &args.source)?;

    let report = extract_from_event(&event, store.as_ref(), &cfg.extract_options()).await?;

    let body = serde_json::to_string(&report.records)
        .map_err(|e| PipelineError::decode("task records", e))?;
    backends::write_json(&HandlerResponse::ok(body), args.output.as_deref())?;
    Ok(SUCCESS)
}
