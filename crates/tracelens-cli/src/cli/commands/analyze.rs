use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracelens_core::handler::{
    analyze_and_deliver, AnalyzeEvent, HandlerResponse, ANALYZE_COMPLETE,
};
use tracelens_core::PipelineError;

use super::backends;
use crate::cli::args::AnalyzeArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(args: AnalyzeArgs, config: Option<&Path>) -> anyhow::Result<i32> {
    let cfg = backends::resolve_config(config, None, Some(&args.backend))?;
    let (sink, stream) = backends::sink(&cfg, &args.backend)?;
    let event = read_event(&args.input)?;
    let analyzer = backends::analyzer(&cfg, &args.backend)?;

    let records = event.records()?;
    analyze_and_deliver(records, &analyzer, sink.as_ref(), &stream).await?;
    backends::write_json(&HandlerResponse::ok(ANALYZE_COMPLETE), None)?;
    Ok(SUCCESS)
}

fn read_event(input: &Path) -> anyhow::Result<AnalyzeEvent> {
    let raw = if input == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?
    };
    Ok(parse_event(&raw)?)
}

/// An analyze event, an extract response, or a bare record array.
pub(crate) fn parse_event(raw: &[u8]) -> Result<AnalyzeEvent, PipelineError> {
    let value: Value =
        serde_json::from_slice(raw).map_err(|e| PipelineError::decode("analyze input", e))?;
    if value.is_array() {
        return Ok(AnalyzeEvent::Direct { body: value });
    }
    serde_json::from_value(value).map_err(|_| {
        PipelineError::malformed_event(
            "expected a record array, an object with `body`, or one with `responsePayload.body`",
        )
    })
}
