use std::path::Path;

use serde_json::json;
use tracelens_core::handler::{analyze_and_deliver, extract_from_event};
use tracing::info;

use super::backends;
use crate::cli::args::RunArgs;
use crate::exit_codes::SUCCESS;

/// Extract and analyze one export in a single process. Prints a summary.
pub async fn run(args: RunArgs, config: Option<&Path>) -> anyhow::Result<i32> {
    let cfg = backends::resolve_config(config, Some(&args.source), Some(&args.backend))?;
    let event = backends::source_event(&args.source)?;
    let store = backends::object_store(&cfg, &args.source)?;
    let (sink, stream) = backends::sink(&cfg, &args.backend)?;
    let analyzer = backends::analyzer(&cfg, &args.backend)?;

    let report = extract_from_event(&event, store.as_ref(), &cfg.extract_options()).await?;
    let issues = report.issue_count();
    let analyzed = analyze_and_deliver(report.records, &analyzer, sink.as_ref(), &stream).await?;

    let judged = analyzed
        .iter()
        .filter(|r| r.llm_security_issue_found.is_some())
        .count();
    info!(records = analyzed.len(), issues, judged, "run complete");

    backends::write_json(
        &json!({
            "records": analyzed.len(),
            "issues": issues,
            "judged": judged,
            "stream": stream,
        }),
        None,
    )?;
    Ok(SUCCESS)
}
