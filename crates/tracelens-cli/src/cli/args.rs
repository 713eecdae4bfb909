use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "tracelens",
    version,
    about = "Extract task records from assistant traces and self-evaluate generated templates"
)]
pub struct Cli {
    /// Pipeline config (YAML). Environment variables override it.
    #[arg(long, global = true, env = "TRACELENS_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Flatten the task spans of one trace export into records
    Extract(ExtractArgs),
    /// Analyze a record batch and deliver it to the stream
    Analyze(AnalyzeArgs),
    /// Extract then analyze in one process
    Run(RunArgs),
}

/// Where the trace export comes from.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Object-created event (JSON). Alternative to --bucket/--key.
    #[arg(long, conflicts_with_all = ["bucket", "key"])]
    pub event: Option<PathBuf>,

    #[arg(long, requires = "key")]
    pub bucket: Option<String>,

    /// Object key, unencoded.
    #[arg(long, requires = "bucket")]
    pub key: Option<String>,

    /// Read objects from <DIR>/<bucket>/<key> instead of S3.
    #[arg(long)]
    pub local_root: Option<PathBuf>,

    /// Abort on the first span that cannot be fully decoded.
    #[arg(long)]
    pub strict: bool,

    /// Instrumentation scope holding the task spans.
    #[arg(long)]
    pub scope_name: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ValidatorKind {
    /// CloudFormation ValidateTemplate
    Cloudformation,
    /// Accept every template (offline)
    AcceptAll,
}

/// Collaborators used by the analyze stage.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeBackendArgs {
    /// Delivery stream name (default: FIREHOSE_STREAM_NAME / config).
    #[arg(long)]
    pub stream: Option<String>,

    /// Append records to <DIR>/<stream>.jsonl instead of Firehose.
    #[arg(long)]
    pub sink_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ValidatorKind::Cloudformation)]
    pub validator: ValidatorKind,

    /// Judge model id (default: TRACELENS_JUDGE_MODEL / config).
    #[arg(long)]
    pub judge_model: Option<String>,

    /// Answer every judge call with this text instead of calling Bedrock.
    #[arg(long)]
    pub judge_response: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Write the response here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Analyze event, extract response, or bare record array (JSON). `-` for stdin.
    #[arg(long, short = 'i', default_value = "-")]
    pub input: PathBuf,

    #[command(flatten)]
    pub backend: AnalyzeBackendArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub backend: AnalyzeBackendArgs,
}
