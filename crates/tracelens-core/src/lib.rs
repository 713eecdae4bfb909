//! Trace extraction and self-evaluation pipeline.
//!
//! Two stages, each independently invokable:
//!
//! - **extract**: walk one OTLP/JSON resource-span tree exported by a
//!   traceloop-instrumented assistant and flatten its task spans into
//!   [`trace::record::TaskRecord`]s.
//! - **analyze**: dispatch each record by task kind; generation records get
//!   their template artifact validated and judged by a second model call.
//!   Analyzed records are written to a [`sink::RecordSink`] as one batch.
//!
//! The [`handler`] module exposes both stages as event handlers that take the
//! same event shapes the serverless deployment receives.

pub mod analyze;
pub mod config;
pub mod errors;
pub mod handler;
pub mod judge;
pub mod model;
pub mod providers;
pub mod sink;
pub mod storage;
pub mod trace;

pub use analyze::Analyzer;
pub use config::PipelineConfig;
pub use errors::{ExtractIssue, PipelineError};
pub use trace::extract::{extract_task_records, ExtractOptions, ExtractionReport};
pub use trace::record::{AnalyzedRecord, JudgeAnswer, TaskRecord};
