//! Error types for the extraction and analysis pipeline.

/// A problem found while decoding one span's attributes.
///
/// Issues are collected per span and never abort the batch (unless the
/// extractor runs in strict mode).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractIssue {
    /// The span carries no attribute with this key.
    #[error("attribute '{key}' not present")]
    MissingAttribute { key: String },

    /// The attribute value is not valid JSON.
    #[error("attribute '{key}' is not valid JSON: {message}")]
    MalformedJson { key: String, message: String },

    /// The decoded payload has no such field / index.
    #[error("attribute '{key}' has no field {field}")]
    MissingField { key: String, field: String },

    /// The field exists but has the wrong type.
    #[error("attribute '{key}' field {field}: expected {expected}")]
    UnexpectedShape {
        key: String,
        field: String,
        expected: String,
    },
}

impl ExtractIssue {
    pub fn missing_attribute(key: impl Into<String>) -> Self {
        Self::MissingAttribute { key: key.into() }
    }

    pub fn missing_field(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            key: key.into(),
            field: field.into(),
        }
    }

    pub fn unexpected_shape(
        key: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::UnexpectedShape {
            key: key.into(),
            field: field.into(),
            expected: expected.into(),
        }
    }
}

/// Invocation-level failures. Any of these fails the whole handler call.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Reading the trace object failed.
    #[error("object store error for s3://{bucket}/{key}: {message}")]
    ObjectStore {
        bucket: String,
        key: String,
        message: String,
    },

    /// The incoming event does not have the expected shape.
    #[error("malformed event: {message}")]
    MalformedEvent { message: String },

    /// The trace export holds no resource spans.
    #[error("trace export contains no resource spans")]
    EmptyExport,

    /// A JSON document (trace export, record batch) failed to decode.
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// Strict extraction hit a span issue.
    #[error("span {span_index} ({span_name}): {issue}")]
    Extract {
        span_index: usize,
        span_name: String,
        issue: ExtractIssue,
    },

    /// The judge model call failed.
    #[error("judge model call failed for trace {trace_id}: {message}")]
    Judge { trace_id: String, message: String },

    /// The sink rejected some or all records of the batch.
    #[error("sink delivery to '{stream}' failed: {failed} of {total} records rejected")]
    SinkDelivery {
        stream: String,
        failed: usize,
        total: usize,
    },

    /// The sink could not be reached or refused the whole request.
    #[error("sink '{stream}' unavailable: {message}")]
    Sink { stream: String, message: String },

    /// Configuration is invalid.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl PipelineError {
    pub fn malformed_event(message: impl Into<String>) -> Self {
        Self::MalformedEvent {
            message: message.into(),
        }
    }

    pub fn decode(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            message: err.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ObjectStore { .. } => "object_store",
            Self::MalformedEvent { .. } => "malformed_event",
            Self::EmptyExport => "empty_export",
            Self::Decode { .. } => "decode",
            Self::Extract { .. } => "extract",
            Self::Judge { .. } => "judge",
            Self::SinkDelivery { .. } => "sink_delivery",
            Self::Sink { .. } => "sink",
            Self::Config { .. } => "config",
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
