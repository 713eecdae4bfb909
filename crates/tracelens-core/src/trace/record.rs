//! Flat records exchanged between the extractor, the analyzer and the sink.
//!
//! Both record types are plain structs without `skip_serializing_if` on the
//! declared keys, so every serialized record carries the full key set with
//! absent values as `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One task span, flattened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRecord {
    pub start_time: Value,
    pub end_time: Value,
    pub trace_id: Value,
    pub workflow: Option<String>,
    pub task: Option<String>,

    // toxicity
    pub user_input: Option<String>,
    pub toxicity_detected: Option<bool>,

    // generation (`model` is shared with feedback)
    pub full_prompt: Option<String>,
    pub model: Option<String>,
    pub completion: Option<Value>,

    // feedback
    pub feedback: Option<String>,
    pub conversation: Option<String>,
}

impl TaskRecord {
    pub const IDENTITY_KEYS: [&'static str; 5] =
        ["start_time", "end_time", "trace_id", "workflow", "task"];

    pub const NULLABLE_KEYS: [&'static str; 7] = [
        "user_input",
        "toxicity_detected",
        "full_prompt",
        "model",
        "completion",
        "feedback",
        "conversation",
    ];

    /// The completion text, when the generation output decoded to a string.
    pub fn completion_text(&self) -> Option<&str> {
        self.completion.as_ref().and_then(Value::as_str)
    }

    /// Trace id rendered for logs.
    pub fn trace_id_display(&self) -> String {
        match &self.trace_id {
            Value::String(s) => s.clone(),
            Value::Null => "-".to_string(),
            other => other.to_string(),
        }
    }
}

/// Answer to one judge question. `Unparsed` serializes as the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JudgeAnswer {
    #[serde(rename = "yes")]
    Yes,
    #[serde(rename = "no")]
    No,
    #[serde(rename = "")]
    Unparsed,
}

impl JudgeAnswer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unparsed => "",
        }
    }
}

/// Result of a per-kind analysis routine, overlaid onto the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub dialogue_turns: Option<i64>,
    pub valid_template: Option<bool>,
    pub llm_security_issue_found: Option<JudgeAnswer>,
    pub llm_answered_question: Option<JudgeAnswer>,
}

impl Analysis {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A task record with the analyzer's results merged in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedRecord {
    #[serde(flatten)]
    pub record: TaskRecord,

    /// Only generation records carry this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_turns: Option<i64>,

    #[serde(default)]
    pub valid_template: Option<bool>,
    #[serde(default)]
    pub llm_security_issue_found: Option<JudgeAnswer>,
    #[serde(default)]
    pub llm_answered_question: Option<JudgeAnswer>,
}

impl AnalyzedRecord {
    pub const NULLABLE_KEYS: [&'static str; 3] = [
        "valid_template",
        "llm_security_issue_found",
        "llm_answered_question",
    ];

    pub fn merge(record: TaskRecord, analysis: Analysis) -> Self {
        Self {
            record,
            dialogue_turns: analysis.dialogue_turns,
            valid_template: analysis.valid_template,
            llm_security_issue_found: analysis.llm_security_issue_found,
            llm_answered_question: analysis.llm_answered_question,
        }
    }

    /// One newline-terminated JSON document, the unit written to the sink.
    pub fn to_json_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}
