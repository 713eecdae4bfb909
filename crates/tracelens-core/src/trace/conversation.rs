//! Conversation context shared between the chat collaborator and the
//! extractor.
//!
//! The chat side records a [`FeedbackOutput`] as the output of its feedback
//! task; the extractor decodes the same shape and renders its messages with
//! [`format_history`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

// Anything that is not the assistant is rendered as the human side.
impl From<String> for Role {
    fn from(s: String) -> Self {
        if s == "assistant" {
            Self::Assistant
        } else {
            Self::User
        }
    }
}

impl From<Role> for String {
    fn from(r: Role) -> Self {
        match r {
            Role::User => "user".to_string(),
            Role::Assistant => "assistant".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(deserialize_with = "content_text")]
    pub content: String,
}

// Non-string content is kept as its JSON text.
fn content_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Render messages as a `Human:` / `Assistant:` transcript, in order.
pub fn format_history(messages: &[ChatMessage]) -> String {
    let mut history = String::new();
    for message in messages {
        let prefix = match message.role {
            Role::Assistant => "Assistant",
            Role::User => "Human",
        };
        history.push_str(prefix);
        history.push_str(":\n");
        history.push_str(&message.content);
        history.push_str("\n\n");
    }
    history
}

/// User feedback on the latest assistant answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feedback {
    #[default]
    Neutral,
    Helpful,
    NotHelpful,
}

impl Feedback {
    pub fn score(&self) -> i32 {
        match self {
            Self::Neutral => 0,
            Self::Helpful => 1,
            Self::NotHelpful => -1,
        }
    }

    /// Label passed as the feedback task's first argument.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::Neutral => None,
            Self::Helpful => Some("helpful"),
            Self::NotHelpful => Some("not helpful"),
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "helpful" => Self::Helpful,
            "not helpful" => Self::NotHelpful,
            _ => Self::Neutral,
        }
    }
}

/// Explicit per-session state of the chat collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub feedback: Feedback,
}

impl ConversationContext {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            messages: Vec::new(),
            feedback: Feedback::Neutral,
        }
    }

    /// A new user turn resets feedback to neutral.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.feedback = Feedback::Neutral;
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn record_feedback(&mut self, label: &str) -> FeedbackOutput {
        let feedback = Feedback::from_label(label);
        if feedback != Feedback::Neutral {
            self.feedback = feedback;
        }
        FeedbackOutput {
            model_id: self.model_id.clone(),
            messages: self.messages.clone(),
            user_feedback: self.feedback.score(),
        }
    }
}

/// Output payload of the feedback task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackOutput {
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub user_feedback: i32,
}
