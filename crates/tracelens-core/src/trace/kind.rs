//! Task-kind classification.
//!
//! Both pipeline stages classify a task by substring markers in its name, but
//! with different precedence. Each stage classifies exactly once, through its
//! own function, so the precedence is written down in one place.

pub const FEEDBACK_MARKER: &str = "feedback";
pub const TOXICITY_MARKER: &str = "toxicity";
pub const GENERATION_MARKER: &str = "llm_call";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Feedback,
    Toxicity,
    Generation,
    Other,
}

impl TaskKind {
    /// Extraction precedence: feedback, toxicity, llm_call. First match wins.
    pub fn for_extraction(task: Option<&str>) -> Self {
        let Some(task) = task else {
            return Self::Other;
        };
        if task.contains(FEEDBACK_MARKER) {
            Self::Feedback
        } else if task.contains(TOXICITY_MARKER) {
            Self::Toxicity
        } else if task.contains(GENERATION_MARKER) {
            Self::Generation
        } else {
            Self::Other
        }
    }

    /// Analysis precedence: toxicity, feedback, llm_call.
    ///
    /// The analyzer checks `llm_call` first and then runs an independent
    /// toxicity/feedback chain whose result replaces it, so a name matching
    /// both `llm_call` and `toxicity` ends up analyzed as toxicity, and a name
    /// matching both `toxicity` and `feedback` only ever reaches toxicity.
    pub fn for_analysis(task: Option<&str>) -> Self {
        let Some(task) = task else {
            return Self::Other;
        };
        if task.contains(TOXICITY_MARKER) {
            Self::Toxicity
        } else if task.contains(FEEDBACK_MARKER) {
            Self::Feedback
        } else if task.contains(GENERATION_MARKER) {
            Self::Generation
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Toxicity => "toxicity",
            Self::Generation => "generation",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
