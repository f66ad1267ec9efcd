//! Data exchanged with oracles.

use serde::{Deserialize, Serialize};

/// A probe question with its ground-truth answer, as produced by a
/// [`crate::QuestionOracle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQa {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<String>,
}

impl GeneratedQa {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            category: None,
            focus_area: None,
        }
    }
}

/// One memory distilled from a dialogue by a [`crate::DialogueSummarizer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizedMemory {
    pub content: String,
    /// Timestamp extracted or inferred from the dialogue, if any.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Narrative summary of a dialogue plus the memories extracted from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueSummary {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub memories: Vec<SummarizedMemory>,
}

/// A failed probe handed to a [`crate::StrategyAdvisor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedProbe {
    pub question: String,
    pub true_answer: String,
    pub retrieved_answer: String,
    pub category: String,
}

/// Priority of a proposed memory update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePriority {
    High,
    #[default]
    Medium,
    Low,
}

/// A single proposed memory update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUpdate {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub proposed_content: String,
    #[serde(default)]
    pub priority: UpdatePriority,
}

/// Advisory repair plan. Purely informational; nothing applies it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateStrategy {
    #[serde(default)]
    pub memory_updates: Vec<MemoryUpdate>,
    #[serde(default)]
    pub extraction_improvements: Vec<String>,
    #[serde(default)]
    pub improve_instructions: String,
}
