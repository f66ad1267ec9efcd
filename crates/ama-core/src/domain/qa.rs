//! Probe questions with their ground-truth answers.

use serde::{Deserialize, Serialize};

use ama_oracle::GeneratedQa;
use ama_state::Correction;

/// A probe question derived from a dialogue. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub true_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<String>,
    /// Position of the source session within a batch
    pub session_index: usize,
}

impl QaPair {
    pub fn new(question: impl Into<String>, true_answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            true_answer: true_answer.into(),
            category: None,
            focus_area: None,
            session_index: 0,
        }
    }

    pub fn from_generated(qa: GeneratedQa, session_index: usize) -> Self {
        Self {
            question: qa.question,
            true_answer: qa.answer,
            category: qa.category,
            focus_area: qa.focus_area,
            session_index,
        }
    }

    pub fn correction(&self) -> Correction {
        Correction::new(self.question.clone(), self.true_answer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_generated_keeps_fields() {
        let mut qa = GeneratedQa::new("Which flight?", "JAL 004");
        qa.category = Some("travel".to_string());
        let pair = QaPair::from_generated(qa, 2);
        assert_eq!(pair.true_answer, "JAL 004");
        assert_eq!(pair.category.as_deref(), Some("travel"));
        assert_eq!(pair.session_index, 2);
        assert_eq!(pair.correction().true_answer, "JAL 004");
    }
}
