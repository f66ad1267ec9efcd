//! Record types persisted by memory stores.
//!
//! The on-disk artifact is a JSON array of [`MemoryEntry`] with exactly the
//! fields `memory_id, user_id, content, timestamp, created_at, metadata`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Where a memory entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Produced by summarising a dialogue
    DialogueSummarization,
    /// Injected verbatim from a failed probe's ground truth
    Correction,
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DialogueSummarization => write!(f, "dialogue_summarization"),
            Self::Correction => write!(f, "correction"),
        }
    }
}

/// Entry metadata: the source tag plus free-form fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub source: MemorySource,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntryMetadata {
    pub fn new(source: MemorySource) -> Self {
        Self {
            source,
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// A single memory owned by a store.
///
/// Entries are append-only: never edited in place, and `memory_id` is a
/// fresh UUID that is never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub memory_id: String,
    pub user_id: String,
    pub content: String,
    /// Event time, extracted from the dialogue when available
    #[serde(default, deserialize_with = "string_or_null")]
    pub timestamp: String,
    /// ISO 8601 text; RFC 3339 for entries created here, naive local time in
    /// files written by other tools
    #[serde(default, deserialize_with = "string_or_null")]
    pub created_at: String,
    pub metadata: EntryMetadata,
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl MemoryEntry {
    pub fn new(user_id: &str, content: impl Into<String>, metadata: EntryMetadata) -> Self {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Self {
            memory_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.into(),
            timestamp: now.clone(),
            created_at: now,
            metadata,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Build a correction entry from a failed probe.
    pub fn correction(user_id: &str, correction: &Correction) -> Self {
        let content = format!(
            "Question: {}. Correct Answer: {}.",
            correction.question, correction.true_answer
        );
        let metadata = EntryMetadata::new(MemorySource::Correction)
            .with("question", correction.question.clone())
            .with("true_answer", correction.true_answer.clone())
            .with("type", "qa_correction");
        Self::new(user_id, content, metadata)
    }

    pub fn source(&self) -> MemorySource {
        self.metadata.source
    }
}

/// A question with its ground-truth answer, to be injected verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub question: String,
    pub true_answer: String,
}

impl Correction {
    pub fn new(question: impl Into<String>, true_answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            true_answer: true_answer.into(),
        }
    }

    /// Both fields non-blank after trimming.
    pub fn is_usable(&self) -> bool {
        !self.question.trim().is_empty() && !self.true_answer.trim().is_empty()
    }
}

/// Outcome status of a rebuild-from-dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Built,
    Error,
}

/// Report returned by `MemoryStore::rebuild_from_dialogue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Entries added by this build
    pub memories_count: usize,
    /// Entries held for the user after this build
    pub total_memories: usize,
}

impl BuildReport {
    pub fn built(summary: String, memories_count: usize, total_memories: usize) -> Self {
        Self {
            status: BuildStatus::Built,
            summary: Some(summary),
            error: None,
            memories_count,
            total_memories,
        }
    }

    pub fn error(error: impl Into<String>, total_memories: usize) -> Self {
        Self {
            status: BuildStatus::Error,
            summary: None,
            error: Some(error.into()),
            memories_count: 0,
            total_memories,
        }
    }

    pub fn is_built(&self) -> bool {
        self.status == BuildStatus::Built
    }
}

/// Reference to a persisted memory artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    /// SHA-256 of the artifact bytes, also written to `<path>.digest`
    pub digest: String,
    pub entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_exact_field_names() {
        let entry = MemoryEntry::new(
            "user_001",
            "Flight JAL 004",
            EntryMetadata::new(MemorySource::DialogueSummarization).with("summary", "trip"),
        );
        let json = serde_json::to_value(&entry).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["content", "created_at", "memory_id", "metadata", "timestamp", "user_id"]
        );
        assert_eq!(json["metadata"]["source"], "dialogue_summarization");
        assert_eq!(json["metadata"]["summary"], "trip");
    }

    #[test]
    fn test_correction_entry_content_and_metadata() {
        let entry = MemoryEntry::correction(
            "u",
            &Correction::new("Which hotel in Osaka?", "Hotel Dotonbori"),
        );
        assert_eq!(
            entry.content,
            "Question: Which hotel in Osaka?. Correct Answer: Hotel Dotonbori."
        );
        assert_eq!(entry.source(), MemorySource::Correction);
        assert_eq!(entry.metadata.extra["type"], "qa_correction");
    }

    #[test]
    fn test_naive_timestamps_deserialize() {
        let raw = r#"{
            "memory_id": "3f1c",
            "user_id": "user_001",
            "content": "Sarah is allergic to shellfish",
            "timestamp": "2024-01-15T14:30:00",
            "created_at": "2024-01-15T14:30:00.123456",
            "metadata": {"source": "dialogue_summarization", "summary": "trip"}
        }"#;
        let entry: MemoryEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.created_at, "2024-01-15T14:30:00.123456");
        assert_eq!(entry.timestamp, "2024-01-15T14:30:00");

        let nulls = r#"{"memory_id": "a", "user_id": "u", "content": "c",
            "timestamp": null, "metadata": {"source": "correction"}}"#;
        let entry: MemoryEntry = serde_json::from_str(nulls).unwrap();
        assert!(entry.timestamp.is_empty());
        assert!(entry.created_at.is_empty());
    }

    #[test]
    fn test_new_entry_created_at_is_rfc3339() {
        let entry = MemoryEntry::new("u", "x", EntryMetadata::new(MemorySource::Correction));
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.created_at).is_ok());
    }

    #[test]
    fn test_memory_ids_are_unique() {
        let meta = EntryMetadata::new(MemorySource::Correction);
        let a = MemoryEntry::new("u", "x", meta.clone());
        let b = MemoryEntry::new("u", "x", meta);
        assert_ne!(a.memory_id, b.memory_id);
    }

    #[test]
    fn test_build_report_error_shape() {
        let report = BuildReport::error("summarizer down", 3);
        assert!(!report.is_built());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("summary").is_none());
    }

    #[test]
    fn test_correction_usable() {
        assert!(Correction::new("q", "a").is_usable());
        assert!(!Correction::new("q", "  ").is_usable());
    }
}
