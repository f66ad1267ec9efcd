//! Memory repair: narrow a dialogue to what failed probes are about, then
//! rebuild the store from it and inject the ground truth verbatim.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ama_state::{BuildReport, Correction, MemoryStore};

use crate::metrics::METRICS;
use crate::obs;

/// Words that carry no retrieval signal.
pub const STOP_WORDS: &[&str] = &[
    "how", "what", "when", "where", "why", "who", "which", "is", "are", "was", "were", "in", "on",
    "at", "for", "with", "to", "and", "or", "but", "the", "a", "an",
];

/// Shortest token kept as a keyword, in characters.
pub const MIN_KEYWORD_CHARS: usize = 3;

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\b\w+\b").expect("valid regex"))
}

/// Lowercased keywords of the failed probes' questions and answers.
pub fn extract_keywords(failed: &[Correction]) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();
    for correction in failed {
        for text in [&correction.question, &correction.true_answer] {
            for word in word_pattern().find_iter(text) {
                let word = word.as_str().to_lowercase();
                if word.chars().count() >= MIN_KEYWORD_CHARS && !STOP_WORDS.contains(&word.as_str())
                {
                    keywords.insert(word);
                }
            }
        }
    }
    keywords
}

/// Keep the dialogue lines mentioning any keyword of the failed probes.
///
/// Returns the dialogue unchanged when there is nothing to filter by. When
/// no line matches, the first third of the lines (at least one) is kept so
/// the result is never empty for a non-empty dialogue.
pub fn filter_dialogue(dialogue: &str, failed: &[Correction]) -> String {
    if failed.is_empty() {
        return dialogue.to_string();
    }
    let keywords = extract_keywords(failed);
    if keywords.is_empty() {
        return dialogue.to_string();
    }

    let lines: Vec<&str> = dialogue.split('\n').collect();
    let kept: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| {
            let line = line.to_lowercase();
            keywords.iter().any(|k| line.contains(k.as_str()))
        })
        .collect();

    if kept.is_empty() {
        let n = (lines.len() / 3).max(1);
        debug!(keywords = keywords.len(), kept = n, "no line matched, keeping leading lines");
        return lines[..n].join("\n");
    }
    debug!(keywords = keywords.len(), kept = kept.len(), of = lines.len(), "filtered dialogue");
    kept.join("\n")
}

/// Append the literal correction block to a dialogue.
pub fn with_correction_block(dialogue: &str, failed: &[Correction]) -> String {
    if failed.is_empty() {
        return dialogue.to_string();
    }
    let block = failed
        .iter()
        .map(|c| format!("Q: {} A: {}", c.question, c.true_answer))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{dialogue}\n\nCorrections:\n{block}")
}

/// Result of one reconstruction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionOutcome {
    /// The rebuild-from-dialogue step reported success
    pub rebuilt: bool,
    /// Correction entries injected after a successful rebuild
    pub corrections_added: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReconstructionOutcome {
    fn failed(build: Option<BuildReport>, error: String) -> Self {
        Self {
            rebuilt: false,
            corrections_added: 0,
            build,
            error: Some(error),
        }
    }
}

/// A memory repair strategy.
#[async_trait]
pub trait MemoryAdapter: Send + Sync {
    /// Narrow `dialogue` to the parts relevant to the failed probes. Pure.
    fn filter(&self, dialogue: &str, failed: &[Correction]) -> String;

    /// Rebuild the user's memory from `filtered_dialogue` and the failed
    /// probes' ground truth. Never fails; problems are reported in the
    /// outcome and already-stored entries are left as they are.
    async fn reconstruct(
        &self,
        store: &dyn MemoryStore,
        user_id: &str,
        filtered_dialogue: &str,
        failed: &[Correction],
    ) -> ReconstructionOutcome;
}

/// Keyword-filtering adapter with correction injection.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordAdapter;

impl KeywordAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MemoryAdapter for KeywordAdapter {
    fn filter(&self, dialogue: &str, failed: &[Correction]) -> String {
        filter_dialogue(dialogue, failed)
    }

    async fn reconstruct(
        &self,
        store: &dyn MemoryStore,
        user_id: &str,
        filtered_dialogue: &str,
        failed: &[Correction],
    ) -> ReconstructionOutcome {
        let augmented = with_correction_block(filtered_dialogue, failed);

        let outcome = match store.rebuild_from_dialogue(user_id, &augmented).await {
            Ok(report) if report.is_built() => {
                let (corrections_added, error) = match store.append_corrections(user_id, failed).await {
                    Ok(n) => (n, None),
                    Err(e) => {
                        warn!(user_id, error = %e, "correction injection failed");
                        (0, Some(e.to_string()))
                    }
                };
                info!(
                    user_id,
                    memories = report.memories_count,
                    corrections_added,
                    "memory reconstructed"
                );
                ReconstructionOutcome {
                    rebuilt: true,
                    corrections_added,
                    build: Some(report),
                    error,
                }
            }
            Ok(report) => {
                let error = report
                    .error
                    .clone()
                    .unwrap_or_else(|| "rebuild reported an error".to_string());
                warn!(user_id, %error, "rebuild did not complete");
                ReconstructionOutcome::failed(Some(report), error)
            }
            Err(e) => {
                warn!(user_id, error = %e, "rebuild failed");
                ReconstructionOutcome::failed(None, e.to_string())
            }
        };

        METRICS.record_reconstruction(outcome.rebuilt);
        METRICS.add_corrections(outcome.corrections_added as u64);
        obs::emit_reconstruction_finished(user_id, outcome.rebuilt, outcome.corrections_added);
        outcome
    }
}
