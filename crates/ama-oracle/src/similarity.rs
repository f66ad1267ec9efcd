//! Vector and lexical similarity helpers.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::outcome::OracleOutcome;
use crate::traits::SimilarityScorer;

/// Cosine similarity between two embeddings. Mismatched lengths or a zero
/// norm score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Offline scorer: Dice coefficient over the two token sets.
///
/// Useful when no embeddings endpoint is available and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalScorer;

impl LexicalScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn dice(a: &str, b: &str) -> f64 {
        let ta: HashSet<String> = tokenize(a).into_iter().collect();
        let tb: HashSet<String> = tokenize(b).into_iter().collect();
        if ta.is_empty() || tb.is_empty() {
            return 0.0;
        }
        let shared = ta.intersection(&tb).count();
        (2 * shared) as f64 / (ta.len() + tb.len()) as f64
    }
}

#[async_trait]
impl SimilarityScorer for LexicalScorer {
    async fn score(&self, a: &str, b: &str) -> OracleOutcome<f64> {
        if a.trim().is_empty() || b.trim().is_empty() {
            return OracleOutcome::neutral("empty input");
        }
        OracleOutcome::produced(Self::dice(a, b))
    }
}
