//! Oracle trait definitions
//!
//! These traits are the boundary between the evaluation loop and every
//! external capability it relies on:
//! - `QuestionOracle`: dialogue -> probe questions with ground truth
//! - `AnswerOracle`: retrieved memory + question -> short answer
//! - `SimilarityScorer`: two texts -> score in [0, 1]
//! - `Embedder`: texts -> vectors (used by vector search and scoring)
//! - `DialogueSummarizer`: dialogue -> memories (used by stores)
//! - `StrategyAdvisor`: failed probes -> advisory update plan
//!
//! Everything the evaluator calls returns an [`OracleOutcome`] and never
//! fails. The summarizer and embedder are store-side collaborators and return
//! `OracleResult` so the store can report the failure itself.

use async_trait::async_trait;

use crate::error::OracleResult;
use crate::outcome::OracleOutcome;
use crate::types::{DialogueSummary, FailedProbe, GeneratedQa, UpdateStrategy};

#[async_trait]
pub trait QuestionOracle: Send + Sync {
    /// Generate up to `count` probe questions for a dialogue. May return
    /// fewer, or a neutral outcome on failure.
    async fn generate(&self, dialogue: &str, count: usize) -> OracleOutcome<Vec<GeneratedQa>>;
}

#[async_trait]
pub trait AnswerOracle: Send + Sync {
    /// Answer `question` using only `context`.
    async fn answer(&self, context: &str, question: &str) -> OracleOutcome<String>;
}

#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Score semantic closeness of two texts in `[0, 1]`. Empty input scores 0.
    async fn score(&self, a: &str, b: &str) -> OracleOutcome<f64>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed each text, preserving order.
    async fn embed(&self, texts: &[String]) -> OracleResult<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait DialogueSummarizer: Send + Sync {
    /// Distil a dialogue into searchable memories.
    async fn summarize(&self, dialogue: &str) -> OracleResult<DialogueSummary>;
}

#[async_trait]
pub trait StrategyAdvisor: Send + Sync {
    /// Propose memory updates for a set of failed probes.
    async fn propose(
        &self,
        failed: &[FailedProbe],
        error_types: &[String],
        session_index: usize,
    ) -> OracleOutcome<UpdateStrategy>;
}
