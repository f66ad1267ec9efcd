//! AMA Oracle: external language and similarity capabilities
//!
//! This crate holds everything the evaluation loop treats as a black box:
//! question generation, answering from memory, similarity scoring,
//! embeddings, dialogue summarisation and advisory strategy generation.
//!
//! ## Layer 1 - External collaborators
//!
//! Focus: never failing the caller. Oracle calls return an
//! [`OracleOutcome`] that degrades to a neutral value instead of erroring.
//!
//! ## Key Components
//!
//! - `OpenAiClient`: shared HTTP client for an OpenAI-compatible endpoint
//! - `Llm*` oracles and `EmbeddingScorer`: production implementations
//! - `LexicalScorer`: offline token-overlap scorer
//! - `fakes`: scripted implementations for tests

pub mod client;
mod config;
mod error;
pub mod fakes;
pub mod llm;
mod outcome;
pub mod prompts;
pub mod similarity;
pub mod traits;
mod types;

use std::sync::Arc;

pub use client::{ChatMessage, ChatOptions, OpenAiClient};
pub use config::{OracleConfig, DEFAULT_API_BASE, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL};
pub use error::{OracleError, OracleResult};
pub use llm::{
    ApiEmbedder, EmbeddingScorer, LlmAnswerOracle, LlmQuestionOracle, LlmStrategyAdvisor,
    LlmSummarizer,
};
pub use outcome::OracleOutcome;
pub use similarity::{cosine_similarity, LexicalScorer};
pub use traits::{
    AnswerOracle, DialogueSummarizer, Embedder, QuestionOracle, SimilarityScorer, StrategyAdvisor,
};
pub use types::{
    DialogueSummary, FailedProbe, GeneratedQa, MemoryUpdate, SummarizedMemory, UpdatePriority,
    UpdateStrategy,
};

/// Which similarity scorer to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerKind {
    /// Cosine similarity of remote embeddings
    Embedding,
    /// Offline token overlap
    Lexical,
}

/// One instance of every oracle, all sharing a single HTTP client.
#[derive(Clone)]
pub struct OracleSet {
    pub questions: Arc<dyn QuestionOracle>,
    pub answers: Arc<dyn AnswerOracle>,
    pub scorer: Arc<dyn SimilarityScorer>,
    pub embedder: Arc<dyn Embedder>,
    pub summarizer: Arc<dyn DialogueSummarizer>,
    pub advisor: Arc<dyn StrategyAdvisor>,
}

impl OracleSet {
    /// Build the LLM-backed oracle set from one configuration.
    pub fn openai(config: OracleConfig, scorer: ScorerKind) -> OracleResult<Self> {
        let client = Arc::new(OpenAiClient::new(config)?);
        let embedder: Arc<dyn Embedder> = Arc::new(ApiEmbedder::new(Arc::clone(&client)));
        let scorer: Arc<dyn SimilarityScorer> = match scorer {
            ScorerKind::Embedding => Arc::new(EmbeddingScorer::new(Arc::clone(&embedder))),
            ScorerKind::Lexical => Arc::new(LexicalScorer::new()),
        };

        Ok(OracleSet {
            questions: Arc::new(LlmQuestionOracle::new(Arc::clone(&client))),
            answers: Arc::new(LlmAnswerOracle::new(Arc::clone(&client))),
            scorer,
            embedder,
            summarizer: Arc::new(LlmSummarizer::new(Arc::clone(&client))),
            advisor: Arc::new(LlmStrategyAdvisor::new(client)),
        })
    }
}
