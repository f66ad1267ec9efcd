//! LLM-backed oracle implementations.
//!
//! All of them share one [`OpenAiClient`]. Failures are logged at `warn` and
//! turned into neutral outcomes; only the summarizer and embedder propagate
//! errors, because their callers (the stores) report them as build status.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::client::{strip_code_fence, ChatMessage, ChatOptions, OpenAiClient};
use crate::error::{OracleError, OracleResult};
use crate::outcome::OracleOutcome;
use crate::prompts;
use crate::similarity::cosine_similarity;
use crate::traits::{
    AnswerOracle, DialogueSummarizer, Embedder, QuestionOracle, SimilarityScorer, StrategyAdvisor,
};
use crate::types::{DialogueSummary, FailedProbe, GeneratedQa, UpdateStrategy};

#[derive(Debug, Deserialize)]
struct QaEnvelope {
    #[serde(default)]
    qa_pairs: Vec<RawQa>,
}

#[derive(Debug, Deserialize)]
struct RawQa {
    question: Option<String>,
    answer: Option<String>,
    category: Option<String>,
    focus_area: Option<String>,
}

/// Parse a question-generation response into at most `count` pairs.
///
/// Items missing a question or an answer are dropped.
pub fn parse_qa_pairs(content: &str, count: usize) -> OracleResult<Vec<GeneratedQa>> {
    let envelope: QaEnvelope = serde_json::from_str(strip_code_fence(content))?;
    Ok(envelope
        .qa_pairs
        .into_iter()
        .filter_map(|raw| {
            let question = raw.question?.trim().to_string();
            let answer = raw.answer?.trim().to_string();
            if question.is_empty() || answer.is_empty() {
                return None;
            }
            Some(GeneratedQa {
                question,
                answer,
                category: raw.category,
                focus_area: raw.focus_area,
            })
        })
        .take(count)
        .collect())
}

/// Parse a summarisation response.
pub fn parse_summary(content: &str) -> OracleResult<DialogueSummary> {
    let summary: DialogueSummary = serde_json::from_str(strip_code_fence(content))?;
    Ok(summary)
}

/// Question oracle backed by chat completions.
pub struct LlmQuestionOracle {
    client: Arc<OpenAiClient>,
}

impl LlmQuestionOracle {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QuestionOracle for LlmQuestionOracle {
    async fn generate(&self, dialogue: &str, count: usize) -> OracleOutcome<Vec<GeneratedQa>> {
        let messages = [ChatMessage::user(prompts::question_prompt(dialogue, count))];
        let result = match self.client.chat(&messages, ChatOptions::json()).await {
            Ok(content) => parse_qa_pairs(&content, count),
            Err(e) => Err(e),
        };
        if let Err(ref e) = result {
            warn!(error = %e, "question generation failed");
        }
        result.into()
    }
}

/// Answer oracle backed by chat completions.
pub struct LlmAnswerOracle {
    client: Arc<OpenAiClient>,
}

impl LlmAnswerOracle {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerOracle for LlmAnswerOracle {
    async fn answer(&self, context: &str, question: &str) -> OracleOutcome<String> {
        if context.trim().is_empty() {
            return OracleOutcome::produced(prompts::UNANSWERABLE.to_string());
        }
        let messages = [ChatMessage::user(prompts::answer_prompt(context, question))];
        let result = self.client.chat(&messages, ChatOptions::default()).await;
        if let Err(ref e) = result {
            warn!(error = %e, "answer generation failed");
        }
        result.into()
    }
}

/// Embedder backed by the embeddings endpoint.
pub struct ApiEmbedder {
    client: Arc<OpenAiClient>,
}

impl ApiEmbedder {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Embedder for ApiEmbedder {
    async fn embed(&self, texts: &[String]) -> OracleResult<Vec<Vec<f32>>> {
        self.client.embed(texts).await
    }
}

/// Similarity as cosine of two embeddings, clamped to `[0, 1]`.
pub struct EmbeddingScorer {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl SimilarityScorer for EmbeddingScorer {
    async fn score(&self, a: &str, b: &str) -> OracleOutcome<f64> {
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return OracleOutcome::neutral("empty input");
        }
        match self.embedder.embed(&[a.to_string(), b.to_string()]).await {
            Ok(vectors) if vectors.len() == 2 => {
                let cos = cosine_similarity(&vectors[0], &vectors[1]);
                OracleOutcome::produced(f64::from(cos).clamp(0.0, 1.0))
            }
            Ok(vectors) => OracleOutcome::neutral(format!("expected 2 embeddings, got {}", vectors.len())),
            Err(e) => {
                warn!(error = %e, "similarity embedding failed");
                OracleOutcome::neutral(e.to_string())
            }
        }
    }
}

/// Dialogue summarizer backed by chat completions.
pub struct LlmSummarizer {
    client: Arc<OpenAiClient>,
}

impl LlmSummarizer {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DialogueSummarizer for LlmSummarizer {
    async fn summarize(&self, dialogue: &str) -> OracleResult<DialogueSummary> {
        if dialogue.trim().is_empty() {
            return Err(OracleError::Parse("dialogue is empty".to_string()));
        }
        let messages = [ChatMessage::user(prompts::summarize_prompt(dialogue))];
        let content = self.client.chat(&messages, ChatOptions::json()).await?;
        parse_summary(&content)
    }
}

/// Strategy advisor backed by chat completions.
pub struct LlmStrategyAdvisor {
    client: Arc<OpenAiClient>,
}

impl LlmStrategyAdvisor {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StrategyAdvisor for LlmStrategyAdvisor {
    async fn propose(
        &self,
        failed: &[FailedProbe],
        error_types: &[String],
        session_index: usize,
    ) -> OracleOutcome<UpdateStrategy> {
        let messages = [
            ChatMessage::system(prompts::JSON_ONLY_SYSTEM),
            ChatMessage::user(prompts::strategy_prompt(failed, error_types, session_index)),
        ];
        let options = ChatOptions {
            temperature: 0.5,
            max_tokens: Some(1000),
            json_mode: true,
        };
        let result = match self.client.chat(&messages, options).await {
            Ok(content) => serde_json::from_str::<UpdateStrategy>(strip_code_fence(&content))
                .map_err(OracleError::from),
            Err(e) => Err(e),
        };
        if let Err(ref e) = result {
            warn!(error = %e, "strategy generation failed");
        }
        result.into()
    }
}
