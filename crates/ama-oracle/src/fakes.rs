//! Deterministic oracle fakes (testing only)
//!
//! Provide scripted implementations of every oracle trait so the full
//! evaluate / reconstruct loop can run offline.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{OracleError, OracleResult};
use crate::outcome::OracleOutcome;
use crate::prompts::UNANSWERABLE;
use crate::similarity::tokenize;
use crate::traits::{
    AnswerOracle, DialogueSummarizer, Embedder, QuestionOracle, SimilarityScorer, StrategyAdvisor,
};
use crate::types::{DialogueSummary, FailedProbe, GeneratedQa, SummarizedMemory, UpdateStrategy};

// ---------------------------------------------------------------------------
// ScriptedQuestionOracle
// ---------------------------------------------------------------------------

/// Returns a scripted QA batch per call; the last batch repeats once the
/// script runs out. `None` batches produce a neutral outcome.
#[derive(Debug, Default)]
pub struct ScriptedQuestionOracle {
    script: Mutex<VecDeque<Option<Vec<GeneratedQa>>>>,
    last: Mutex<Option<Vec<GeneratedQa>>>,
    calls: AtomicUsize,
}

impl ScriptedQuestionOracle {
    /// Always return the same pairs.
    pub fn new(pairs: Vec<GeneratedQa>) -> Self {
        Self::with_script(vec![Some(pairs)])
    }

    /// Always degrade to a neutral outcome.
    pub fn failing() -> Self {
        Self::with_script(vec![None])
    }

    pub fn with_script(script: Vec<Option<Vec<GeneratedQa>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionOracle for ScriptedQuestionOracle {
    async fn generate(&self, _dialogue: &str, count: usize) -> OracleOutcome<Vec<GeneratedQa>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let batch = match next {
            Some(batch) => {
                *self.last.lock().unwrap() = batch.clone();
                batch
            }
            None => self.last.lock().unwrap().clone(),
        };
        match batch {
            Some(pairs) => OracleOutcome::produced(pairs.into_iter().take(count).collect()),
            None => OracleOutcome::neutral("scripted failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// ContextAnswerOracle
// ---------------------------------------------------------------------------

/// A faithful reader: answers a known question with its answer only when that
/// answer appears in the retrieved context, and `Unanswerable` otherwise.
#[derive(Debug, Default)]
pub struct ContextAnswerOracle {
    known: Vec<(String, String)>,
    calls: AtomicUsize,
}

impl ContextAnswerOracle {
    pub fn new(known: Vec<(String, String)>) -> Self {
        Self {
            known,
            calls: AtomicUsize::new(0),
        }
    }

    /// Know every question/answer of a QA batch.
    pub fn from_pairs(pairs: &[GeneratedQa]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|p| (p.question.clone(), p.answer.clone()))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerOracle for ContextAnswerOracle {
    async fn answer(&self, context: &str, question: &str) -> OracleOutcome<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let context = context.to_lowercase();
        let found = self
            .known
            .iter()
            .find(|(q, a)| q == question && context.contains(&a.to_lowercase()));
        match found {
            Some((_, answer)) => OracleOutcome::produced(answer.clone()),
            None => OracleOutcome::produced(UNANSWERABLE.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// ExactMatchScorer
// ---------------------------------------------------------------------------

/// 1.0 when both texts are equal ignoring case and surrounding whitespace,
/// otherwise 0.0.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatchScorer;

#[async_trait]
impl SimilarityScorer for ExactMatchScorer {
    async fn score(&self, a: &str, b: &str) -> OracleOutcome<f64> {
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return OracleOutcome::neutral("empty input");
        }
        OracleOutcome::produced(if a.eq_ignore_ascii_case(b) { 1.0 } else { 0.0 })
    }
}

// ---------------------------------------------------------------------------
// StaticSummarizer
// ---------------------------------------------------------------------------

/// Returns the same summary for every dialogue. Can be told to start failing
/// after a number of successful calls.
#[derive(Debug)]
pub struct StaticSummarizer {
    summary: DialogueSummary,
    fail_after: Option<usize>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl StaticSummarizer {
    pub fn new(summary: &str, memories: Vec<&str>) -> Self {
        Self {
            summary: DialogueSummary {
                summary: summary.to_string(),
                memories: memories
                    .into_iter()
                    .map(|content| SummarizedMemory {
                        content: content.to_string(),
                        timestamp: None,
                    })
                    .collect(),
            },
            fail_after: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Fail on every call.
    pub fn failing() -> Self {
        Self::new("", Vec::new()).fail_after(0)
    }

    /// Succeed `n` times, then fail.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Dialogues received so far, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DialogueSummarizer for StaticSummarizer {
    async fn summarize(&self, dialogue: &str) -> OracleResult<DialogueSummary> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(dialogue.to_string());
        if self.fail_after.is_some_and(|n| call >= n) {
            return Err(OracleError::Http("scripted summarizer outage".to_string()));
        }
        Ok(self.summary.clone())
    }
}

// ---------------------------------------------------------------------------
// StaticAdvisor
// ---------------------------------------------------------------------------

/// Returns a fixed strategy and records how many failed probes it was shown.
#[derive(Debug, Default)]
pub struct StaticAdvisor {
    strategy: UpdateStrategy,
    calls: AtomicUsize,
    last_failed: AtomicUsize,
}

impl StaticAdvisor {
    pub fn new(strategy: UpdateStrategy) -> Self {
        Self {
            strategy,
            calls: AtomicUsize::new(0),
            last_failed: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_failed(&self) -> usize {
        self.last_failed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StrategyAdvisor for StaticAdvisor {
    async fn propose(
        &self,
        failed: &[FailedProbe],
        _error_types: &[String],
        _session_index: usize,
    ) -> OracleOutcome<UpdateStrategy> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_failed.store(failed.len(), Ordering::SeqCst);
        OracleOutcome::produced(self.strategy.clone())
    }
}

// ---------------------------------------------------------------------------
// HashEmbedder
// ---------------------------------------------------------------------------

/// Bag-of-words embedder: each token is hashed into one of `dims` buckets.
/// Texts sharing tokens get a positive cosine similarity.
#[derive(Debug)]
pub struct HashEmbedder {
    dims: usize,
    failing: bool,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims: dims.max(1),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            dims: 1,
            failing: true,
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(bytes) % self.dims as u64) as usize
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> OracleResult<Vec<Vec<f32>>> {
        if self.failing {
            return Err(OracleError::Http("scripted embedder outage".to_string()));
        }
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; self.dims];
                for token in tokenize(text) {
                    v[self.bucket(&token)] += 1.0;
                }
                v
            })
            .collect())
    }
}
