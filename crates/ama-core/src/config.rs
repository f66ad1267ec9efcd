//! Pipeline configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ama_state::SearchMethod;

use crate::domain::{AmaError, Result};

/// Default number of probe questions per evaluation pass.
pub const DEFAULT_QA_COUNT: usize = 10;

/// Default number of entries retrieved per question.
pub const DEFAULT_TOP_K: usize = 20;

/// Default minimum similarity for a probe to pass.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Default pass rate (percent) below which memory is reconstructed.
pub const DEFAULT_PASS_RATE_THRESHOLD: f64 = 70.0;

/// Where the post-reconstruction pass gets its probe questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaPolicy {
    /// Re-ask the questions from the initial pass
    #[default]
    Reuse,
    /// Ask the question oracle for a fresh set
    Regenerate,
}

impl std::fmt::Display for QaPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reuse => write!(f, "reuse"),
            Self::Regenerate => write!(f, "regenerate"),
        }
    }
}

impl FromStr for QaPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reuse" => Ok(Self::Reuse),
            "regenerate" => Ok(Self::Regenerate),
            other => Err(format!("unknown QA policy: {other}")),
        }
    }
}

/// Tunables for evaluation and repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub qa_count: usize,
    pub top_k: usize,
    pub search_method: SearchMethod,
    pub similarity_threshold: f64,
    pub pass_rate_threshold: f64,
    /// Ask for an advisory strategy when more probes than this fail
    pub strategy_failure_threshold: usize,
    /// Probes evaluated concurrently; 1 is sequential
    pub max_concurrency: usize,
    pub qa_policy: QaPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            qa_count: DEFAULT_QA_COUNT,
            top_k: DEFAULT_TOP_K,
            search_method: SearchMethod::Vector,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            pass_rate_threshold: DEFAULT_PASS_RATE_THRESHOLD,
            strategy_failure_threshold: 2,
            max_concurrency: 1,
            qa_policy: QaPolicy::Reuse,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.qa_count == 0 {
            return Err(AmaError::Config("qa_count must be at least 1".to_string()));
        }
        if self.top_k == 0 {
            return Err(AmaError::Config("top_k must be at least 1".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(AmaError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AmaError::Config(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !(0.0..=100.0).contains(&self.pass_rate_threshold) {
            return Err(AmaError::Config(format!(
                "pass_rate_threshold must be within [0, 100], got {}",
                self.pass_rate_threshold
            )));
        }
        Ok(())
    }

    pub fn with_qa_count(mut self, qa_count: usize) -> Self {
        self.qa_count = qa_count;
        self
    }

    pub fn with_search_method(mut self, method: SearchMethod) -> Self {
        self.search_method = method;
        self
    }

    pub fn with_qa_policy(mut self, policy: QaPolicy) -> Self {
        self.qa_policy = policy;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }
}
