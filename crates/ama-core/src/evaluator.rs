//! Memory evaluation: probe a store with generated questions and score the
//! answers it supports against ground truth.
//!
//! Every oracle call degrades to a neutral value, so a pass always completes
//! with a number for each probe. Only store failures surface as errors.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use ama_oracle::{
    AnswerOracle, OracleOutcome, OracleSet, QuestionOracle, SimilarityScorer, StrategyAdvisor,
    UpdateStrategy,
};
use ama_state::MemoryStore;

use crate::config::PipelineConfig;
use crate::domain::{
    ErrorAnalysis, EvaluationOutcome, EvaluationRecord, EvaluationReport, EvaluationSummary,
    QaPair, Result,
};
use crate::metrics::METRICS;
use crate::obs;

/// Runs evaluation passes. Holds no state between passes.
#[derive(Clone)]
pub struct Evaluator {
    questions: Arc<dyn QuestionOracle>,
    answers: Arc<dyn AnswerOracle>,
    scorer: Arc<dyn SimilarityScorer>,
    advisor: Option<Arc<dyn StrategyAdvisor>>,
    config: PipelineConfig,
}

impl Evaluator {
    pub fn new(
        questions: Arc<dyn QuestionOracle>,
        answers: Arc<dyn AnswerOracle>,
        scorer: Arc<dyn SimilarityScorer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            questions,
            answers,
            scorer,
            advisor: None,
            config,
        }
    }

    /// Evaluator using every oracle of a set, advisor included.
    pub fn from_oracles(oracles: &OracleSet, config: PipelineConfig) -> Self {
        Self::new(
            Arc::clone(&oracles.questions),
            Arc::clone(&oracles.answers),
            Arc::clone(&oracles.scorer),
            config,
        )
        .with_advisor(Arc::clone(&oracles.advisor))
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn StrategyAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ask the question oracle for `qa_count` probes. Returns the probes and,
    /// when the oracle degraded, the reason.
    pub async fn generate_pairs(
        &self,
        dialogue: &str,
        session_index: usize,
    ) -> (Vec<QaPair>, Option<String>) {
        match self.questions.generate(dialogue, self.config.qa_count).await {
            OracleOutcome::Produced { value } => {
                let pairs: Vec<QaPair> = value
                    .into_iter()
                    .take(self.config.qa_count)
                    .map(|qa| QaPair::from_generated(qa, session_index))
                    .collect();
                debug!(count = pairs.len(), "generated probe questions");
                (pairs, None)
            }
            OracleOutcome::Neutral { reason } => {
                warn!(%reason, "question generation degraded");
                (Vec::new(), Some(reason))
            }
        }
    }

    /// Generate probes for `dialogue` and evaluate the store against them.
    pub async fn evaluate(
        &self,
        store: &dyn MemoryStore,
        user_id: &str,
        dialogue: &str,
    ) -> Result<EvaluationOutcome> {
        self.evaluate_session(store, user_id, dialogue, 0).await
    }

    /// [`Evaluator::evaluate`] for the `session_index`-th session of a batch.
    pub async fn evaluate_session(
        &self,
        store: &dyn MemoryStore,
        user_id: &str,
        dialogue: &str,
        session_index: usize,
    ) -> Result<EvaluationOutcome> {
        let started = Instant::now();
        let (pairs, reason) = self.generate_pairs(dialogue, session_index).await;
        if pairs.is_empty() {
            obs::emit_no_signal(user_id, reason.as_deref());
            return Ok(EvaluationOutcome::NoSignal {
                reason,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
        self.evaluate_pairs(store, user_id, &pairs).await
    }

    /// Evaluate the store against a fixed probe set.
    ///
    /// Probes are independent; up to `max_concurrency` run at once and
    /// records keep probe order.
    pub async fn evaluate_pairs(
        &self,
        store: &dyn MemoryStore,
        user_id: &str,
        pairs: &[QaPair],
    ) -> Result<EvaluationOutcome> {
        let started = Instant::now();
        if pairs.is_empty() {
            obs::emit_no_signal(user_id, None);
            return Ok(EvaluationOutcome::NoSignal {
                reason: None,
                duration_ms: 0,
            });
        }

        let records: Vec<EvaluationRecord> = stream::iter(pairs)
            .map(|pair| self.probe(store, user_id, pair))
            .buffered(self.config.max_concurrency.max(1))
            .try_collect()
            .await?;

        let summary = EvaluationSummary::from_records(&records, self.config.pass_rate_threshold);
        let failed: Vec<EvaluationRecord> =
            records.iter().filter(|r| !r.is_pass).cloned().collect();
        let error_analysis = ErrorAnalysis::from_failed(&failed);
        let session_index = pairs[0].session_index;
        let update_strategy = self
            .advise(&failed, &error_analysis, session_index)
            .await;

        METRICS.inc_evaluations();
        obs::emit_evaluation_completed(
            user_id,
            summary.qa_count,
            summary.pass_rate,
            summary.need_reconstruct,
        );

        Ok(EvaluationOutcome::Evaluated(EvaluationReport {
            summary,
            records,
            failed,
            error_analysis,
            qa_pairs: pairs.to_vec(),
            update_strategy,
            duration_ms: started.elapsed().as_millis() as u64,
        }))
    }

    /// Retrieve, answer and score one probe.
    async fn probe(
        &self,
        store: &dyn MemoryStore,
        user_id: &str,
        pair: &QaPair,
    ) -> Result<EvaluationRecord> {
        let hits = store
            .search(
                user_id,
                &pair.question,
                self.config.top_k,
                self.config.search_method,
            )
            .await?;
        let context = hits
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let answer = self.answers.answer(&context, &pair.question).await;
        if let Some(reason) = answer.reason() {
            debug!(question = %pair.question, %reason, "answer degraded");
        }
        let retrieved = answer.value().trim().to_string();

        let similarity = if retrieved.is_empty() {
            0.0
        } else {
            let score = self.scorer.score(&pair.true_answer, &retrieved).await;
            if let Some(reason) = score.reason() {
                debug!(question = %pair.question, %reason, "similarity degraded");
            }
            score.value()
        };

        let record = EvaluationRecord::scored(
            pair,
            retrieved,
            similarity,
            self.config.similarity_threshold,
        );
        debug!(
            question = %record.question,
            similarity = record.similarity,
            passed = record.is_pass,
            retrieved = hits.len(),
            "probe scored"
        );
        Ok(record)
    }

    /// Advisory strategy, only when enough probes failed.
    async fn advise(
        &self,
        failed: &[EvaluationRecord],
        analysis: &ErrorAnalysis,
        session_index: usize,
    ) -> Option<UpdateStrategy> {
        let advisor = self.advisor.as_ref()?;
        if failed.len() <= self.config.strategy_failure_threshold {
            return None;
        }
        let probes: Vec<_> = failed.iter().map(EvaluationRecord::failed_probe).collect();
        match advisor
            .propose(&probes, &analysis.type_names(), session_index)
            .await
        {
            OracleOutcome::Produced { value } => Some(value),
            OracleOutcome::Neutral { reason } => {
                debug!(%reason, "update strategy unavailable");
                None
            }
        }
    }
}
