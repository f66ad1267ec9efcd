//! Session orchestration: build → evaluate → (reconstruct → re-evaluate) →
//! save.
//!
//! A session always ends in `Done` or `Failed`. Oracle trouble never fails a
//! session; only structural errors (storage, I/O) do, and those are captured
//! in the result instead of being returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};

use ama_oracle::UpdateStrategy;
use ama_state::{BuildStatus, MemoryStore};

use crate::adapter::MemoryAdapter;
use crate::config::QaPolicy;
use crate::domain::{
    AmaError, DialogueSession, EvaluationOutcome, EvaluationRecord, EvaluationSummary, Result,
};
use crate::evaluator::Evaluator;
use crate::metrics::METRICS;
use crate::obs;

/// Orchestrator states, in the order a session visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Started,
    Built,
    Evaluated,
    Reconstructing,
    ReEvaluated,
    Saved,
    Done,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Built => "built",
            Self::Evaluated => "evaluated",
            Self::Reconstructing => "reconstructing",
            Self::ReEvaluated => "re_evaluated",
            Self::Saved => "saved",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Which memory state a persisted artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactVariant {
    Original,
    Reconstructed,
}

impl ArtifactVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Reconstructed => "reconstructed",
        }
    }
}

/// Headline numbers of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub pass_rate: f64,
    pub qa_count: usize,
    pub passed: usize,
    pub failed: usize,
}

impl From<&EvaluationSummary> for PassSummary {
    fn from(s: &EvaluationSummary) -> Self {
        Self {
            pass_rate: s.pass_rate,
            qa_count: s.qa_count,
            passed: s.passed,
            failed: s.failed,
        }
    }
}

/// Terminal record of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub user_id: String,
    pub success: bool,
    /// Initial pass rate
    pub pass_rate: f64,
    pub initial_pass_rate: f64,
    pub qa_count: usize,
    pub passed: usize,
    pub failed: usize,
    /// The question oracle produced no probes
    pub no_signal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_status: Option<BuildStatus>,
    pub reconstructed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_reconstruct: Option<PassSummary>,
    /// The post-reconstruction pass produced no probes
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub after_no_signal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement: Option<f64>,
    pub original_lines: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_lines: Option<usize>,
    pub corrections_added: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconstruction_error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_probes: Vec<EvaluationRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remaining_failures: Vec<EvaluationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<UpdateStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_variant: Option<ArtifactVariant>,
    pub memory_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_digest: Option<String>,
    pub states: Vec<SessionState>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionResult {
    pub fn new(user_id: &str, session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            success: false,
            pass_rate: 0.0,
            initial_pass_rate: 0.0,
            qa_count: 0,
            passed: 0,
            failed: 0,
            no_signal: false,
            build_status: None,
            reconstructed: false,
            after_reconstruct: None,
            after_no_signal: false,
            improvement: None,
            original_lines: 0,
            filtered_lines: None,
            corrections_added: 0,
            reconstruction_error: None,
            failed_probes: Vec::new(),
            remaining_failures: Vec::new(),
            update_strategy: None,
            artifact_variant: None,
            memory_file: None,
            artifact_digest: None,
            states: vec![SessionState::Started],
            duration_ms: 0,
            error: None,
        }
    }

    /// Result for a session that could not even be loaded.
    pub fn failed(user_id: &str, session_id: &str, error: impl std::fmt::Display) -> Self {
        let mut result = Self::new(user_id, session_id);
        result.error = Some(error.to_string());
        result.states.push(SessionState::Failed);
        result
    }

    pub fn state(&self) -> SessionState {
        self.states.last().copied().unwrap_or(SessionState::Started)
    }

    fn transition(&mut self, to: SessionState) {
        obs::emit_state_transition(&self.session_id, self.state().as_str(), to.as_str());
        self.states.push(to);
    }
}

/// Wires store, evaluator and adapter into the session loop.
pub struct SessionOrchestrator {
    store: Arc<dyn MemoryStore>,
    evaluator: Evaluator,
    adapter: Arc<dyn MemoryAdapter>,
    output_dir: PathBuf,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        evaluator: Evaluator,
        adapter: Arc<dyn MemoryAdapter>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            evaluator,
            adapter,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// `<output_dir>/<user_id>_<session_id>_<variant>_memory.json`
    pub fn artifact_path(&self, user_id: &str, session_id: &str, variant: ArtifactVariant) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_{}_memory.json",
            user_id,
            session_id,
            variant.as_str()
        ))
    }

    /// Process one session to a terminal state.
    pub async fn run(&self, session: &DialogueSession) -> SessionResult {
        self.run_indexed(session, 0).await
    }

    /// Process sessions one after another. A failed session does not stop
    /// the batch.
    pub async fn run_batch(&self, sessions: &[DialogueSession]) -> Vec<SessionResult> {
        let mut results = Vec::with_capacity(sessions.len());
        for (index, session) in sessions.iter().enumerate() {
            results.push(self.run_indexed(session, index).await);
        }
        METRICS.flush();
        results
    }

    /// Process the `session_index`-th session of a batch.
    pub async fn run_indexed(&self, session: &DialogueSession, session_index: usize) -> SessionResult {
        let span = obs::session_span(&session.user_id, &session.session_id);
        async {
            let started = Instant::now();
            let mut result = SessionResult::new(&session.user_id, &session.session_id);
            obs::emit_session_started(&session.user_id, &session.session_id, session.line_count());

            match self.drive(session, session_index, &mut result).await {
                Ok(()) => {
                    result.success = true;
                    result.transition(SessionState::Done);
                }
                Err(e) => {
                    obs::emit_session_failed(&session.session_id, &e);
                    result.error = Some(e.to_string());
                    result.transition(SessionState::Failed);
                }
            }

            result.duration_ms = started.elapsed().as_millis() as u64;
            METRICS.inc_sessions();
            obs::emit_session_finished(
                &result.session_id,
                result.duration_ms,
                result.success,
                result.reconstructed,
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        session: &DialogueSession,
        session_index: usize,
        result: &mut SessionResult,
    ) -> Result<()> {
        let user_id = session.user_id.as_str();
        let session_id = session.session_id.as_str();
        if session_id.trim().is_empty() || session_id.contains(['/', '\\']) || session_id.contains("..") {
            return Err(AmaError::InvalidDialogue(format!(
                "session id {session_id:?} cannot name an artifact"
            )));
        }
        let dialogue = session.text();
        result.original_lines = session.line_count();

        // Build. A failed build is tolerated: evaluation runs against
        // whatever the store already holds.
        let build = self.store.rebuild_from_dialogue(user_id, &dialogue).await?;
        if build.is_built() {
            info!(memories = build.memories_count, total = build.total_memories, "memory built");
        } else {
            warn!(
                error = build.error.as_deref().unwrap_or("unknown error"),
                "memory build failed, evaluating existing memory"
            );
        }
        result.build_status = Some(build.status);
        result.transition(SessionState::Built);

        // Evaluate against the raw dialogue.
        let initial = self
            .evaluator
            .evaluate_session(self.store.as_ref(), user_id, &dialogue, session_index)
            .await?;
        let summary = initial.summary();
        result.pass_rate = summary.pass_rate;
        result.initial_pass_rate = summary.pass_rate;
        result.qa_count = summary.qa_count;
        result.passed = summary.passed;
        result.failed = summary.failed;
        result.no_signal = initial.is_no_signal();
        result.transition(SessionState::Evaluated);

        let mut variant = ArtifactVariant::Original;
        if let EvaluationOutcome::Evaluated(report) = &initial {
            result.failed_probes = report.failed.clone();
            result.update_strategy = report.update_strategy.clone();

            if report.summary.need_reconstruct {
                info!(
                    pass_rate = report.summary.pass_rate,
                    threshold = self.evaluator.config().pass_rate_threshold,
                    "pass rate below threshold, reconstructing"
                );
                result.transition(SessionState::Reconstructing);

                let corrections = report.corrections();
                let filtered = self.adapter.filter(&dialogue, &corrections);
                result.filtered_lines = Some(filtered.split('\n').count());
                let outcome = self
                    .adapter
                    .reconstruct(self.store.as_ref(), user_id, &filtered, &corrections)
                    .await;
                result.reconstructed = outcome.rebuilt;
                result.corrections_added = outcome.corrections_added;
                result.reconstruction_error = outcome.error;

                if outcome.rebuilt {
                    // Re-evaluate against the original dialogue, not the filtered one.
                    let after = match self.evaluator.config().qa_policy {
                        QaPolicy::Reuse => {
                            self.evaluator
                                .evaluate_pairs(self.store.as_ref(), user_id, &report.qa_pairs)
                                .await?
                        }
                        QaPolicy::Regenerate => {
                            self.evaluator
                                .evaluate_session(
                                    self.store.as_ref(),
                                    user_id,
                                    &dialogue,
                                    session_index,
                                )
                                .await?
                        }
                    };
                    match after.report() {
                        Some(after_report) => {
                            let after_summary = &after_report.summary;
                            result.improvement =
                                Some(after_summary.pass_rate - summary.pass_rate);
                            result.after_reconstruct = Some(PassSummary::from(after_summary));
                            result.remaining_failures = after_report.failed.clone();
                        }
                        None => {
                            warn!("re-evaluation produced no probes, no comparison available");
                            result.after_no_signal = true;
                        }
                    }
                    result.transition(SessionState::ReEvaluated);
                    variant = ArtifactVariant::Reconstructed;
                }
            }
        }

        // Save.
        let path = self.artifact_path(user_id, session_id, variant);
        let artifact = self.store.persist(user_id, &path).await?;
        info!(
            variant = variant.as_str(),
            path = %artifact.path.display(),
            entries = artifact.entries,
            "memory saved"
        );
        result.artifact_variant = Some(variant);
        result.memory_file = Some(artifact.path);
        result.artifact_digest = Some(artifact.digest);
        result.transition(SessionState::Saved);
        Ok(())
    }
}
