//! Structured observability hooks for the AMA session lifecycle.
//!
//! This module provides:
//! - The `ama.session` span the orchestrator instruments each run with
//! - Emission functions for key lifecycle events: session start/finish,
//!   state transitions, evaluation passes and reconstruction
//!
//! Events are emitted at `info!` level (filtered by `AMA_LOG` or `RUST_LOG`).

use tracing::info;

/// The `ama.session` span, for instrumenting futures that cross awaits.
pub fn session_span(user_id: &str, session_id: &str) -> tracing::Span {
    tracing::info_span!("ama.session", user_id = %user_id, session_id = %session_id)
}

/// Emit event: session processing started.
pub fn emit_session_started(user_id: &str, session_id: &str, lines: usize) {
    info!(
        event = "session.started",
        user_id = %user_id,
        session_id = %session_id,
        lines = lines,
    );
}

/// Emit event: session reached a terminal state.
pub fn emit_session_finished(session_id: &str, duration_ms: u64, success: bool, reconstructed: bool) {
    info!(
        event = "session.finished",
        session_id = %session_id,
        duration_ms = duration_ms,
        success = success,
        reconstructed = reconstructed,
    );
}

/// Emit event: orchestrator moved to a new state.
pub fn emit_state_transition(session_id: &str, from: &str, to: &str) {
    info!(event = "session.transition", session_id = %session_id, from = %from, to = %to);
}

/// Emit event: an evaluation pass completed.
pub fn emit_evaluation_completed(user_id: &str, qa_count: usize, pass_rate: f64, need_reconstruct: bool) {
    info!(
        event = "evaluation.completed",
        user_id = %user_id,
        qa_count = qa_count,
        pass_rate = pass_rate,
        need_reconstruct = need_reconstruct,
    );
}

/// Emit event: the question oracle produced nothing to evaluate.
pub fn emit_no_signal(user_id: &str, reason: Option<&str>) {
    tracing::warn!(event = "evaluation.no_signal", user_id = %user_id, reason = reason.unwrap_or("empty"));
}

/// Emit event: reconstruction finished.
pub fn emit_reconstruction_finished(user_id: &str, rebuilt: bool, corrections_added: usize) {
    info!(
        event = "reconstruction.finished",
        user_id = %user_id,
        rebuilt = rebuilt,
        corrections_added = corrections_added,
    );
}

/// Emit event: session failed (warning level).
pub fn emit_session_failed(session_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "session.failed", session_id = %session_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_span_create() {
        let span = session_span("user_001", "session_1");
        let _entered = span.enter();
        emit_state_transition("session_1", "built", "evaluated");
    }
}
