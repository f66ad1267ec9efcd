//! Global atomic counters for AMA observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a batch).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    sessions_processed: AtomicU64,
    evaluations_run: AtomicU64,
    reconstructions_attempted: AtomicU64,
    reconstructions_succeeded: AtomicU64,
    corrections_injected: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            sessions_processed: AtomicU64::new(0),
            evaluations_run: AtomicU64::new(0),
            reconstructions_attempted: AtomicU64::new(0),
            reconstructions_succeeded: AtomicU64::new(0),
            corrections_injected: AtomicU64::new(0),
        }
    }

    pub fn inc_sessions(&self) {
        self.sessions_processed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_processed", "counter incremented");
    }

    pub fn inc_evaluations(&self) {
        self.evaluations_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evaluations_run", "counter incremented");
    }

    /// Record one reconstruction attempt and whether the rebuild succeeded.
    pub fn record_reconstruction(&self, succeeded: bool) {
        self.reconstructions_attempted.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            self.reconstructions_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(metric = "reconstructions", succeeded, "counter incremented");
    }

    pub fn add_corrections(&self, n: u64) {
        self.corrections_injected.fetch_add(n, Ordering::Relaxed);
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            sessions_processed = self.sessions_processed(),
            evaluations_run = self.evaluations_run(),
            reconstructions_attempted = self.reconstructions_attempted(),
            reconstructions_succeeded = self.reconstructions_succeeded(),
            corrections_injected = self.corrections_injected(),
        );
    }

    pub fn sessions_processed(&self) -> u64 {
        self.sessions_processed.load(Ordering::Relaxed)
    }

    pub fn evaluations_run(&self) -> u64 {
        self.evaluations_run.load(Ordering::Relaxed)
    }

    pub fn reconstructions_attempted(&self) -> u64 {
        self.reconstructions_attempted.load(Ordering::Relaxed)
    }

    pub fn reconstructions_succeeded(&self) -> u64 {
        self.reconstructions_succeeded.load(Ordering::Relaxed)
    }

    pub fn corrections_injected(&self) -> u64 {
        self.corrections_injected.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.sessions_processed.store(0, Ordering::Relaxed);
        self.evaluations_run.store(0, Ordering::Relaxed);
        self.reconstructions_attempted.store(0, Ordering::Relaxed);
        self.reconstructions_succeeded.store(0, Ordering::Relaxed);
        self.corrections_injected.store(0, Ordering::Relaxed);
    }
}
