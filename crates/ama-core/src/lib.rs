//! AMA Core Library
//!
//! Evaluates whether a conversational memory store preserves the facts of a
//! dialogue and repairs it when it does not:
//! build → evaluate → (filter → reconstruct → re-evaluate) → persist.

pub mod adapter;
pub mod config;
pub mod domain;
pub mod evaluator;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod reporting;
pub mod telemetry;

pub use adapter::{
    extract_keywords, filter_dialogue, with_correction_block, KeywordAdapter, MemoryAdapter,
    ReconstructionOutcome, STOP_WORDS,
};
pub use config::{PipelineConfig, QaPolicy};
pub use domain::{
    AmaError, DialogueInput, DialogueSession, ErrorAnalysis, EvaluationOutcome, EvaluationRecord,
    EvaluationReport, EvaluationSummary, FailureCategory, QaPair, Result, TranscriptLine,
    DEFAULT_SESSION_ID, DEFAULT_USER_ID,
};
pub use evaluator::Evaluator;
pub use orchestrator::{
    ArtifactVariant, PassSummary, SessionOrchestrator, SessionResult, SessionState,
};
pub use reporting::{render_session_summary_md, write_session_report, SessionReportPaths};
pub use telemetry::init_tracing;

pub use ama_oracle::{OracleConfig, OracleSet, ScorerKind};
pub use ama_state::{JsonFileStore, MemoryStore, SearchMethod, VectorStore};
