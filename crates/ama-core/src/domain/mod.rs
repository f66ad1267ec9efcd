//! Domain models for AMA.
//!
//! Canonical definitions for the core entities:
//! - `DialogueSession`: one transcript to evaluate
//! - `QaPair`: a probe question with ground truth
//! - `EvaluationRecord` / `EvaluationSummary` / `EvaluationReport`: results of a pass

pub mod error;
pub mod eval;
pub mod qa;
pub mod session;

pub use error::{AmaError, Result};
pub use eval::{
    ErrorAnalysis, EvaluationOutcome, EvaluationRecord, EvaluationReport, EvaluationSummary,
    FailureCategory,
};
pub use qa::QaPair;
pub use session::{
    DialogueInput, DialogueSession, TranscriptLine, DEFAULT_SESSION_ID, DEFAULT_USER_ID,
};
