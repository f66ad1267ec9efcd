//! Domain-level error taxonomy for AMA.
//!
//! Oracle failures never reach this type; they degrade to neutral values
//! inside the evaluator. What remains are the structural failures that end
//! a session as `FAILED`.

use ama_state::StorageError;

/// AMA domain errors.
#[derive(Debug, thiserror::Error)]
pub enum AmaError {
    #[error("invalid dialogue: {0}")]
    InvalidDialogue(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for AMA domain operations.
pub type Result<T> = std::result::Result<T, AmaError>;
