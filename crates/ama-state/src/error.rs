//! Error types for ama-state

use thiserror::Error;

/// Errors from memory store operations.
///
/// Oracle failures during a rebuild are not errors here: they are reported
/// through `BuildReport { status: Error, .. }`. These variants cover the
/// structural failures the orchestrator must surface.
#[derive(Error, Debug)]
pub enum StorageError {
    /// User id cannot be used as a storage key
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    /// Persisted artifact does not match its digest sidecar
    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;
