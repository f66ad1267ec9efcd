//! Error types for ama-oracle

use thiserror::Error;

/// Errors that can occur while talking to an external oracle.
///
/// These never reach the evaluator directly: the oracle implementations turn
/// them into [`crate::OracleOutcome::Neutral`] values.
#[derive(Error, Debug)]
pub enum OracleError {
    /// API key or endpoint missing / unusable
    #[error("oracle is not configured: {0}")]
    NotConfigured(String),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response had no usable content
    #[error("oracle returned an empty response")]
    EmptyResponse,

    /// Response content could not be parsed
    #[error("failed to parse oracle response: {0}")]
    Parse(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        OracleError::Http(err.to_string())
    }
}

/// Result type for oracle operations
pub type OracleResult<T> = std::result::Result<T, OracleError>;
