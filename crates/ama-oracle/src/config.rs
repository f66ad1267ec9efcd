//! Oracle endpoint configuration

use serde::{Deserialize, Serialize};

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Connection settings shared by every LLM-backed oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Bearer token (optional for local endpoints)
    pub api_key: Option<String>,
    /// Base URL, without a trailing slash
    pub api_base: String,
    /// Chat-completions model
    pub model: String,
    /// Embeddings model
    pub embedding_model: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            api_key: std::env::var("AMA_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok(),
            api_base: std::env::var("AMA_API_BASE")
                .or_else(|_| std::env::var("OPENAI_BASE_URL"))
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            model: std::env::var("AMA_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            embedding_model: std::env::var("AMA_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            timeout_secs: 60,
        }
    }
}

impl OracleConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint
    pub fn new(api_base: &str, model: &str) -> Self {
        OracleConfig {
            api_key: None,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_secs: 60,
        }
    }

    /// Set authentication token
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Set embeddings model
    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    /// Endpoint URL for a relative API path such as `chat/completions`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }
}
