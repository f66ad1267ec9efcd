//! OpenAI-compatible HTTP client
//!
//! Thin wrapper over reqwest for the two endpoints the oracles need:
//! `chat/completions` and `embeddings`. One client is built per process and
//! shared by every oracle through an `Arc`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::OracleConfig;
use crate::error::{OracleError, OracleResult};

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Options for one chat-completions call.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Ask the endpoint for a JSON object response.
    pub json_mode: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
            json_mode: false,
        }
    }
}

impl ChatOptions {
    pub fn json() -> Self {
        Self {
            json_mode: true,
            ..Self::default()
        }
    }
}

/// Client for an OpenAI-compatible API
pub struct OpenAiClient {
    config: OracleConfig,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: OracleConfig) -> OracleResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("ama-oracle/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(OpenAiClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> OracleResult<Self> {
        Self::new(OracleConfig::from_env())
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http_client.post(self.config.endpoint(path));
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Run a chat completion and return the first choice's text.
    pub async fn chat(&self, messages: &[ChatMessage], options: ChatOptions) -> OracleResult<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options
                .json_mode
                .then(|| serde_json::json!({ "type": "json_object" })),
        };

        debug!(model = %self.config.model, messages = messages.len(), "chat completion");
        let response = self.request("chat/completions").json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(OracleError::EmptyResponse)
    }

    /// Embed a batch of texts, returning vectors in input order.
    pub async fn embed(&self, texts: &[String]) -> OracleResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
        };

        debug!(model = %self.config.embedding_model, inputs = texts.len(), "embedding request");
        let response = self.request("embeddings").json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(OracleError::Parse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Strip a surrounding markdown code fence (optionally tagged `json`).
pub fn strip_code_fence(content: &str) -> &str {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.split("```").next().unwrap_or(rest).trim();
    }
    if let Some(rest) = text.strip_prefix("json") {
        text = rest.trim();
    }
    text
}
