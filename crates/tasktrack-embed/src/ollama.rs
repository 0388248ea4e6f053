//! Ollama embedding backend.
//!
//! Talks to the native `/api/embed` endpoint of a local or remote Ollama
//! server.

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::Duration;

use crate::error::{EmbedError, Result};
use crate::provider::{Embedder, with_retry};

/// Default Ollama server URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "nomic-embed-text";

/// Configuration for the Ollama embedder.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the server (without the `/api` suffix).
    pub base_url: String,

    /// Embedding model name.
    pub model: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl OllamaConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Ollama embedding client.
pub struct OllamaEmbedder {
    client: Client,
    config: OllamaConfig,
}

impl OllamaEmbedder {
    /// Create a new embedder with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        if config.model.is_empty() {
            return Err(EmbedError::Config("Ollama model cannot be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbedError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn embed_url(&self) -> String {
        format!("{}/api/embed", self.config.base_url.trim_end_matches('/'))
    }

    async fn send_request(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbedRequest {
            model: &self.config.model,
            input: text,
        };

        tracing::debug!(
            model = %self.config.model,
            chars = text.len(),
            "Ollama embed request"
        );

        let response = self
            .client
            .post(self.embed_url())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::Network(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Backend(format!(
                "Ollama API error ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Serialization(format!("Failed to parse response: {}", e)))?;

        match parsed.embeddings.into_iter().next() {
            Some(vector) if !vector.is_empty() => Ok(vector),
            _ => Err(EmbedError::Backend(format!(
                "Ollama returned no embedding for model {}",
                self.config.model
            ))),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "ollama",
            || self.send_request(text),
        )
        .await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EmbedError::Network(format!("Ollama health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EmbedError::Backend(format!(
                "Ollama health check returned {}",
                response.status().as_u16()
            )));
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ollama API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}
