//! Error types for embedding providers.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Errors that can occur while computing an embedding.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The provider answered, but with an error or an unusable payload.
    #[error("Backend error: {0}")]
    Backend(String),

    /// HTTP/network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller cancelled the request.
    #[error("Embedding cancelled")]
    Cancelled,

    /// The request did not finish before its deadline.
    #[error("Embedding timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for EmbedError {
    fn from(e: reqwest::Error) -> Self {
        EmbedError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for EmbedError {
    fn from(e: serde_json::Error) -> Self {
        EmbedError::Serialization(e.to_string())
    }
}
