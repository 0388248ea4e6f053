//! Embedder trait and shared request plumbing.
//!
//! This module defines the seam between the task store and whatever turns
//! text into vectors (a local Ollama server, a remote API, or a test double).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{EmbedError, Result};

/// Converts text into a fixed-length vector.
///
/// Implementations may block on network I/O. All vectors produced by one
/// embedder for one model must share the same dimensionality.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the provider name (for logging).
    fn name(&self) -> &str;

    /// Check that the provider is reachable.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Thread-safe shared embedder.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures). Non-retryable errors
/// are returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    provider_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !is_retryable(&e) || attempt >= max_retries => return Err(e),
            Err(e) => {
                attempt += 1;
                tracing::warn!(
                    provider = provider_name,
                    attempt,
                    max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Embedding request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

/// Check if an error is retryable.
///
/// Only network errors are considered retryable.
pub fn is_retryable(error: &EmbedError) -> bool {
    matches!(error, EmbedError::Network(_))
}

/// Embed `text`, giving up when `cancel` fires or `timeout` elapses.
pub async fn embed_cancellable(
    embedder: &dyn Embedder,
    text: &str,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<Vec<f32>> {
    let call = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, embedder.embed(text)).await {
                Ok(result) => result,
                Err(_) => Err(EmbedError::Timeout(limit)),
            },
            None => embedder.embed(text).await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(provider = embedder.name(), "Embedding cancelled by caller");
            Err(EmbedError::Cancelled)
        }
        result = call => result,
    }
}
