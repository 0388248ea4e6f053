//! tasktrack-embed: embedding providers
//!
//! This crate provides the text-to-vector seam used by the task store:
//! - The `Embedder` trait and cancellation/timeout helpers
//! - An Ollama HTTP backend with retry on transient failures
//! - A deterministic mock embedder for tests and offline use

pub mod error;
pub mod mock;
pub mod ollama;
pub mod provider;

pub use error::{EmbedError, Result};
pub use mock::MockEmbedder;
pub use ollama::{OllamaConfig, OllamaEmbedder};
pub use provider::{Embedder, SharedEmbedder, embed_cancellable, is_retryable, with_retry};
pub use tokio_util::sync::CancellationToken;
