//! Deterministic embedder for tests and offline use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{EmbedError, Result};
use crate::provider::Embedder;

/// Embedder that never touches the network.
///
/// Texts registered with [`MockEmbedder::with_vector`] map to exactly that
/// vector. Everything else is embedded as a hashed bag of lowercase words,
/// so texts sharing words land close to each other. Word slots come from
/// FNV-1a, so vectors stored by one build match queries from another.
#[derive(Debug)]
pub struct MockEmbedder {
    dimensions: usize,
    fixed: RwLock<HashMap<String, Vec<f32>>>,
    failure: RwLock<Option<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    captured: RwLock<Vec<String>>,
}

impl MockEmbedder {
    /// Create a mock producing vectors of `dimensions` components.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fixed: RwLock::new(HashMap::new()),
            failure: RwLock::new(None),
            delay: None,
            calls: AtomicUsize::new(0),
            captured: RwLock::new(Vec::new()),
        }
    }

    /// Return `vector` whenever exactly `text` is embedded.
    pub fn with_vector(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.set_vector(text, vector);
        self
    }

    /// Sleep before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every request with a backend error.
    pub fn failing(self, message: impl Into<String>) -> Self {
        self.set_failure(Some(message.into()));
        self
    }

    /// Register a fixed vector after construction.
    pub fn set_vector(&self, text: impl Into<String>, vector: Vec<f32>) {
        if let Ok(mut fixed) = self.fixed.write() {
            fixed.insert(text.into(), vector);
        }
    }

    /// Toggle injected failure.
    pub fn set_failure(&self, message: Option<String>) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = message;
        }
    }

    /// Number of `embed` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts received, in call order.
    pub fn captured_texts(&self) -> Vec<String> {
        self.captured
            .read()
            .map(|texts| texts.clone())
            .unwrap_or_default()
    }

    fn bag_of_words(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let slot = (fnv1a(word.to_lowercase().as_bytes()) % self.dimensions as u64) as usize;
            vector[slot] += 1.0;
        }

        vector
    }
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut captured) = self.captured.write() {
            captured.push(text.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failure
            .read()
            .map_err(|e| EmbedError::Backend(format!("Failed to acquire read lock: {}", e)))?
            .clone();
        if let Some(message) = failure {
            return Err(EmbedError::Backend(message));
        }

        let fixed = self
            .fixed
            .read()
            .map_err(|e| EmbedError::Backend(format!("Failed to acquire read lock: {}", e)))?
            .get(text)
            .cloned();

        Ok(fixed.unwrap_or_else(|| self.bag_of_words(text)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
