//! The task tracker contract and its file-backed implementation.
//!
//! This is the only surface the orchestration layer talks to: upsert, fetch,
//! delete, enumerate and search tasks. Every operation takes a
//! [`CancellationToken`]; the embedding call races against it.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tasktrack_embed::{EmbedError, SharedEmbedder, embed_cancellable};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, ResultExt, StoreError};
use crate::ranking::{self, RankParams};
use crate::record::{SearchResult, Task, TaskRecord};
use crate::storage::{TaskStorage, validate_id};

/// Task store operations exposed to callers.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Create or update the task stored under `id`.
    ///
    /// `task.id` is ignored; `id` is authoritative.
    async fn set(&self, id: &str, task: Task, cancel: &CancellationToken) -> Result<()>;

    /// Fetch a task.
    async fn get(&self, id: &str, cancel: &CancellationToken) -> Result<Task>;

    /// Delete a task. Deleting a missing task succeeds.
    async fn del(&self, id: &str, cancel: &CancellationToken) -> Result<()>;

    /// Enumerate tasks: `Some(true)` only done, `Some(false)` only active,
    /// `None` all.
    async fn list(&self, done: Option<bool>, cancel: &CancellationToken) -> Result<Vec<Task>>;

    /// Rank all tasks against a natural-language query.
    async fn search(&self, query: &str, cancel: &CancellationToken) -> Result<Vec<SearchResult>>;
}

/// Thread-safe shared tracker.
pub type SharedTracker = Arc<dyn Tracker>;

/// Tuning for [`FileTracker`].
#[derive(Debug, Clone, Default)]
pub struct TrackerConfig {
    /// Search filtering and truncation.
    pub rank: RankParams,
    /// Deadline for a single embedding call.
    pub embed_timeout: Option<Duration>,
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rank(mut self, rank: RankParams) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = Some(timeout);
        self
    }
}

/// Tracker storing one YAML file per task under a directory.
pub struct FileTracker {
    storage: TaskStorage,
    embedder: SharedEmbedder,
    config: TrackerConfig,
}

impl FileTracker {
    /// Open (creating if needed) the task directory at `dir`.
    pub async fn open(
        dir: impl Into<PathBuf>,
        embedder: SharedEmbedder,
        config: TrackerConfig,
    ) -> Result<Self> {
        let storage = TaskStorage::open(dir).await?;
        Ok(Self::with_storage(storage, embedder, config))
    }

    /// Build a tracker over an already opened storage handle.
    pub fn with_storage(
        storage: TaskStorage,
        embedder: SharedEmbedder,
        config: TrackerConfig,
    ) -> Self {
        Self {
            storage,
            embedder,
            config,
        }
    }

    /// The underlying storage.
    pub fn storage(&self) -> &TaskStorage {
        &self.storage
    }

    /// The active configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Search with explicit ranking parameters instead of the configured ones.
    pub async fn search_with(
        &self,
        query: &str,
        params: RankParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let vector = self.embed(query, cancel).await?;
        let corpus = self.storage.list_all().await?;
        let results = ranking::rank(&vector, &corpus, params)?;

        debug!(
            corpus = corpus.len(),
            results = results.len(),
            "Ranked search results"
        );
        Ok(results)
    }

    async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f32>> {
        let vector = embed_cancellable(
            self.embedder.as_ref(),
            text,
            cancel,
            self.config.embed_timeout,
        )
        .await?;
        Ok(vector)
    }
}

/// Fail early if the caller has already given up.
fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(StoreError::Provider(EmbedError::Cancelled));
    }
    Ok(())
}

fn validate_task(task: &Task) -> Result<()> {
    if task.title.is_empty() {
        return Err(StoreError::Validation("empty task title".to_string()));
    }
    if task.description.is_empty() {
        return Err(StoreError::Validation("empty task description".to_string()));
    }
    Ok(())
}

#[async_trait]
impl Tracker for FileTracker {
    async fn set(&self, id: &str, task: Task, cancel: &CancellationToken) -> Result<()> {
        async {
            validate_id(id)?;
            validate_task(&task)?;

            let task = Task {
                id: id.to_string(),
                ..task
            };
            let embedding = self.embed(&task.embedding_text(), cancel).await?;
            let record = TaskRecord::from_task(&task, embedding);

            self.storage.write(&record, task.done).await
        }
        .await
        .op_context("set task", id)
    }

    async fn get(&self, id: &str, cancel: &CancellationToken) -> Result<Task> {
        async {
            ensure_active(cancel)?;
            let stored = self.storage.read(id).await?;
            Ok::<_, StoreError>(Task::from(stored))
        }
        .await
        .op_context("get task", id)
    }

    async fn del(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        async {
            ensure_active(cancel)?;
            self.storage.delete(id).await
        }
        .await
        .op_context("delete task", id)
    }

    async fn list(&self, done: Option<bool>, cancel: &CancellationToken) -> Result<Vec<Task>> {
        let scope = match done {
            Some(true) => "done",
            Some(false) => "active",
            None => "all",
        };
        ensure_active(cancel).op_context("list tasks", scope)?;

        let tasks = self
            .storage
            .list_all()
            .await
            .op_context("list tasks", scope)?;

        Ok(tasks
            .into_iter()
            .filter(|stored| done.is_none_or(|d| stored.done == d))
            .map(Task::from)
            .collect())
    }

    async fn search(&self, query: &str, cancel: &CancellationToken) -> Result<Vec<SearchResult>> {
        self.search_with(query, self.config.rank, cancel)
            .await
            .map_err(|e| e.context("search tasks", query))
    }
}
