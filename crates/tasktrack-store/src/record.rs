//! Task data model.

use serde::{Deserialize, Serialize};

/// A work item as seen by callers of the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub done: bool,
}

impl Task {
    /// Create a new, not yet done, task.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            done: false,
        }
    }

    /// Set the done flag.
    pub fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    /// Text handed to the embedder for this task.
    pub fn embedding_text(&self) -> String {
        format!("# {}\n\n{}", self.title, self.description)
    }
}

/// The persisted form of a task.
///
/// Deliberately has no `done` field: status is encoded by which directory
/// holds the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "vector", default)]
    pub embedding: Vec<f32>,
}

impl TaskRecord {
    /// Build a record from a task and its embedding.
    pub fn from_task(task: &Task, embedding: Vec<f32>) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            embedding,
        }
    }
}

/// A record together with the status derived from its location.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTask {
    pub record: TaskRecord,
    pub done: bool,
}

impl StoredTask {
    /// Project to the caller-facing task.
    pub fn to_task(&self) -> Task {
        Task {
            id: self.record.id.clone(),
            title: self.record.title.clone(),
            description: self.record.description.clone(),
            done: self.done,
        }
    }
}

impl From<StoredTask> for Task {
    fn from(stored: StoredTask) -> Self {
        Task {
            id: stored.record.id,
            title: stored.record.title,
            description: stored.record.description,
            done: stored.done,
        }
    }
}

/// A task matched by a search, with its corpus-relative score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub task: Task,
    pub score: f32,
}
