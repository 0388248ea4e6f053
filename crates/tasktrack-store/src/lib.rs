//! tasktrack-store: task persistence and semantic search
//!
//! This crate provides the core task store:
//! - One YAML file per task, with status encoded by directory
//! - Active/done relocation guarded by per-task locks
//! - Exhaustive embedding-distance ranking for natural-language search
//! - The `Tracker` contract consumed by orchestration code

pub mod codec;
pub mod error;
pub mod locks;
pub mod ranking;
pub mod record;
pub mod storage;
pub mod tracker;

pub use error::{ErrorKind, Result, ResultExt, StoreError};
pub use locks::KeyedLocks;
pub use ranking::{DEFAULT_LIMIT, DEFAULT_THRESHOLD, RankParams, euclidean_distance, rank};
pub use record::{SearchResult, StoredTask, Task, TaskRecord};
pub use storage::{DONE_DIR, TaskStorage, validate_id};
pub use tracker::{FileTracker, SharedTracker, Tracker, TrackerConfig};
