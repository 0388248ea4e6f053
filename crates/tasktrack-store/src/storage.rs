//! On-disk task storage.
//!
//! Each task lives in exactly one of two places:
//! - `<base>/<id>.yaml` while active
//! - `<base>/done/<id>.yaml` once done
//!
//! The location is the only record of a task's status. All path handling
//! goes through [`TaskStorage`]; nothing else builds task paths.

use std::collections::HashSet;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{Result, StoreError};
use crate::locks::KeyedLocks;
use crate::record::{StoredTask, TaskRecord};

/// Name of the subdirectory holding done tasks.
pub const DONE_DIR: &str = "done";

/// Reject ids that are empty or could address a file outside the store.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(StoreError::Validation("empty task id".to_string()));
    }
    if id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(StoreError::Validation(format!("invalid task id {:?}", id)));
    }
    Ok(())
}

/// Handle on a task directory.
///
/// Mutations share `scan` and then take the per-id lock; [`TaskStorage::list_all`]
/// holds `scan` exclusively so it sees no relocation halfway through.
#[derive(Debug)]
pub struct TaskStorage {
    base_dir: PathBuf,
    done_dir: PathBuf,
    scan: RwLock<()>,
    locks: KeyedLocks,
}

impl TaskStorage {
    /// Open a store rooted at `base_dir`, creating it and its `done`
    /// subdirectory if needed.
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        let done_dir = base_dir.join(DONE_DIR);

        tokio::fs::create_dir_all(&done_dir)
            .await
            .map_err(|e| StoreError::io(&done_dir, e))?;

        debug!(base_dir = %base_dir.display(), "Opened task storage");

        Ok(Self {
            base_dir,
            done_dir,
            scan: RwLock::new(()),
            locks: KeyedLocks::new(),
        })
    }

    /// Root directory of the store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Where the record for `id` lives given its status.
    pub fn path_for(&self, id: &str, done: bool) -> PathBuf {
        let dir = if done { &self.done_dir } else { &self.base_dir };
        dir.join(codec::file_name(id))
    }

    /// Persist `record` at the location implied by `done`.
    ///
    /// Any copy at the other location is removed afterwards. If that removal
    /// fails the new file is still in place and a
    /// [`StoreError::StaleCopy`] is returned.
    pub async fn write(&self, record: &TaskRecord, done: bool) -> Result<()> {
        let id = record.id.as_str();
        validate_id(id)?;

        let _scan = self.scan.read().await;
        let _guard = self.locks.acquire(id).await;

        let target = self.path_for(id, done);
        let stale = self.path_for(id, !done);

        let content = codec::encode(record)?;
        write_atomic(&target, &content).await?;

        match tokio::fs::remove_file(&stale).await {
            Ok(()) => {
                info!(id, done, "Moved task to new status location");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!(id, done, path = %target.display(), "Wrote task");
                Ok(())
            }
            Err(e) => {
                warn!(
                    id,
                    path = %stale.display(),
                    error = %e,
                    "Task written but stale copy could not be removed"
                );
                Err(StoreError::StaleCopy {
                    id: id.to_string(),
                    path: stale,
                    source: e,
                })
            }
        }
    }

    /// Load the record for `id`, checking the active location first.
    pub async fn read(&self, id: &str) -> Result<StoredTask> {
        validate_id(id)?;

        let _guard = self.locks.acquire(id).await;

        for done in [false, true] {
            let path = self.path_for(id, done);
            match self.load(&path, id, done).await {
                Err(StoreError::Io { source, .. }) if source.kind() == IoErrorKind::NotFound => {
                    continue;
                }
                other => return other,
            }
        }

        Err(StoreError::NotFound(id.to_string()))
    }

    /// Remove `id` from both locations. Missing files are not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        validate_id(id)?;

        let _scan = self.scan.read().await;
        let _guard = self.locks.acquire(id).await;

        let mut removed = 0;
        for done in [false, true] {
            let path = self.path_for(id, done);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }

        debug!(id, removed, "Deleted task");
        Ok(())
    }

    /// Load every record, active ones first.
    ///
    /// The result is a snapshot: writes and deletes through this handle wait
    /// until the walk is done. Within each location entries are ordered by
    /// file name. A task found in both locations is reported once, with the
    /// active copy, matching what [`TaskStorage::read`] returns.
    pub async fn list_all(&self) -> Result<Vec<StoredTask>> {
        let _snapshot = self.scan.write().await;

        let mut tasks = Vec::new();
        let mut seen = HashSet::new();

        for (dir, done) in [(&self.base_dir, false), (&self.done_dir, true)] {
            for (id, path) in record_files(dir).await? {
                if seen.contains(&id) {
                    warn!(
                        id = %id,
                        path = %path.display(),
                        "Task exists in both locations, ignoring done copy"
                    );
                    continue;
                }

                match self.load(&path, &id, done).await {
                    Ok(task) => {
                        seen.insert(id);
                        tasks.push(task);
                    }
                    Err(StoreError::Io { source, .. })
                        if source.kind() == IoErrorKind::NotFound =>
                    {
                        debug!(id = %id, "Task file removed outside this store while listing");
                    }
                    Err(e) => return Err(e.context("load task", id)),
                }
            }
        }

        debug!(count = tasks.len(), "Listed tasks");
        Ok(tasks)
    }

    async fn load(&self, path: &Path, id: &str, done: bool) -> Result<StoredTask> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::io(path, e))?;

        let record = codec::decode(&content, path)?;
        if record.id != id {
            return Err(StoreError::Validation(format!(
                "{} holds task id {:?}",
                path.display(),
                record.id
            )));
        }

        Ok(StoredTask { record, done })
    }
}

/// Record files directly inside `dir`, sorted by file name.
async fn record_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            warn!(dir = %dir.display(), "Task directory missing, treating as empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| StoreError::io(entry.path(), e))?;
        if file_type.is_dir() {
            continue;
        }

        let name = entry.file_name();
        match name.to_str().and_then(codec::id_from_file_name) {
            Some(id) => files.push((id.to_string(), entry.path())),
            None => debug!(path = %entry.path().display(), "Skipping non-task file"),
        }
    }

    files.sort();
    Ok(files)
}

/// Write `content` to a temporary sibling of `path` and rename it into place.
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::Validation(format!("bad task path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, e));
    }

    Ok(())
}
