//! YAML encoding of task records.
//!
//! One file per task, holding `id`, `title`, `description` and `vector`.
//! The done status never appears in the payload.

use std::path::Path;

use crate::error::{Result, StoreError};
use crate::record::TaskRecord;

/// File extension for task records.
pub const EXTENSION: &str = "yaml";

/// File name for the record with the given id.
pub fn file_name(id: &str) -> String {
    format!("{}.{}", id, EXTENSION)
}

/// Task id encoded in a record file name, if the name is a record file.
pub fn id_from_file_name(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    (ext == EXTENSION && !stem.is_empty()).then_some(stem)
}

/// Serialize a record.
pub fn encode(record: &TaskRecord) -> Result<String> {
    serde_yaml::to_string(record).map_err(|source| StoreError::Encode {
        id: record.id.clone(),
        source,
    })
}

/// Deserialize and validate a record read from `path`.
///
/// Empty titles or descriptions are reported together as a single
/// validation error.
pub fn decode(content: &str, path: &Path) -> Result<TaskRecord> {
    let record: TaskRecord =
        serde_yaml::from_str(content).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let mut problems = Vec::new();
    if record.title.is_empty() {
        problems.push("empty task title");
    }
    if record.description.is_empty() {
        problems.push("empty task description");
    }
    if !problems.is_empty() {
        return Err(StoreError::Validation(format!(
            "{}: {}",
            path.display(),
            problems.join(", ")
        )));
    }

    Ok(record)
}
