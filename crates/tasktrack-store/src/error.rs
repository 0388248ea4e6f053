//! Error types for the task store.

use std::path::PathBuf;

use tasktrack_embed::EmbedError;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Coarse classification of a [`StoreError`].
///
/// Lets callers tell lookup misses and bad input apart from infrastructure
/// failures without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The task does not exist.
    NotFound,
    /// Bad input or corrupt stored data.
    Validation,
    /// Filesystem failure.
    Io,
    /// The embedding provider failed, was cancelled or timed out.
    Provider,
    /// The write succeeded but a stale copy was left at the old location.
    Inconsistent,
}

/// Error type for task store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("vector dimension mismatch for task {id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("I/O error at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to encode task {id}")]
    Encode {
        id: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Provider(#[from] EmbedError),

    #[error("task {id} written but stale copy remains at {}", .path.display())]
    StaleCopy {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} {id:?}")]
    Context {
        op: &'static str,
        id: String,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap this error with the operation and task id it occurred in.
    pub fn context(self, op: &'static str, id: impl Into<String>) -> Self {
        StoreError::Context {
            op,
            id: id.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error, looking through any context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Validation(_)
            | StoreError::DimensionMismatch { .. }
            | StoreError::Decode { .. }
            | StoreError::Encode { .. } => ErrorKind::Validation,
            StoreError::Io { .. } => ErrorKind::Io,
            StoreError::Provider(_) => ErrorKind::Provider,
            StoreError::StaleCopy { .. } => ErrorKind::Inconsistent,
            StoreError::Context { source, .. } => source.kind(),
        }
    }

    /// True for lookup misses.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The innermost error, with context wrappers stripped.
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension for attaching operation context to store results.
pub trait ResultExt<T> {
    /// Wrap the error, if any, with `op` and `id`.
    fn op_context(self, op: &'static str, id: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn op_context(self, op: &'static str, id: &str) -> Result<T> {
        self.map_err(|e| e.context(op, id))
    }
}
