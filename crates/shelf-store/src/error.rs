use std::path::PathBuf;

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A path segment is empty or would escape the store root.
    #[error("invalid storage path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file on disk is not valid UTF-8 text.
    #[error("record at {0} is not valid UTF-8")]
    NotText(PathBuf),

    /// The store root does not exist or is not a directory.
    #[error("store root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
