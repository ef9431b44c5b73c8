//! Error types for the index crate.

use shelf_types::Oid;

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The index record names a different type than the one requested.
    #[error("index record for {expected} is labelled {found}")]
    NameMismatch { expected: String, found: String },

    /// Only persistent identifiers may be indexed.
    #[error("cannot index transient identifier {0}")]
    TransientMember(Oid),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] shelf_store::StoreError),

    /// The index record could not be parsed.
    #[error("codec error: {0}")]
    Codec(#[from] shelf_record::CodecError),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
