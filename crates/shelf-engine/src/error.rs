use shelf_record::CodecError;
use shelf_types::{Oid, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no record for {0}")]
    NotFound(Oid),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("integrity fault at {oid}: {reason}")]
    Integrity { oid: Oid, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] shelf_store::StoreError),

    #[error("index error: {0}")]
    Index(#[from] shelf_index::IndexError),
}

impl From<CodecError> for EngineError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::TransientReference { .. } => EngineError::InvalidArgument(err.to_string()),
            other => EngineError::Malformed(other.to_string()),
        }
    }
}

impl From<TypeError> for EngineError {
    fn from(err: TypeError) -> Self {
        EngineError::InvalidArgument(err.to_string())
    }
}

impl EngineError {
    /// Returns `true` for [`EngineError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
