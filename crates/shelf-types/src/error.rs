use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid oid {text:?}: {reason}")]
    InvalidOid { text: String, reason: String },

    #[error("invalid version sequence: {0:?}")]
    InvalidSequence(String),

    #[error("invalid type definition {key}: {reason}")]
    InvalidType { key: String, reason: String },
}
