use shelf_types::Oid;

/// Errors from encoding or decoding record markup.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not well-formed markup.
    #[error("markup error at byte {offset}: {reason}")]
    Markup { offset: usize, reason: String },

    /// Well-formed markup that does not describe a valid record.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// A reference to an identifier with no backing record.
    #[error("field {field:?} references transient identifier {oid}")]
    TransientReference { field: String, oid: Oid },
}

impl CodecError {
    /// Returns `true` for structural problems in stored text, as opposed
    /// to a caller handing in an unencodable record.
    pub fn is_malformed(&self) -> bool {
        matches!(self, CodecError::Markup { .. } | CodecError::Malformed(_))
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
