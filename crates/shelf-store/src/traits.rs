use crate::error::StoreResult;
use crate::path::StoragePath;

/// Whole-document storage for record text.
///
/// All implementations must satisfy these invariants:
/// - `write` replaces the entire document; a concurrent reader sees either
///   the old or the new text, never a mix.
/// - `read` of an absent path returns `Ok(None)`.
/// - No locking is performed across calls. Read-modify-write sequences
///   built on top of this trait assume a single writer per path.
/// - All I/O errors are propagated, never silently ignored.
pub trait RecordStore: Send + Sync {
    /// Read the document at `path`.
    ///
    /// Returns `Ok(None)` if no document exists.
    fn read(&self, path: &StoragePath) -> StoreResult<Option<String>>;

    /// Create or replace the document at `path`.
    fn write(&self, path: &StoragePath, text: &str) -> StoreResult<()>;

    /// Delete the document at `path`. Returns `true` if it existed.
    fn delete(&self, path: &StoragePath) -> StoreResult<bool>;

    /// Check whether a document exists at `path`.
    fn exists(&self, path: &StoragePath) -> StoreResult<bool>;

    /// Every stored path, sorted.
    fn list(&self) -> StoreResult<Vec<StoragePath>>;
}
