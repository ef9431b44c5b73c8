use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::StoreResult;
use crate::path::StoragePath;
use crate::traits::RecordStore;

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. All documents are held in memory behind
/// a `RwLock`. Documents are cloned on read/write.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<StoragePath, String>>,
}

impl InMemoryRecordStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn read(&self, path: &StoragePath) -> StoreResult<Option<String>> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.get(path).cloned())
    }

    fn write(&self, path: &StoragePath, text: &str) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        map.insert(path.clone(), text.to_string());
        debug!(%path, len = text.len(), "record written");
        Ok(())
    }

    fn delete(&self, path: &StoragePath) -> StoreResult<bool> {
        let mut map = self.records.write().expect("lock poisoned");
        Ok(map.remove(path).is_some())
    }

    fn exists(&self, path: &StoragePath) -> StoreResult<bool> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.contains_key(path))
    }

    fn list(&self) -> StoreResult<Vec<StoragePath>> {
        let map = self.records.read().expect("lock poisoned");
        let mut paths: Vec<StoragePath> = map.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &count)
            .finish()
    }
}
