//! Store-wide identifier counter.
//!
//! The counter is a one-element record at [`StoragePath::counter`]:
//!
//! ```text
//! <number>1A</number>
//! ```
//!
//! [`OidAllocator::next_id`] reads it, adds one and writes it back. The
//! sequence is not atomic: two processes allocating at once can be handed
//! the same number. Callers must keep to a single writer.

use std::sync::Arc;

use shelf_record::{MarkupEvent, MarkupReader, MarkupWriter, TextEscaper};
use shelf_store::{RecordStore, StoragePath};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

const NUMBER_TAG: &str = "number";

/// Allocates increasing numeric identifiers.
#[derive(Clone)]
pub struct OidAllocator {
    store: Arc<dyn RecordStore>,
    escaper: Arc<dyn TextEscaper>,
}

impl std::fmt::Debug for OidAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidAllocator").finish_non_exhaustive()
    }
}

impl OidAllocator {
    pub fn new(store: Arc<dyn RecordStore>, escaper: Arc<dyn TextEscaper>) -> Self {
        Self { store, escaper }
    }

    /// The last value handed out, or 0 if none has been.
    pub fn current(&self) -> EngineResult<u64> {
        match self.store.read(&StoragePath::counter())? {
            Some(text) => self.parse(&text),
            None => Ok(0),
        }
    }

    /// Advance the counter and return the new value. The first call on a
    /// fresh store returns 1.
    pub fn next_id(&self) -> EngineResult<u64> {
        let next = self
            .current()?
            .checked_add(1)
            .ok_or_else(|| EngineError::Malformed("identifier counter exhausted".into()))?;

        let mut writer = MarkupWriter::new(self.escaper.as_ref());
        writer.text_element(NUMBER_TAG, &[], &format!("{next:X}"));
        self.store.write(&StoragePath::counter(), &writer.finish())?;

        debug!(id = next, "identifier allocated");
        Ok(next)
    }

    fn parse(&self, text: &str) -> EngineResult<u64> {
        let mut body = String::new();
        let mut root_seen = false;
        for event in MarkupReader::new(text, self.escaper.as_ref()) {
            match event? {
                MarkupEvent::Start { name, .. } if !root_seen && name == NUMBER_TAG => {
                    root_seen = true;
                }
                MarkupEvent::Start { name, .. } => {
                    return Err(EngineError::Malformed(format!(
                        "unexpected <{name}> in identifier counter"
                    )));
                }
                MarkupEvent::Text(chunk) => body.push_str(&chunk),
                MarkupEvent::End { .. } => {}
            }
        }
        if !root_seen {
            return Err(EngineError::Malformed("identifier counter has no <number>".into()));
        }
        let digits = body.trim();
        u64::from_str_radix(digits, 16).map_err(|e| {
            EngineError::Malformed(format!("identifier counter {digits:?}: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_record::XmlEscaper;
    use shelf_store::InMemoryRecordStore;

    fn make_allocator() -> (Arc<InMemoryRecordStore>, OidAllocator) {
        let store = Arc::new(InMemoryRecordStore::new());
        let allocator = OidAllocator::new(store.clone(), Arc::new(XmlEscaper));
        (store, allocator)
    }

    #[test]
    fn fresh_store_counts_from_one() {
        let (_, allocator) = make_allocator();
        assert_eq!(allocator.current().unwrap(), 0);
        let ids: Vec<u64> = (0..3).map(|_| allocator.next_id().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(allocator.current().unwrap(), 3);
    }

    #[test]
    fn counter_is_written_as_hex() {
        let (store, allocator) = make_allocator();
        store
            .write(&StoragePath::counter(), "<number>1F</number>")
            .unwrap();
        assert_eq!(allocator.next_id().unwrap(), 0x20);
        let text = store.read(&StoragePath::counter()).unwrap().unwrap();
        assert!(text.contains("<number>20</number>"));
    }

    #[test]
    fn accepts_surrounding_whitespace() {
        let (store, allocator) = make_allocator();
        store
            .write(&StoragePath::counter(), "<number>\n  a\n</number>\n")
            .unwrap();
        assert_eq!(allocator.current().unwrap(), 10);
    }

    #[test]
    fn rejects_garbage_counter() {
        let (store, allocator) = make_allocator();
        for text in ["<number>xyz</number>", "<number></number>", "<count>1</count>", ""] {
            store.write(&StoragePath::counter(), text).unwrap();
            let err = allocator.next_id().unwrap_err();
            assert!(matches!(err, EngineError::Malformed(_)), "{text:?}: {err}");
        }
    }

    #[test]
    fn exhausted_counter_is_an_error() {
        let (store, allocator) = make_allocator();
        store
            .write(&StoragePath::counter(), "<number>FFFFFFFFFFFFFFFF</number>")
            .unwrap();
        assert!(allocator.next_id().is_err());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Arc::new(shelf_store::DirectoryRecordStore::open(dir.path()).unwrap());
            let allocator = OidAllocator::new(store, Arc::new(XmlEscaper));
            allocator.next_id().unwrap();
            allocator.next_id().unwrap();
        }
        let store = Arc::new(shelf_store::DirectoryRecordStore::open(dir.path()).unwrap());
        let allocator = OidAllocator::new(store, Arc::new(XmlEscaper));
        assert_eq!(allocator.next_id().unwrap(), 3);
        assert!(dir.path().join("oid.xml").is_file());
    }
}
