use serde::Serialize;
use shelf_types::Oid;

/// An index entry whose record file is gone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DanglingEntry {
    pub type_key: String,
    pub oid: Oid,
}

/// A stored document that could not be read as what its path says it is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnreadableRecord {
    pub path: String,
    pub reason: String,
}

/// Findings of [`PersistenceEngine::check`](crate::PersistenceEngine::check).
///
/// Orphans are object records no instance index lists, the usual trace of
/// an insert that failed between writing the record and indexing it.
/// Dangling entries are the reverse: indexed identifiers with no record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Object records listed in no instance index.
    pub orphaned: Vec<Oid>,
    /// Index entries with no backing record.
    pub dangling: Vec<DanglingEntry>,
    /// Records, indexes or counters that failed to parse.
    pub unreadable: Vec<UnreadableRecord>,
    /// Number of record files examined.
    pub records_checked: usize,
    /// Number of instance indexes examined.
    pub indexes_checked: usize,
}

impl Reconciliation {
    /// Returns `true` if nothing was found.
    pub fn is_clean(&self) -> bool {
        self.finding_count() == 0
    }

    /// Total number of findings.
    pub fn finding_count(&self) -> usize {
        self.orphaned.len() + self.dangling.len() + self.unreadable.len()
    }
}
