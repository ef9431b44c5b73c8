use std::collections::HashSet;
use std::sync::Arc;

use shelf_index::InstanceIndex;
use shelf_record::{ObjectRecord, Record, RecordCodec, XmlEscaper};
use shelf_store::{DirectoryRecordStore, RecordStore, StoragePath};
use shelf_types::{
    Oid, OidCodec, StaticTypeSystem, TextOidCodec, TypeSystem, Version, COUNTER_RECORD,
};
use tracing::{debug, warn};

use crate::allocator::OidAllocator;
use crate::config::EngineConfig;
use crate::context::{FixedUser, UserProvider};
use crate::error::{EngineError, EngineResult};
use crate::pattern::matches_pattern;
use crate::reconcile::{DanglingEntry, Reconciliation, UnreadableRecord};

/// File-backed object persistence.
///
/// Each object or collection is one record at `<type-tag>/<local-id>`; each
/// concrete type has an instance index listing its members. Nothing is
/// cached: every call reads what it needs from the store. Nothing is locked
/// either, so callers must serialize writers.
pub struct PersistenceEngine {
    store: Arc<dyn RecordStore>,
    types: Arc<dyn TypeSystem>,
    users: Arc<dyn UserProvider>,
    codec: RecordCodec,
    index: InstanceIndex,
    allocator: OidAllocator,
}

impl std::fmt::Debug for PersistenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceEngine")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl PersistenceEngine {
    /// Assemble an engine from its collaborators. Markup bodies use
    /// standard XML escaping.
    pub fn new(
        store: Arc<dyn RecordStore>,
        types: Arc<dyn TypeSystem>,
        users: Arc<dyn UserProvider>,
        oids: Arc<dyn OidCodec>,
    ) -> Self {
        let escaper = Arc::new(XmlEscaper);
        let codec = RecordCodec::new(oids, escaper.clone());
        Self {
            index: InstanceIndex::new(store.clone(), codec.clone()),
            allocator: OidAllocator::new(store.clone(), escaper),
            store,
            types,
            users,
            codec,
        }
    }

    /// Open a directory-backed engine described by `config`.
    pub fn open(config: &EngineConfig) -> EngineResult<Self> {
        let store = DirectoryRecordStore::open(&config.root)?;
        let types = StaticTypeSystem::from_descriptors(config.types.clone())
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(Self::new(
            Arc::new(store),
            Arc::new(types),
            Arc::new(FixedUser::new(config.user.clone())),
            Arc::new(TextOidCodec),
        ))
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn types(&self) -> &dyn TypeSystem {
        self.types.as_ref()
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    pub fn index(&self) -> &InstanceIndex {
        &self.index
    }

    // ---- Reading ----

    /// Load the record stored under `oid`.
    ///
    /// Reference-list fields declared on the object's type but absent from
    /// the document come back as empty lists.
    pub fn load_data(&self, oid: &Oid) -> EngineResult<Record> {
        if self.codec.oid_codec().is_transient(oid) {
            return Err(EngineError::NotFound(oid.clone()));
        }
        let path = StoragePath::record(oid);
        let text = self
            .store
            .read(&path)?
            .ok_or_else(|| EngineError::NotFound(oid.clone()))?;

        let mut record = self.codec.decode(&text, None)?;
        if record.oid() != oid {
            return Err(EngineError::Malformed(format!(
                "record at {path} is labelled {}",
                record.oid()
            )));
        }
        if let Record::Object(object) = &mut record {
            if let Some(type_key) = self.types.type_key_for_tag(oid.type_tag()) {
                object.declare_reference_lists(&self.types.reference_list_fields(&type_key));
            }
        }
        debug!(%oid, version = %record.version(), "record loaded");
        Ok(record)
    }

    /// Every persisted object matching `pattern`.
    ///
    /// The pattern's identifier tag names the queried type; instances of all
    /// its subtypes are considered. An indexed identifier with no record is
    /// an integrity fault.
    pub fn get_instances(&self, pattern: &ObjectRecord) -> EngineResult<Vec<ObjectRecord>> {
        let type_key = self.type_key(&pattern.oid)?;
        let mut matches = Vec::new();
        for oid in self.index.load_transitive(&type_key, self.types.as_ref())? {
            let candidate = match self.load_data(&oid) {
                Ok(Record::Object(object)) => object,
                Ok(Record::Collection(_)) => {
                    return Err(EngineError::Integrity {
                        oid,
                        reason: format!("indexed under {type_key} but holds a collection"),
                    });
                }
                Err(EngineError::NotFound(oid)) => {
                    return Err(EngineError::Integrity {
                        oid,
                        reason: format!("indexed under {type_key} but has no record"),
                    });
                }
                Err(e) => return Err(e),
            };
            if matches_pattern(&candidate, pattern, self.types.as_ref()) {
                matches.push(candidate);
            }
        }
        debug!(%type_key, matched = matches.len(), "instances queried");
        Ok(matches)
    }

    /// Number of objects [`get_instances`](Self::get_instances) would return.
    pub fn number_of_instances(&self, pattern: &ObjectRecord) -> EngineResult<usize> {
        Ok(self.get_instances(pattern)?.len())
    }

    /// Identifiers of every instance of `type_key` and its subtypes, without
    /// loading the records.
    pub fn instances_of(&self, type_key: &str) -> EngineResult<Vec<Oid>> {
        Ok(self.index.load_transitive(type_key, self.types.as_ref())?)
    }

    /// Whether `type_key` or any subtype has a persisted instance.
    pub fn has_instances(&self, type_key: &str) -> EngineResult<bool> {
        Ok(!self.instances_of(type_key)?.is_empty())
    }

    // ---- Writing ----

    /// Persist a new object and list it in its type's instance index.
    ///
    /// The record is written before it is indexed. A failure in between
    /// leaves an unindexed record, which [`check`](Self::check) reports as
    /// an orphan; it never leaves an index entry without a record.
    pub fn insert_object(&self, record: &ObjectRecord) -> EngineResult<Version> {
        if self.codec.oid_codec().is_transient(&record.oid) {
            return Err(EngineError::InvalidArgument(format!(
                "cannot insert under transient identifier {}",
                record.oid
            )));
        }
        let type_key = self.type_key(&record.oid)?;
        if self.types.is_abstract(&type_key) {
            return Err(EngineError::InvalidArgument(format!(
                "{type_key} is abstract and cannot have instances"
            )));
        }
        if type_key == COUNTER_RECORD || StoragePath::instances(&type_key).is_err() {
            return Err(EngineError::InvalidArgument(format!(
                "{type_key} cannot name an instance index"
            )));
        }

        let version = self.write_record(Record::Object(record.clone()))?;
        self.index.append(&type_key, &record.oid)?;
        debug!(oid = %record.oid, %type_key, "object inserted");
        Ok(version)
    }

    /// Overwrite an already persisted object or collection. Indexes are not
    /// touched.
    pub fn save(&self, record: &Record) -> EngineResult<Version> {
        if self.codec.oid_codec().is_transient(record.oid()) {
            return Err(EngineError::InvalidArgument(format!(
                "cannot save under transient identifier {}",
                record.oid()
            )));
        }
        let version = self.write_record(record.clone())?;
        debug!(oid = %record.oid(), %version, "record saved");
        Ok(version)
    }

    fn write_record(&self, mut record: Record) -> EngineResult<Version> {
        let stamped = record.version().stamped_by(self.users.current_user());
        *record.version_mut() = stamped.clone();
        let text = self.codec.encode(&record)?;
        self.store.write(&StoragePath::record(record.oid()), &text)?;
        Ok(stamped)
    }

    /// Delete an object or collection.
    ///
    /// An object is dropped from its type's index before its record is
    /// deleted, so a failure in between never leaves a dangling entry.
    pub fn remove(&self, oid: &Oid) -> EngineResult<()> {
        let record = self.load_data(oid)?;
        if let Record::Object(_) = record {
            let type_key = self.type_key(oid)?;
            if !self.index.remove(&type_key, oid)? {
                debug!(%oid, %type_key, "removed object was not indexed");
            }
        }
        self.store.delete(&StoragePath::record(oid))?;
        debug!(%oid, kind = ?record.kind(), "record removed");
        Ok(())
    }

    // ---- Identifiers ----

    /// Advance the store-wide counter.
    pub fn next_id(&self) -> EngineResult<u64> {
        self.allocator.next_id()
    }

    /// Allocate a fresh persistent identifier with the given type tag. The
    /// local part is the counter value in uppercase hex.
    pub fn create_oid(&self, type_tag: &str) -> EngineResult<Oid> {
        let id = self.allocator.next_id()?;
        Ok(Oid::persistent(type_tag, format!("{id:X}"))?)
    }

    fn type_key(&self, oid: &Oid) -> EngineResult<String> {
        self.types.type_key_for_tag(oid.type_tag()).ok_or_else(|| {
            EngineError::InvalidArgument(format!("no type registered for tag {}", oid.type_tag()))
        })
    }

    // ---- Reconciliation ----

    /// Compare record files against instance indexes without changing
    /// anything.
    pub fn check(&self) -> EngineResult<Reconciliation> {
        let mut report = Reconciliation::default();
        let mut record_paths = Vec::new();
        let mut indexed = HashSet::new();

        for path in self.store.list()? {
            if path.is_record() {
                record_paths.push(path);
            } else if path == StoragePath::counter() {
                if let Err(e) = self.allocator.current() {
                    unreadable(&mut report, &path, e);
                }
            } else {
                let type_key = path.to_string();
                report.indexes_checked += 1;
                match self.index.load(&type_key) {
                    Ok(members) => {
                        for oid in members {
                            if !self.store.exists(&StoragePath::record(&oid))? {
                                warn!(%oid, %type_key, "index entry has no record");
                                report.dangling.push(DanglingEntry {
                                    type_key: type_key.clone(),
                                    oid: oid.clone(),
                                });
                            }
                            indexed.insert(oid);
                        }
                    }
                    Err(e) => unreadable(&mut report, &path, e),
                }
            }
        }

        for path in record_paths {
            report.records_checked += 1;
            let segments = path.segments();
            let oid = match Oid::persistent(segments[0].as_str(), segments[1].as_str()) {
                Ok(oid) => oid,
                Err(e) => {
                    unreadable(&mut report, &path, e);
                    continue;
                }
            };
            match self.load_data(&oid) {
                Ok(Record::Object(_)) if !indexed.contains(&oid) => {
                    warn!(%oid, "object record is not indexed");
                    report.orphaned.push(oid);
                }
                Ok(_) => {}
                Err(e) => unreadable(&mut report, &path, e),
            }
        }

        debug!(
            records = report.records_checked,
            indexes = report.indexes_checked,
            findings = report.finding_count(),
            "store checked"
        );
        Ok(report)
    }
}

fn unreadable(report: &mut Reconciliation, path: &StoragePath, err: impl std::fmt::Display) {
    warn!(%path, error = %err, "unreadable record");
    report.unreadable.push(UnreadableRecord {
        path: path.to_string(),
        reason: err.to_string(),
    });
}
