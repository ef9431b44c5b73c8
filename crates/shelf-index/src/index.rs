//! Load and rewrite per-type instance index records.
//!
//! An index record lives at the path named by its type key and looks like:
//!
//! ```text
//! <instances name="org.example.Customer">
//!   <instance oid="CUS:1"/>
//!   <instance oid="CUS:2"/>
//! </instances>
//! ```
//!
//! Every mutation is a whole-record read, modify and rewrite. Nothing here
//! locks: two writers appending to the same type at once can lose an update.

use std::sync::Arc;

use shelf_record::{CodecError, MarkupEvent, MarkupReader, MarkupWriter, RecordCodec};
use shelf_store::{RecordStore, StoragePath};
use shelf_types::{Oid, TypeSystem};
use tracing::debug;

use crate::error::{IndexError, IndexResult};

const INSTANCES_TAG: &str = "instances";
const INSTANCE_TAG: &str = "instance";
const NAME_ATTR: &str = "name";
const OID_ATTR: &str = "oid";

/// Per-type membership lists kept in a [`RecordStore`].
#[derive(Clone)]
pub struct InstanceIndex {
    store: Arc<dyn RecordStore>,
    codec: RecordCodec,
}

impl std::fmt::Debug for InstanceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceIndex")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl InstanceIndex {
    /// Create an index over `store`, reading and writing identifiers with
    /// `codec`.
    pub fn new(store: Arc<dyn RecordStore>, codec: RecordCodec) -> Self {
        Self { store, codec }
    }

    /// Members of exactly `type_key`, in insertion order.
    ///
    /// A type with no index record has no members.
    pub fn load(&self, type_key: &str) -> IndexResult<Vec<Oid>> {
        let path = StoragePath::instances(type_key)?;
        match self.store.read(&path)? {
            Some(text) => self.decode(type_key, &text),
            None => Ok(Vec::new()),
        }
    }

    /// Members of `type_key` and, recursively, of all its subclasses.
    ///
    /// The type's own members come first, then each subclass's transitive
    /// members in the order `types` lists them. Abstract types contribute
    /// nothing of their own. Duplicates are not removed.
    pub fn load_transitive(&self, type_key: &str, types: &dyn TypeSystem) -> IndexResult<Vec<Oid>> {
        let mut members = Vec::new();
        self.collect_transitive(type_key, types, &mut members)?;
        Ok(members)
    }

    fn collect_transitive(
        &self,
        type_key: &str,
        types: &dyn TypeSystem,
        members: &mut Vec<Oid>,
    ) -> IndexResult<()> {
        if !types.is_abstract(type_key) {
            members.extend(self.load(type_key)?);
        }
        for subclass in types.subclasses(type_key) {
            self.collect_transitive(&subclass, types, members)?;
        }
        Ok(())
    }

    /// Add `oid` to the end of `type_key`'s index.
    pub fn append(&self, type_key: &str, oid: &Oid) -> IndexResult<()> {
        if self.codec.oid_codec().is_transient(oid) {
            return Err(IndexError::TransientMember(oid.clone()));
        }
        let mut members = self.load(type_key)?;
        members.push(oid.clone());
        self.write(type_key, &members)?;
        debug!(type_key, %oid, members = members.len(), "instance indexed");
        Ok(())
    }

    /// Drop the first occurrence of `oid` from `type_key`'s index.
    ///
    /// Returns `false`, and leaves the record untouched, when `oid` is not
    /// a member.
    pub fn remove(&self, type_key: &str, oid: &Oid) -> IndexResult<bool> {
        let mut members = self.load(type_key)?;
        let Some(pos) = members.iter().position(|m| m == oid) else {
            return Ok(false);
        };
        members.remove(pos);
        self.write(type_key, &members)?;
        debug!(type_key, %oid, members = members.len(), "instance unindexed");
        Ok(true)
    }

    fn write(&self, type_key: &str, members: &[Oid]) -> IndexResult<()> {
        let path = StoragePath::instances(type_key)?;
        self.store.write(&path, &self.encode(type_key, members))?;
        Ok(())
    }

    fn encode(&self, type_key: &str, members: &[Oid]) -> String {
        let mut writer = MarkupWriter::new(self.codec.escaper());
        writer.start(INSTANCES_TAG, &[(NAME_ATTR, type_key)]);
        for member in members {
            let oid = self.codec.oid_codec().encode(member);
            writer.empty(INSTANCE_TAG, &[(OID_ATTR, oid.as_str())]);
        }
        writer.finish()
    }

    fn decode(&self, type_key: &str, text: &str) -> IndexResult<Vec<Oid>> {
        let mut members = Vec::new();
        let mut depth = 0usize;
        let mut root_seen = false;
        for event in MarkupReader::new(text, self.codec.escaper()) {
            let event = event?;
            match (&event, depth) {
                (MarkupEvent::Start { name, .. }, 0) => {
                    if name != INSTANCES_TAG {
                        return Err(malformed(format!("unexpected root <{name}> in index")));
                    }
                    let found = event.attribute(NAME_ATTR).unwrap_or_default();
                    if found != type_key {
                        return Err(IndexError::NameMismatch {
                            expected: type_key.to_string(),
                            found: found.to_string(),
                        });
                    }
                    root_seen = true;
                    depth += 1;
                }
                (MarkupEvent::Start { name, .. }, 1) if name == INSTANCE_TAG => {
                    let oid = event
                        .attribute(OID_ATTR)
                        .ok_or_else(|| malformed("<instance> without oid"))?;
                    members.push(self.codec.parse_oid(oid)?);
                    depth += 1;
                }
                (MarkupEvent::Start { name, .. }, _) => {
                    return Err(malformed(format!("unexpected <{name}> in index")));
                }
                (MarkupEvent::End { .. }, _) => depth = depth.saturating_sub(1),
                (MarkupEvent::Text(body), _) if body.trim().is_empty() => {}
                (MarkupEvent::Text(_), _) => return Err(malformed("text inside index")),
            }
        }
        if !root_seen {
            return Err(malformed("index record has no <instances> root"));
        }
        Ok(members)
    }
}

fn malformed(reason: impl Into<String>) -> IndexError {
    IndexError::Codec(CodecError::Malformed(reason.into()))
}
