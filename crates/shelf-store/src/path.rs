use std::fmt;

use shelf_types::Oid;

use crate::error::{StoreError, StoreResult};

pub use shelf_types::COUNTER_RECORD;

/// Relative, segment-validated address of one record.
///
/// Layout:
/// - object and collection records: `<type-tag>/<local-id>`
/// - instance indexes: `<fully-qualified-type-name>`
/// - the identifier counter: `oid`
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoragePath {
    segments: Vec<String>,
}

impl StoragePath {
    /// Build a path from segments, rejecting anything that could escape the
    /// store root.
    pub fn new<I, S>(segments: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StoreError::InvalidPath {
                path: String::new(),
                reason: "path has no segments".into(),
            });
        }
        for segment in &segments {
            let reason = if segment.is_empty() {
                Some("empty segment")
            } else if segment == "." || segment == ".." {
                Some("relative segment")
            } else if segment.contains(['/', '\\', '\0']) {
                Some("separator inside segment")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(StoreError::InvalidPath {
                    path: segments.join("/"),
                    reason: reason.into(),
                });
            }
        }
        Ok(Self { segments })
    }

    /// Parse a `/`-separated path.
    pub fn parse(text: &str) -> StoreResult<Self> {
        Self::new(text.split('/'))
    }

    /// Path of the record backing an object or collection.
    pub fn record(oid: &Oid) -> Self {
        // Oid segments are validated on construction and cannot contain
        // separators, so this never fails.
        Self {
            segments: vec![oid.type_tag().to_string(), oid.local_id().to_string()],
        }
    }

    /// Path of a type's instance index.
    pub fn instances(type_key: &str) -> StoreResult<Self> {
        Self::new([type_key])
    }

    /// Path of the shared identifier counter.
    pub fn counter() -> Self {
        Self {
            segments: vec![COUNTER_RECORD.to_string()],
        }
    }

    /// The path's segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `true` for `<tag>/<id>` paths, i.e. object and collection
    /// records.
    pub fn is_record(&self) -> bool {
        self.segments.len() == 2
    }
}

impl fmt::Debug for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoragePath({self})")
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_path_uses_tag_and_id() {
        let oid = Oid::persistent("CUS", "1A").unwrap();
        let path = StoragePath::record(&oid);
        assert_eq!(path.to_string(), "CUS/1A");
        assert!(path.is_record());
    }

    #[test]
    fn instances_path_is_type_key() {
        let path = StoragePath::instances("org.example.Customer").unwrap();
        assert_eq!(path.segments(), &["org.example.Customer".to_string()]);
        assert!(!path.is_record());
    }

    #[test]
    fn counter_path() {
        assert_eq!(StoragePath::counter().to_string(), "oid");
    }

    #[test]
    fn parse_roundtrip() {
        let path = StoragePath::parse("EMP/7").unwrap();
        assert_eq!(path, StoragePath::record(&Oid::persistent("EMP", "7").unwrap()));
    }

    #[test]
    fn rejects_escaping_segments() {
        assert!(StoragePath::parse("../etc").is_err());
        assert!(StoragePath::parse("a//b").is_err());
        assert!(StoragePath::instances("a\\b").is_err());
        assert!(StoragePath::new(Vec::<String>::new()).is_err());
    }
}
