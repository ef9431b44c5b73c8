use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use shelf_types::{Oid, Version};

/// Root tag of an object record.
pub const OBJECT_TAG: &str = "isis";
/// Root tag of a collection record.
pub const COLLECTION_TAG: &str = "collection";

/// Which of the two record shapes a document holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RecordKind {
    Object,
    Collection,
}

impl RecordKind {
    /// The root tag used in markup.
    pub fn root_tag(&self) -> &'static str {
        match self {
            RecordKind::Object => OBJECT_TAG,
            RecordKind::Collection => COLLECTION_TAG,
        }
    }

    /// Kind for a root tag, if it is one.
    pub fn from_root_tag(tag: &str) -> Option<Self> {
        match tag {
            OBJECT_TAG => Some(RecordKind::Object),
            COLLECTION_TAG => Some(RecordKind::Collection),
            _ => None,
        }
    }
}

/// The value held by one field of an object record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Literal text.
    Scalar(String),
    /// A single reference to another record.
    Reference(Oid),
    /// An ordered list of references; may be empty.
    ReferenceList(Vec<Oid>),
}

impl FieldValue {
    /// Every identifier this value refers to.
    pub fn references(&self) -> &[Oid] {
        match self {
            FieldValue::Scalar(_) => &[],
            FieldValue::Reference(oid) => std::slice::from_ref(oid),
            FieldValue::ReferenceList(oids) => oids,
        }
    }
}

/// Insertion-ordered field map.
///
/// Order is kept so that records are written in the order their fields were
/// set, but equality ignores order: field names are the lookup key.
#[derive(Clone, Debug, Default)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    /// Create an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value in place.
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Mutable lookup by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Returns `true` if the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl Eq for Fields {}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Persisted state of one domain object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObjectRecord {
    pub oid: Oid,
    pub version: Version,
    pub fields: Fields,
}

impl ObjectRecord {
    /// Create a record with no fields.
    pub fn new(oid: Oid, version: Version) -> Self {
        Self {
            oid,
            version,
            fields: Fields::new(),
        }
    }

    /// Builder-style scalar field.
    pub fn with_scalar(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.set(name, FieldValue::Scalar(value.into()));
        self
    }

    /// Builder-style single reference field.
    pub fn with_reference(mut self, name: impl Into<String>, oid: Oid) -> Self {
        self.fields.set(name, FieldValue::Reference(oid));
        self
    }

    /// Builder-style reference-list field.
    pub fn with_references(mut self, name: impl Into<String>, oids: Vec<Oid>) -> Self {
        self.fields.set(name, FieldValue::ReferenceList(oids));
        self
    }

    /// Look up a field value.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Insert empty reference lists for declared list fields that are
    /// missing. An empty list is not written to markup, so a decoded record
    /// needs its type's declarations to tell "emptied" from "never set".
    pub fn declare_reference_lists<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            if !self.fields.contains(name) {
                self.fields.set(name, FieldValue::ReferenceList(Vec::new()));
            }
        }
    }

    /// Every `(field, oid)` reference held by this record.
    pub fn references(&self) -> impl Iterator<Item = (&str, &Oid)> {
        self.fields
            .iter()
            .flat_map(|(name, value)| value.references().iter().map(move |oid| (name, oid)))
    }
}

/// Persisted membership of one collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CollectionRecord {
    pub oid: Oid,
    pub version: Version,
    pub elements: Vec<Oid>,
}

impl CollectionRecord {
    /// Create a collection record.
    pub fn new(oid: Oid, version: Version, elements: Vec<Oid>) -> Self {
        Self {
            oid,
            version,
            elements,
        }
    }
}

/// One persisted unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Object(ObjectRecord),
    Collection(CollectionRecord),
}

impl Record {
    /// The record's identifier.
    pub fn oid(&self) -> &Oid {
        match self {
            Record::Object(r) => &r.oid,
            Record::Collection(r) => &r.oid,
        }
    }

    /// The record's version stamp.
    pub fn version(&self) -> &Version {
        match self {
            Record::Object(r) => &r.version,
            Record::Collection(r) => &r.version,
        }
    }

    /// Mutable access to the version stamp.
    pub fn version_mut(&mut self) -> &mut Version {
        match self {
            Record::Object(r) => &mut r.version,
            Record::Collection(r) => &mut r.version,
        }
    }

    /// Which shape this record has.
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Object(_) => RecordKind::Object,
            Record::Collection(_) => RecordKind::Collection,
        }
    }

    /// Borrow as an object record.
    pub fn as_object(&self) -> Option<&ObjectRecord> {
        match self {
            Record::Object(r) => Some(r),
            Record::Collection(_) => None,
        }
    }

    /// Convert into an object record.
    pub fn into_object(self) -> Option<ObjectRecord> {
        match self {
            Record::Object(r) => Some(r),
            Record::Collection(_) => None,
        }
    }

    /// Borrow as a collection record.
    pub fn as_collection(&self) -> Option<&CollectionRecord> {
        match self {
            Record::Object(_) => None,
            Record::Collection(r) => Some(r),
        }
    }
}

impl From<ObjectRecord> for Record {
    fn from(record: ObjectRecord) -> Self {
        Record::Object(record)
    }
}

impl From<CollectionRecord> for Record {
    fn from(record: CollectionRecord) -> Self {
        Record::Collection(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(id: &str) -> Oid {
        Oid::persistent("EMP", id).unwrap()
    }

    #[test]
    fn set_replaces_in_place() {
        let mut fields = Fields::new();
        fields.set("a", FieldValue::Scalar("1".into()));
        fields.set("b", FieldValue::Scalar("2".into()));
        fields.set("a", FieldValue::Scalar("3".into()));
        let names: Vec<&str> = fields.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(&FieldValue::Scalar("3".into())));
    }

    #[test]
    fn equality_ignores_field_order() {
        let a = ObjectRecord::new(oid("1"), Version::initial("u"))
            .with_scalar("name", "Fred")
            .with_reference("manager", oid("2"));
        let b = ObjectRecord::new(oid("1"), Version::initial("u"))
            .with_reference("manager", oid("2"))
            .with_scalar("name", "Fred");
        assert_eq!(a, b);
    }

    #[test]
    fn equality_sees_missing_field() {
        let a = ObjectRecord::new(oid("1"), Version::initial("u")).with_scalar("name", "Fred");
        let b = ObjectRecord::new(oid("1"), Version::initial("u"));
        assert_ne!(a, b);
    }

    #[test]
    fn declare_fills_only_missing_lists() {
        let mut record = ObjectRecord::new(oid("1"), Version::initial("u"))
            .with_references("reports", vec![oid("2")]);
        record.declare_reference_lists(&["reports", "friends"]);
        assert_eq!(
            record.field("reports"),
            Some(&FieldValue::ReferenceList(vec![oid("2")]))
        );
        assert_eq!(record.field("friends"), Some(&FieldValue::ReferenceList(vec![])));
    }

    #[test]
    fn references_cover_all_reference_fields() {
        let record = ObjectRecord::new(oid("1"), Version::initial("u"))
            .with_scalar("name", "Fred")
            .with_reference("manager", oid("2"))
            .with_references("reports", vec![oid("3"), oid("4")]);
        let refs: Vec<(&str, String)> = record
            .references()
            .map(|(f, o)| (f, o.encode()))
            .collect();
        assert_eq!(
            refs,
            vec![
                ("manager", "EMP:2".to_string()),
                ("reports", "EMP:3".to_string()),
                ("reports", "EMP:4".to_string()),
            ]
        );
    }

    #[test]
    fn record_accessors() {
        let mut record: Record =
            CollectionRecord::new(oid("9"), Version::new("u", 4), vec![oid("1")]).into();
        assert_eq!(record.kind(), RecordKind::Collection);
        assert_eq!(record.oid(), &oid("9"));
        assert!(record.as_object().is_none());
        record.version_mut().sequence = 5;
        assert_eq!(record.version().sequence, 5);
    }

    #[test]
    fn root_tags() {
        assert_eq!(RecordKind::from_root_tag("isis"), Some(RecordKind::Object));
        assert_eq!(RecordKind::from_root_tag("collection"), Some(RecordKind::Collection));
        assert_eq!(RecordKind::from_root_tag("instances"), None);
    }

    #[test]
    fn serializes_fields_as_map() {
        let record = ObjectRecord::new(oid("1"), Version::new("u", 1)).with_scalar("name", "Fred");
        let json = serde_json::to_value(Record::from(record)).unwrap();
        assert_eq!(json["kind"], "object");
        assert_eq!(json["oid"], "EMP:1");
        assert_eq!(json["fields"]["name"]["scalar"], "Fred");
    }
}
