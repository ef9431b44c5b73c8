//! Translation between [`Record`]s and their markup documents.
//!
//! Decoding is a small state machine driven by [`MarkupReader`] events. The
//! decoder tracks the mode (object or collection), the stack of open tags
//! (so every child tag is checked against its parent) and, while inside a
//! `value` tag, the accumulating scalar text. Each opening or closing of a
//! `value`, `association`, `multiple-association` or `element` tag commits
//! exactly one piece of state.

use std::sync::Arc;

use shelf_types::{Oid, OidCodec, TextOidCodec, Version};
use tracing::trace;

use crate::error::{CodecError, CodecResult};
use crate::escape::{TextEscaper, XmlEscaper};
use crate::markup::{MarkupEvent, MarkupReader, MarkupWriter};
use crate::record::{
    CollectionRecord, FieldValue, ObjectRecord, Record, RecordKind, COLLECTION_TAG, OBJECT_TAG,
};

const VALUE_TAG: &str = "value";
const ASSOCIATION_TAG: &str = "association";
const MULTIPLE_ASSOCIATION_TAG: &str = "multiple-association";
const ELEMENT_TAG: &str = "element";

const OID_ATTR: &str = "oid";
const USER_ATTR: &str = "user";
const VERSION_ATTR: &str = "ver";
const FIELD_ATTR: &str = "field";

/// Encodes and decodes record documents.
///
/// Identifier text and body escaping are delegated to injected
/// collaborators.
#[derive(Clone)]
pub struct RecordCodec {
    oids: Arc<dyn OidCodec>,
    escaper: Arc<dyn TextEscaper>,
}

impl RecordCodec {
    /// Create a codec with explicit collaborators.
    pub fn new(oids: Arc<dyn OidCodec>, escaper: Arc<dyn TextEscaper>) -> Self {
        Self { oids, escaper }
    }

    /// The identifier codec in use.
    pub fn oid_codec(&self) -> &dyn OidCodec {
        self.oids.as_ref()
    }

    /// The text escaper in use.
    pub fn escaper(&self) -> &dyn TextEscaper {
        self.escaper.as_ref()
    }

    /// Parse an `oid` attribute value.
    pub fn parse_oid(&self, text: &str) -> CodecResult<Oid> {
        self.oids
            .decode(text)
            .map_err(|e| CodecError::Malformed(e.to_string()))
    }

    /// Render a record as a markup document.
    ///
    /// Fails without producing any output if the record references a
    /// transient identifier.
    pub fn encode(&self, record: &Record) -> CodecResult<String> {
        self.check_references(record)?;

        let version = record.version();
        let oid = self.oids.encode(record.oid());
        let ver = version.sequence_hex();
        let root = [
            (OID_ATTR, oid.as_str()),
            (USER_ATTR, version.user.as_str()),
            (VERSION_ATTR, ver.as_str()),
        ];

        let mut writer = MarkupWriter::new(self.escaper.as_ref());
        writer.start(record.kind().root_tag(), &root);
        match record {
            Record::Object(object) => {
                for (name, value) in object.fields.iter() {
                    match value {
                        FieldValue::Scalar(text) => {
                            writer.text_element(VALUE_TAG, &[(FIELD_ATTR, name)], text);
                        }
                        FieldValue::Reference(target) => {
                            let target = self.oids.encode(target);
                            writer.empty(
                                ASSOCIATION_TAG,
                                &[(FIELD_ATTR, name), (OID_ATTR, target.as_str())],
                            );
                        }
                        FieldValue::ReferenceList(targets) if targets.is_empty() => {}
                        FieldValue::ReferenceList(targets) => {
                            writer.start(MULTIPLE_ASSOCIATION_TAG, &[(FIELD_ATTR, name)]);
                            for target in targets {
                                let target = self.oids.encode(target);
                                writer.empty(ELEMENT_TAG, &[(OID_ATTR, target.as_str())]);
                            }
                            writer.end();
                        }
                    }
                }
            }
            Record::Collection(collection) => {
                for element in &collection.elements {
                    let element = self.oids.encode(element);
                    writer.empty(ELEMENT_TAG, &[(OID_ATTR, element.as_str())]);
                }
            }
        }
        Ok(writer.finish())
    }

    fn check_references(&self, record: &Record) -> CodecResult<()> {
        let transient = match record {
            Record::Object(object) => object
                .references()
                .find(|(_, oid)| self.oids.is_transient(oid))
                .map(|(field, oid)| (field.to_string(), oid.clone())),
            Record::Collection(collection) => collection
                .elements
                .iter()
                .find(|oid| self.oids.is_transient(oid))
                .map(|oid| (String::new(), oid.clone())),
        };
        match transient {
            Some((field, oid)) => Err(CodecError::TransientReference { field, oid }),
            None => Ok(()),
        }
    }

    /// Parse a record document.
    ///
    /// With a `hint`, a document of the other kind is rejected as malformed.
    pub fn decode(&self, text: &str, hint: Option<RecordKind>) -> CodecResult<Record> {
        let mut decoder = Decoder::new(self);
        for event in MarkupReader::new(text, self.escaper.as_ref()) {
            decoder.apply(event?)?;
        }
        let record = decoder.finish()?;
        if let Some(expected) = hint {
            if record.kind() != expected {
                return Err(CodecError::Malformed(format!(
                    "expected <{}> record, found <{}>",
                    expected.root_tag(),
                    record.kind().root_tag()
                )));
            }
        }
        trace!(oid = %record.oid(), "record decoded");
        Ok(record)
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(Arc::new(TextOidCodec), Arc::new(XmlEscaper))
    }
}

impl std::fmt::Debug for RecordCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCodec").finish_non_exhaustive()
    }
}

/// What the decoder has built so far.
enum Mode {
    None,
    InObject(ObjectRecord),
    InCollection(CollectionRecord),
}

struct Decoder<'c> {
    codec: &'c RecordCodec,
    mode: Mode,
    /// Names of currently open tags, root first.
    open: Vec<String>,
    /// Field whose `multiple-association` wrapper is open.
    active_list: Option<String>,
    /// Field and accumulated text of an open `value` tag.
    capture: Option<(String, String)>,
    finished: bool,
}

impl<'c> Decoder<'c> {
    fn new(codec: &'c RecordCodec) -> Self {
        Self {
            codec,
            mode: Mode::None,
            open: Vec::new(),
            active_list: None,
            capture: None,
            finished: false,
        }
    }

    fn parent(&self) -> Option<&str> {
        self.open.last().map(String::as_str)
    }

    fn apply(&mut self, event: MarkupEvent) -> CodecResult<()> {
        match event {
            MarkupEvent::Start { ref name, .. } => {
                self.on_start(name, &event)?;
                self.open.push(name.clone());
            }
            MarkupEvent::End { name } => {
                self.on_end(&name)?;
                self.open.pop();
            }
            MarkupEvent::Text(text) => {
                if let Some((_, buffer)) = self.capture.as_mut() {
                    buffer.push_str(&text);
                } else if !text.trim().is_empty() {
                    return Err(CodecError::Malformed(format!(
                        "unexpected text {text:?} inside <{}>",
                        self.parent().unwrap_or_default()
                    )));
                }
            }
        }
        Ok(())
    }

    fn on_start(&mut self, name: &str, event: &MarkupEvent) -> CodecResult<()> {
        if self.finished {
            return Err(CodecError::Malformed(format!("<{name}> after the root element")));
        }

        // The root tag fixes the mode, so the parent tag alone determines
        // which children are legal.
        let parent = self.parent().map(str::to_string);
        match (parent.as_deref(), name) {
            (None, OBJECT_TAG) => {
                let (oid, version) = self.identity(event)?;
                self.mode = Mode::InObject(ObjectRecord::new(oid, version));
            }
            (None, COLLECTION_TAG) => {
                let (oid, version) = self.identity(event)?;
                self.mode = Mode::InCollection(CollectionRecord::new(oid, version, Vec::new()));
            }
            (Some(OBJECT_TAG), VALUE_TAG) => {
                let field = required(event, FIELD_ATTR)?;
                self.capture = Some((field.to_string(), String::new()));
            }
            (Some(OBJECT_TAG), ASSOCIATION_TAG) => {
                let field = required(event, FIELD_ATTR)?.to_string();
                let target = self.codec.parse_oid(required(event, OID_ATTR)?)?;
                self.object_mut()?
                    .fields
                    .set(field, FieldValue::Reference(target));
            }
            (Some(OBJECT_TAG), MULTIPLE_ASSOCIATION_TAG) => {
                let field = required(event, FIELD_ATTR)?.to_string();
                self.object_mut()?
                    .fields
                    .set(field.clone(), FieldValue::ReferenceList(Vec::new()));
                self.active_list = Some(field);
            }
            (Some(MULTIPLE_ASSOCIATION_TAG), ELEMENT_TAG) => {
                let target = self.codec.parse_oid(required(event, OID_ATTR)?)?;
                let field = self.active_list.clone().unwrap_or_default();
                if let Some(FieldValue::ReferenceList(list)) =
                    self.object_mut()?.fields.get_mut(&field)
                {
                    list.push(target);
                }
            }
            (Some(COLLECTION_TAG), ELEMENT_TAG) => {
                let target = self.codec.parse_oid(required(event, OID_ATTR)?)?;
                if let Mode::InCollection(record) = &mut self.mode {
                    record.elements.push(target);
                }
            }
            (Some(parent), _) => {
                return Err(CodecError::Malformed(format!(
                    "unexpected <{name}> inside <{parent}>"
                )))
            }
            (None, _) => {
                return Err(CodecError::Malformed(format!("unexpected root tag <{name}>")))
            }
        }
        Ok(())
    }

    fn object_mut(&mut self) -> CodecResult<&mut ObjectRecord> {
        match &mut self.mode {
            Mode::InObject(record) => Ok(record),
            _ => Err(CodecError::Malformed("field outside an object record".into())),
        }
    }

    fn on_end(&mut self, name: &str) -> CodecResult<()> {
        match name {
            VALUE_TAG => {
                if let (Some((field, text)), Mode::InObject(record)) =
                    (self.capture.take(), &mut self.mode)
                {
                    record.fields.set(field, FieldValue::Scalar(text));
                }
            }
            MULTIPLE_ASSOCIATION_TAG => self.active_list = None,
            OBJECT_TAG | COLLECTION_TAG if self.open.len() == 1 => self.finished = true,
            _ => {}
        }
        Ok(())
    }

    fn identity(&self, event: &MarkupEvent) -> CodecResult<(Oid, Version)> {
        let oid = self.codec.parse_oid(required(event, OID_ATTR)?)?;
        let user = event.attribute(USER_ATTR).unwrap_or_default();
        let sequence = Version::parse_sequence_hex(required(event, VERSION_ATTR)?)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
        Ok((oid, Version::new(user, sequence)))
    }

    fn finish(self) -> CodecResult<Record> {
        match self.mode {
            Mode::None => Err(CodecError::Malformed("document has no record".into())),
            Mode::InObject(record) => Ok(Record::Object(record)),
            Mode::InCollection(record) => Ok(Record::Collection(record)),
        }
    }
}

fn required<'e>(event: &'e MarkupEvent, key: &str) -> CodecResult<&'e str> {
    event.attribute(key).ok_or_else(|| {
        let tag = match event {
            MarkupEvent::Start { name, .. } => name.as_str(),
            _ => "?",
        };
        CodecError::Malformed(format!("<{tag}> is missing the {key} attribute"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn emp(id: &str) -> Oid {
        Oid::persistent("EMP", id).unwrap()
    }

    fn codec() -> RecordCodec {
        RecordCodec::default()
    }

    fn sample_object() -> ObjectRecord {
        ObjectRecord::new(emp("1"), Version::new("sven", 26))
            .with_scalar("name", "Fred & <Sons>")
            .with_reference("manager", emp("2"))
            .with_references("reports", vec![emp("3"), emp("4")])
    }

    #[test]
    fn object_roundtrip() {
        let record = Record::Object(sample_object());
        let text = codec().encode(&record).unwrap();
        assert_eq!(codec().decode(&text, Some(RecordKind::Object)).unwrap(), record);
    }

    #[test]
    fn object_layout() {
        let text = codec().encode(&Record::Object(sample_object())).unwrap();
        assert!(text.contains(r#"<isis oid="EMP:1" user="sven" ver="1A">"#));
        assert!(text.contains(r#"<value field="name">Fred &amp; &lt;Sons&gt;</value>"#));
        assert!(text.contains(r#"<association field="manager" oid="EMP:2"/>"#));
        assert!(text.contains(r#"<multiple-association field="reports">"#));
        assert!(text.contains(r#"<element oid="EMP:3"/>"#));
    }

    #[test]
    fn collection_roundtrip() {
        let record = Record::Collection(CollectionRecord::new(
            Oid::persistent("COL", "7").unwrap(),
            Version::new("sven", 3),
            vec![emp("3"), emp("1"), emp("2")],
        ));
        let text = codec().encode(&record).unwrap();
        assert!(text.contains(r#"<collection oid="COL:7" user="sven" ver="3">"#));
        assert_eq!(codec().decode(&text, None).unwrap(), record);
    }

    #[test]
    fn empty_list_is_omitted() {
        let record = ObjectRecord::new(emp("1"), Version::new("sven", 1))
            .with_scalar("name", "Fred")
            .with_references("reports", vec![]);
        let text = codec().encode(&Record::Object(record)).unwrap();
        assert!(!text.contains("multiple-association"));

        let mut decoded = codec().decode(&text, None).unwrap().into_object().unwrap();
        assert!(decoded.field("reports").is_none());
        decoded.declare_reference_lists(&["reports"]);
        assert_eq!(decoded.field("reports"), Some(&FieldValue::ReferenceList(vec![])));
    }

    #[test]
    fn scalar_whitespace_is_preserved() {
        let record = ObjectRecord::new(emp("1"), Version::new("u", 1))
            .with_scalar("notes", "  two\nlines ")
            .with_scalar("blank", "");
        let record = Record::Object(record);
        let text = codec().encode(&record).unwrap();
        assert_eq!(codec().decode(&text, None).unwrap(), record);
    }

    #[test]
    fn transient_association_is_rejected() {
        let record = ObjectRecord::new(emp("1"), Version::new("u", 1))
            .with_reference("manager", Oid::transient("EMP", "9").unwrap());
        let err = codec().encode(&Record::Object(record)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TransientReference { ref field, .. } if field == "manager"
        ));
        assert!(!err.is_malformed());
    }

    #[test]
    fn transient_list_entry_is_rejected() {
        let record = ObjectRecord::new(emp("1"), Version::new("u", 1))
            .with_references("reports", vec![emp("2"), Oid::transient("EMP", "9").unwrap()]);
        assert!(codec().encode(&Record::Object(record)).is_err());
    }

    #[test]
    fn transient_collection_element_is_rejected() {
        let record = CollectionRecord::new(
            Oid::persistent("COL", "1").unwrap(),
            Version::new("u", 1),
            vec![Oid::transient("EMP", "9").unwrap()],
        );
        assert!(codec().encode(&Record::Collection(record)).is_err());
    }

    #[test]
    fn hint_mismatch_is_malformed() {
        let text = codec().encode(&Record::Object(sample_object())).unwrap();
        let err = codec().decode(&text, Some(RecordKind::Collection)).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn unknown_root_is_malformed() {
        let err = codec()
            .decode(r#"<instances name="x"/>"#, None)
            .unwrap_err();
        assert!(matches!(err, CodecError::Malformed(ref m) if m.contains("root tag")));
    }

    #[test]
    fn empty_document_is_malformed() {
        assert!(codec().decode("", None).unwrap_err().is_malformed());
    }

    #[test]
    fn bad_version_is_malformed() {
        let err = codec()
            .decode(r#"<isis oid="EMP:1" user="u" ver="zz"/>"#, None)
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn bad_oid_is_malformed() {
        let err = codec()
            .decode(r#"<isis oid="nonsense" user="u" ver="1"/>"#, None)
            .unwrap_err();
        assert!(err.is_malformed());
        let err = codec()
            .decode(
                r#"<isis oid="EMP:1" user="u" ver="1"><association field="m" oid="bad"/></isis>"#,
                None,
            )
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn value_outside_object_is_malformed() {
        let text =
            r#"<collection oid="C:1" user="u" ver="1"><value field="x">1</value></collection>"#;
        assert!(codec().decode(text, None).unwrap_err().is_malformed());
    }

    #[test]
    fn element_outside_list_is_malformed() {
        let text = r#"<isis oid="EMP:1" user="u" ver="1"><element oid="EMP:2"/></isis>"#;
        assert!(codec().decode(text, None).unwrap_err().is_malformed());
    }

    #[test]
    fn nested_value_is_malformed() {
        let text = concat!(
            r#"<isis oid="EMP:1" user="u" ver="1">"#,
            r#"<multiple-association field="r"><value field="x">1</value></multiple-association>"#,
            "</isis>",
        );
        assert!(codec().decode(text, None).unwrap_err().is_malformed());
    }

    #[test]
    fn stray_text_is_malformed() {
        let text = r#"<isis oid="EMP:1" user="u" ver="1">loose</isis>"#;
        assert!(codec().decode(text, None).unwrap_err().is_malformed());
    }

    #[test]
    fn missing_field_attribute_is_malformed() {
        let text = r#"<isis oid="EMP:1" user="u" ver="1"><value>x</value></isis>"#;
        assert!(codec().decode(text, None).unwrap_err().is_malformed());
    }

    #[test]
    fn lowercase_version_is_accepted() {
        let record = codec()
            .decode(r#"<isis oid="EMP:1" user="u" ver="ff"></isis>"#, None)
            .unwrap();
        assert_eq!(record.version().sequence, 255);
    }

    fn arb_oid() -> impl Strategy<Value = Oid> {
        ("[A-Z]{1,4}", "[0-9A-F]{1,6}").prop_map(|(t, i)| Oid::persistent(t, i).unwrap())
    }

    fn arb_value() -> impl Strategy<Value = FieldValue> {
        prop_oneof![
            any::<String>()
                .prop_filter("no control characters", |s| !s.chars().any(char::is_control))
                .prop_map(FieldValue::Scalar),
            arb_oid().prop_map(FieldValue::Reference),
            prop::collection::vec(arb_oid(), 1..5).prop_map(FieldValue::ReferenceList),
        ]
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            oid in arb_oid(),
            user in "[a-z]{1,8}",
            sequence in any::<u64>(),
            fields in prop::collection::vec(("[a-z]{1,8}", arb_value()), 0..6),
        ) {
            let mut record = ObjectRecord::new(oid, Version::new(user, sequence));
            for (name, value) in fields {
                record.fields.set(name, value);
            }
            let record = Record::Object(record);
            let text = codec().encode(&record).unwrap();
            prop_assert_eq!(codec().decode(&text, None).unwrap(), record);
        }
    }
}
