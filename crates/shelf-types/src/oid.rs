use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Marker prefix for transient identifiers in the text encoding.
const TRANSIENT_MARKER: char = '!';

/// Separator between the type tag and the local identifier.
const SEPARATOR: char = ':';

/// Characters that may not appear in either identifier segment.
///
/// Both segments become path components in the directory store.
const FORBIDDEN_CHARS: &[char] = &[
    SEPARATOR,
    TRANSIENT_MARKER,
    '/',
    '\\',
    ' ',
    '\t',
    '\n',
    '\r',
];

/// Whether an identifier is backed by a persisted record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OidState {
    /// Not yet persisted; must never be written as a reference.
    Transient,
    /// Backed by a record in the store.
    Persistent,
}

/// Root identifier for one persisted object or collection.
///
/// An `Oid` pairs a short type tag with a store-local identifier. The
/// canonical text encoding is `TAG:ID` (or `!TAG:ID` for transient
/// identifiers); two identifiers are equal exactly when their encodings are.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid {
    type_tag: String,
    local_id: String,
    state: OidState,
}

impl Oid {
    /// Create a persistent identifier, validating both segments.
    pub fn persistent(
        type_tag: impl Into<String>,
        local_id: impl Into<String>,
    ) -> Result<Self, TypeError> {
        Self::with_state(type_tag.into(), local_id.into(), OidState::Persistent)
    }

    /// Create a transient identifier, validating both segments.
    pub fn transient(
        type_tag: impl Into<String>,
        local_id: impl Into<String>,
    ) -> Result<Self, TypeError> {
        Self::with_state(type_tag.into(), local_id.into(), OidState::Transient)
    }

    fn with_state(type_tag: String, local_id: String, state: OidState) -> Result<Self, TypeError> {
        validate_segment(&type_tag, "type tag")?;
        validate_segment(&local_id, "local id")?;
        Ok(Self {
            type_tag,
            local_id,
            state,
        })
    }

    /// The type tag naming the object's declared type.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// The store-local identifier.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Persistence state.
    pub fn state(&self) -> OidState {
        self.state
    }

    /// Returns `true` if this identifier is not backed by a record.
    pub fn is_transient(&self) -> bool {
        self.state == OidState::Transient
    }

    /// The same identifier, marked persistent.
    pub fn into_persistent(self) -> Self {
        Self {
            state: OidState::Persistent,
            ..self
        }
    }

    /// Canonical text encoding.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse the canonical text encoding.
    pub fn decode(text: &str) -> Result<Self, TypeError> {
        let (state, rest) = match text.strip_prefix(TRANSIENT_MARKER) {
            Some(rest) => (OidState::Transient, rest),
            None => (OidState::Persistent, text),
        };
        let (tag, id) = rest.split_once(SEPARATOR).ok_or_else(|| TypeError::InvalidOid {
            text: text.to_string(),
            reason: format!("missing '{SEPARATOR}' separator"),
        })?;
        Self::with_state(tag.to_string(), id.to_string(), state).map_err(|e| match e {
            TypeError::InvalidOid { reason, .. } => TypeError::InvalidOid {
                text: text.to_string(),
                reason,
            },
            other => other,
        })
    }
}

pub(crate) fn validate_segment(segment: &str, what: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidOid {
        text: segment.to_string(),
        reason,
    };
    if segment.is_empty() {
        return Err(invalid(format!("{what} must not be empty")));
    }
    if segment == "." || segment == ".." {
        return Err(invalid(format!("{what} must not be '.' or '..'")));
    }
    if let Some(ch) = segment.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(format!("{what} contains forbidden character {ch:?}")));
    }
    Ok(())
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_transient() {
            write!(f, "{TRANSIENT_MARKER}")?;
        }
        write!(f, "{}{SEPARATOR}{}", self.type_tag, self.local_id)
    }
}

impl FromStr for Oid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.encode()
    }
}

/// Text encoding contract for identifiers, injected into the codec and
/// index layers.
pub trait OidCodec: Send + Sync {
    /// Render an identifier as attribute text.
    fn encode(&self, oid: &Oid) -> String;

    /// Parse attribute text back into an identifier.
    fn decode(&self, text: &str) -> Result<Oid, TypeError>;

    /// Whether the identifier has no backing record yet.
    fn is_transient(&self, oid: &Oid) -> bool;
}

/// The canonical `[!]TAG:ID` encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextOidCodec;

impl OidCodec for TextOidCodec {
    fn encode(&self, oid: &Oid) -> String {
        oid.encode()
    }

    fn decode(&self, text: &str) -> Result<Oid, TypeError> {
        Oid::decode(text)
    }

    fn is_transient(&self, oid: &Oid) -> bool {
        oid.is_transient()
    }
}
