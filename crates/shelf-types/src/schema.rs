//! The type-system contract consumed by the index and engine layers.
//!
//! The engine never introspects domain types itself. It asks a
//! [`TypeSystem`] which fully-qualified type a tag denotes, whether that type
//! is abstract, which types directly extend it and which of its fields hold
//! reference lists. [`StaticTypeSystem`] answers these questions from a flat
//! list of [`TypeDescriptor`]s, typically loaded from configuration.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::oid::validate_segment;

/// Storage name of the identifier counter. No type key may take it, since
/// instance indexes are stored under their type key.
pub const COUNTER_RECORD: &str = "oid";

/// Metamodel queries needed for persistence.
pub trait TypeSystem: Send + Sync {
    /// The fully-qualified type key for an identifier's type tag.
    fn type_key_for_tag(&self, tag: &str) -> Option<String>;

    /// Whether the type is abstract (and therefore has no instance index).
    fn is_abstract(&self, type_key: &str) -> bool;

    /// Direct subclasses, in declaration order.
    fn subclasses(&self, type_key: &str) -> Vec<String>;

    /// Names of reference-list fields, inherited ones included.
    fn reference_list_fields(&self, type_key: &str) -> Vec<String>;

    /// Whether `candidate` is `ancestor` or (transitively) extends it.
    fn is_subtype(&self, candidate: &str, ancestor: &str) -> bool {
        candidate == ancestor
            || self
                .subclasses(ancestor)
                .iter()
                .any(|sub| self.is_subtype(candidate, sub))
    }
}

/// Declaration of one persistable type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Fully-qualified type name; names the instance index record.
    pub key: String,
    /// Short tag used in identifiers of this type.
    pub tag: String,
    /// Abstract types have no instances of their own.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Key of the supertype, if any.
    #[serde(default)]
    pub parent: Option<String>,
    /// Fields declared on this type that hold ordered reference lists.
    #[serde(default)]
    pub reference_lists: Vec<String>,
}

impl TypeDescriptor {
    /// A concrete type with no parent.
    pub fn concrete(key: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tag: tag.into(),
            is_abstract: false,
            parent: None,
            reference_lists: Vec::new(),
        }
    }

    /// An abstract type with no parent.
    pub fn abstract_type(key: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            is_abstract: true,
            ..Self::concrete(key, tag)
        }
    }

    /// Set the supertype.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare a reference-list field.
    pub fn with_reference_list(mut self, field: impl Into<String>) -> Self {
        self.reference_lists.push(field.into());
        self
    }
}

/// Builder for [`StaticTypeSystem`].
#[derive(Debug, Default)]
pub struct StaticTypeSystemBuilder {
    descriptors: Vec<TypeDescriptor>,
}

impl StaticTypeSystemBuilder {
    /// Add a type declaration.
    pub fn add(mut self, descriptor: TypeDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Validate the declarations and build the type system.
    pub fn build(self) -> Result<StaticTypeSystem, TypeError> {
        StaticTypeSystem::from_descriptors(self.descriptors)
    }
}

/// A [`TypeSystem`] backed by a fixed set of descriptors.
#[derive(Clone, Debug, Default)]
pub struct StaticTypeSystem {
    types: BTreeMap<String, TypeDescriptor>,
    by_tag: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
}

impl StaticTypeSystem {
    /// Start building a type system.
    pub fn builder() -> StaticTypeSystemBuilder {
        StaticTypeSystemBuilder::default()
    }

    /// Build from descriptors, rejecting duplicate keys or tags, unknown
    /// parents and inheritance cycles.
    pub fn from_descriptors(descriptors: Vec<TypeDescriptor>) -> Result<Self, TypeError> {
        let mut system = Self::default();
        let mut order = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let invalid = |reason: &str| TypeError::InvalidType {
                key: descriptor.key.clone(),
                reason: reason.to_string(),
            };
            if let Some(reason) = key_problem(&descriptor.key) {
                return Err(invalid(reason));
            }
            if let Err(e) = validate_segment(&descriptor.tag, "type tag") {
                return Err(invalid(&e.to_string()));
            }
            if system.types.contains_key(&descriptor.key) {
                return Err(invalid("duplicate type key"));
            }
            if system.by_tag.contains_key(&descriptor.tag) {
                return Err(invalid("duplicate type tag"));
            }
            system
                .by_tag
                .insert(descriptor.tag.clone(), descriptor.key.clone());
            order.push(descriptor.key.clone());
            system.types.insert(descriptor.key.clone(), descriptor);
        }

        // Children are recorded in declaration order so that subclass
        // enumeration is deterministic.
        for key in &order {
            let descriptor = &system.types[key];
            if let Some(parent) = &descriptor.parent {
                if !system.types.contains_key(parent) {
                    return Err(TypeError::InvalidType {
                        key: key.clone(),
                        reason: format!("unknown parent type {parent}"),
                    });
                }
                system
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .push(key.clone());
            }
        }

        for key in &order {
            let mut seen = HashSet::new();
            let mut current = Some(key.as_str());
            while let Some(k) = current {
                if !seen.insert(k) {
                    return Err(TypeError::InvalidType {
                        key: key.clone(),
                        reason: "inheritance cycle".to_string(),
                    });
                }
                current = system.types[k].parent.as_deref();
            }
        }

        Ok(system)
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types are declared.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Why `key` cannot name an instance index record, if it cannot.
fn key_problem(key: &str) -> Option<&'static str> {
    if key.is_empty() {
        Some("key must not be empty")
    } else if key == "." || key == ".." {
        Some("key must not be '.' or '..'")
    } else if key.contains(['/', '\\', '\0']) {
        Some("key must not contain path separators")
    } else if key == COUNTER_RECORD {
        Some("key is reserved for the identifier counter")
    } else {
        None
    }
}

impl TypeSystem for StaticTypeSystem {
    fn type_key_for_tag(&self, tag: &str) -> Option<String> {
        self.by_tag.get(tag).cloned()
    }

    fn is_abstract(&self, type_key: &str) -> bool {
        self.types
            .get(type_key)
            .map(|d| d.is_abstract)
            .unwrap_or(false)
    }

    fn subclasses(&self, type_key: &str) -> Vec<String> {
        self.children.get(type_key).cloned().unwrap_or_default()
    }

    fn reference_list_fields(&self, type_key: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.types.get(type_key);
        while let Some(descriptor) = current {
            chain.push(descriptor);
            current = descriptor
                .parent
                .as_deref()
                .and_then(|p| self.types.get(p));
        }
        // Inherited fields first, then the type's own.
        chain
            .iter()
            .rev()
            .flat_map(|d| d.reference_lists.iter().cloned())
            .collect()
    }
}
