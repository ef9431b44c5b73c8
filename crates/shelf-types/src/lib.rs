//! Foundation types for the shelf object store.
//!
//! This crate provides the identity and version primitives shared by every
//! other shelf crate, plus the narrow type-system contract the engine uses to
//! walk type hierarchies.
//!
//! # Key Types
//!
//! - [`Oid`] -- Root identifier: a type tag plus a local identifier
//! - [`OidCodec`] -- Text encoding and transience predicate for identifiers
//! - [`Version`] -- Optimistic-concurrency stamp (acting user + sequence)
//! - [`TypeSystem`] -- Abstractness, subclass and field enumeration per type
//! - [`StaticTypeSystem`] -- In-memory metamodel built from [`TypeDescriptor`]s

pub mod error;
pub mod oid;
pub mod schema;
pub mod version;

pub use error::TypeError;
pub use oid::{Oid, OidCodec, OidState, TextOidCodec};
pub use schema::{
    StaticTypeSystem, StaticTypeSystemBuilder, TypeDescriptor, TypeSystem, COUNTER_RECORD,
};
pub use version::Version;
