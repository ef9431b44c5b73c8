//! Per-type instance indexes for the shelf object store.
//!
//! Every concrete type has one index record listing the identifiers of all
//! persisted instances of exactly that type. Queries over a type hierarchy
//! union the indexes of the type and all of its subclasses, so "all
//! instances of T" never needs a scan of the whole store.
//!
//! # Key Types
//!
//! - [`InstanceIndex`] -- Load, append to and remove from index records
//! - [`IndexError`] -- Failures reading or rewriting an index

pub mod error;
pub mod index;

pub use error::{IndexError, IndexResult};
pub use index::InstanceIndex;
