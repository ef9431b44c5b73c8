//! File-backed persistence engine for the shelf object store.
//!
//! [`PersistenceEngine`] ties the lower crates together: records are encoded
//! by `shelf-record`, written through a `shelf-store` backend and listed in
//! per-type `shelf-index` indexes. Every collaborator (store, type system,
//! acting user, identifier codec) is injected at construction.
//!
//! The engine assumes a single writer. It does no locking and keeps no
//! cache; concurrent allocators or index writers can lose updates.
//!
//! # Key Types
//!
//! - [`PersistenceEngine`] -- Load, query, insert, save and remove records
//! - [`OidAllocator`] -- Store-wide numeric identifier counter
//! - [`EngineConfig`] -- TOML configuration for a directory-backed engine
//! - [`Reconciliation`] -- Read-only report of orphaned and dangling records

pub mod allocator;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod reconcile;

pub use allocator::OidAllocator;
pub use config::EngineConfig;
pub use context::{FixedUser, UserProvider};
pub use engine::PersistenceEngine;
pub use error::{EngineError, EngineResult};
pub use pattern::matches_pattern;
pub use reconcile::{DanglingEntry, Reconciliation, UnreadableRecord};

// Re-export the types callers need to build records and queries.
pub use shelf_record::{CollectionRecord, FieldValue, ObjectRecord, Record, RecordKind};
pub use shelf_types::{Oid, StaticTypeSystem, TypeDescriptor, TypeSystem, Version};
