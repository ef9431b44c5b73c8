//! Record file layer for the shelf object store.
//!
//! Every persisted unit in shelf -- object records, collection records,
//! instance indexes and the identifier counter -- is a small text document
//! addressed by a [`StoragePath`]. This crate knows nothing about the
//! markup inside those documents; it only reads, replaces and deletes them.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`DirectoryRecordStore`] -- one `.xml` file per path under a root directory
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A write replaces the whole document; readers never see a partial one.
//! 2. Reading an absent path is `Ok(None)`, not an error.
//! 3. There is no locking across calls. Callers serialize writers.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod path;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::DirectoryRecordStore;
pub use memory::InMemoryRecordStore;
pub use path::StoragePath;
pub use traits::RecordStore;
