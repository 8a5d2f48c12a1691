//! Ingestion and persistence for the stardex catalogue importer.
//!
//! Responsibilities:
//! - Stream star-system records out of catalogue dumps far larger than
//!   memory and materialise them into a normalized SQLite store.
//! - Deduplicate sectors and names across blocks through a run-scoped
//!   identity cache.
//! - Commit work in bounded transaction blocks that coexist with concurrent
//!   readers of the same database.
//!
//! Boundaries:
//! - Pure domain rules (grid partitioning, name classification) live in
//!   `stardex-core`.
//! - One importer run owns its caches; nothing here is shared across runs.

#![forbid(unsafe_code)]

mod import;
mod store;

pub use import::{
    DEFAULT_BLOCK_SIZE, ImportError, ImportOptions, ImportOutcome, MigrateOptions, import_file,
    import_str, import_systems, migrate_legacy,
};
pub use store::{StoreError, SystemStore};
