//! Facade crate for the stardex catalogue importer.
//!
//! This crate re-exports the core domain types and the streaming import and
//! migration entry points from the workspace member crates.

#![forbid(unsafe_code)]

pub use stardex_core::{
    COORD_SCALE, COORD_UNSET, ClassifiedName, NameClass, NameClassifier, NameClassifyError,
    ProcgenClassifier, SystemRecord, all_grid_ids, grid_id, parse_catalogue_date, scale_coord,
};

pub use stardex_data::{
    ImportError, ImportOptions, ImportOutcome, MigrateOptions, StoreError, SystemStore,
    import_file, import_str, import_systems, migrate_legacy,
};
