//! Core domain types for the stardex catalogue importer.
//!
//! Responsibilities:
//! - Define the flat catalogue record and its validity rules.
//! - Provide the pure spatial grid partition used to bound import memory.
//! - Classify system names into procedurally generated and custom forms.
//!
//! Boundaries:
//! - No I/O and no storage concerns (live in `stardex-data`).
//! - No global mutable state.

#![forbid(unsafe_code)]

mod grid;
mod name;
mod record;

pub use grid::{GRID_CELLS, GRID_COLUMNS, GRID_ROWS, all_grid_ids, grid_allowed, grid_id};
pub use name::{
    ClassifiedName, NO_SECTOR, NameClass, NameClassifier, NameClassifyError, ProcgenClassifier,
};
pub use record::{COORD_SCALE, COORD_UNSET, SystemRecord, parse_catalogue_date, scale_coord};
