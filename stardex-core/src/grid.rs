//! Spatial grid partition over scaled galactic coordinates.
//!
//! The populated galaxy is covered by a fixed 90x90 grid of 1000-ly cells:
//! X in [-45000, 45000) ly and Z in [-20000, 70000) ly. Coordinates outside
//! that envelope clamp to the nearest edge cell, so every record maps to a
//! valid cell id.

use crate::record::COORD_SCALE;

/// Number of grid columns along the X axis.
pub const GRID_COLUMNS: u16 = 90;

/// Number of grid rows along the Z axis.
pub const GRID_ROWS: u16 = 90;

/// Total number of grid cells.
pub const GRID_CELLS: u16 = GRID_COLUMNS * GRID_ROWS;

/// Cell edge length in scaled coordinate units.
const CELL: i64 = 1_000 * COORD_SCALE as i64;

/// Lower edge of the grid envelope, scaled.
const X_MIN: i64 = -45_000 * COORD_SCALE as i64;
const Z_MIN: i64 = -20_000 * COORD_SCALE as i64;

/// Grid cell id for a pair of scaled coordinates.
///
/// Pure function of the coordinates; the stored Y component plays no part
/// in partitioning.
///
/// # Examples
/// ```
/// use stardex_core::grid_id;
///
/// assert_eq!(grid_id(0, 0), grid_id(127, 127));
/// assert_ne!(grid_id(0, 0), grid_id(0, 1_000 * 128));
/// ```
#[must_use]
pub fn grid_id(x: i32, z: i32) -> u16 {
    let column = ((i64::from(x) - X_MIN) / CELL).clamp(0, i64::from(GRID_COLUMNS) - 1);
    let row = ((i64::from(z) - Z_MIN) / CELL).clamp(0, i64::from(GRID_ROWS) - 1);
    (row * i64::from(GRID_COLUMNS) + column) as u16
}

/// All grid cell ids, in scan order.
pub fn all_grid_ids() -> impl Iterator<Item = u16> {
    0..GRID_CELLS
}

/// Evaluate an optional allow-list against a grid id.
///
/// `None` means unrestricted; ids beyond the end of the list are excluded.
#[must_use]
pub fn grid_allowed(allow: Option<&[bool]>, id: u16) -> bool {
    match allow {
        None => true,
        Some(list) => list.get(usize::from(id)).copied().unwrap_or(false),
    }
}
