//! Migration from the prior-generation flat tables.
//!
//! The old schema kept one denormalized row per system plus a side table of
//! names. Migration walks it one grid cell at a time, pushes each row
//! through the same identity resolution as a catalogue import, and commits
//! one block per cell. Stored cell assignments are not trusted; the cell is
//! recomputed from the coordinates.
#![forbid(unsafe_code)]

use std::thread;

use chrono::{DateTime, Utc};
use log::warn;
use stardex_core::{NameClassifier, SystemRecord, all_grid_ids, grid_id};

use super::resolve::SectorCache;
use super::writer::flush_block;
use super::{ImportError, ImportOutcome, READ_YIELD, starting_ids};
use crate::store::SystemStore;

/// Seconds offset base for legacy timestamps: 2015-01-01T00:00:00Z.
const LEGACY_EPOCH_SECONDS: i64 = 1_420_070_400;

/// Tuning knobs for a legacy migration run.
#[derive(Debug, Default)]
pub struct MigrateOptions {
    /// Skip per-sector point lookups because the target tables start empty.
    pub presume_empty: bool,
    /// Stop after reading this many legacy rows.
    pub row_limit: Option<u64>,
    /// Last grid cell to scan, inclusive; mostly useful for partial test
    /// runs.
    pub max_grid: Option<u16>,
}

/// A legacy timestamp is stored as seconds since the legacy epoch.
fn legacy_date(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(LEGACY_EPOCH_SECONDS.saturating_add(seconds), 0)
}

struct LegacyRow {
    external_id: i64,
    x: i64,
    y: i64,
    z: i64,
    name: Option<String>,
    timestamp: i64,
}

/// Rebuild the normalized tables from the prior-generation flat schema.
///
/// Walks every grid cell in scan order, resolving and committing one block
/// per populated cell. `cancel` is polled between cells; a cancelled run
/// keeps everything committed so far.
///
/// # Errors
/// Returns [`ImportError`] when a cell scan or a block transaction fails.
/// Individual unreadable or nameless rows are logged and skipped.
pub fn migrate_legacy(
    store: &mut SystemStore,
    classifier: &dyn NameClassifier,
    options: &MigrateOptions,
    cancel: &dyn Fn() -> bool,
    mut progress: impl FnMut(&str),
) -> Result<ImportOutcome, ImportError> {
    let (mut next_name_id, next_sector_id) = starting_ids(store, options.presume_empty)?;
    let mut cache = SectorCache::new(next_sector_id);
    let mut remaining = options.row_limit.unwrap_or(u64::MAX);

    progress("legacy migration starting");
    let mut rows_written = 0u64;
    let mut cancelled = false;
    for cell in all_grid_ids() {
        if let Some(max) = options.max_grid
            && cell > max
        {
            break;
        }
        if cancel() {
            cancelled = true;
            break;
        }

        let staged = scan_cell(
            store,
            &mut cache,
            classifier,
            cell,
            options.presume_empty,
            &mut remaining,
        )?;
        if staged > 0 {
            rows_written += flush_block(store, &mut cache, &mut next_name_id, None)?;
            progress(&format!(
                "{rows_written} systems migrated through grid cell {cell}"
            ));
        }

        if remaining == 0 {
            break;
        }
        if store.readers_waiting() {
            thread::sleep(READ_YIELD);
        }
    }

    let latest_date = cache.latest_date();
    progress(if cancelled {
        "legacy migration cancelled"
    } else {
        "legacy migration complete"
    });
    Ok(ImportOutcome {
        rows_written,
        cancelled,
        latest_date,
    })
}

/// Stage every usable legacy row of one grid cell, returning the count.
fn scan_cell(
    store: &SystemStore,
    cache: &mut SectorCache,
    classifier: &dyn NameClassifier,
    cell: u16,
    presume_empty: bool,
    remaining: &mut u64,
) -> Result<u64, ImportError> {
    let mut statement = store
        .connection()
        .prepare_cached(
            "SELECT s.EdsmId, s.x, s.y, s.z, n.Name, s.UpdateTimestamp
                FROM EdsmSystems s
                LEFT OUTER JOIN SystemNames n ON n.EdsmId = s.EdsmId
                WHERE s.GridId = ?1",
        )
        .map_err(|source| ImportError::LegacyScan {
            grid_id: cell,
            source,
        })?;
    let rows = statement
        .query_map([cell], |row| {
            Ok(LegacyRow {
                external_id: row.get(0)?,
                x: row.get(1)?,
                y: row.get(2)?,
                z: row.get(3)?,
                name: row.get(4)?,
                timestamp: row.get(5)?,
            })
        })
        .map_err(|source| ImportError::LegacyScan {
            grid_id: cell,
            source,
        })?;

    let mut staged = 0u64;
    for row in rows {
        if *remaining == 0 {
            break;
        }
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping unreadable legacy row in grid cell {cell}: {err}");
                continue;
            }
        };
        *remaining -= 1;

        let Some(name) = row.name else {
            warn!("legacy system {} has no name, skipping", row.external_id);
            continue;
        };
        let record = SystemRecord {
            external_id: row.external_id,
            name,
            date: legacy_date(row.timestamp),
            x: clamp_coord(row.x),
            y: clamp_coord(row.y),
            z: clamp_coord(row.z),
        };
        if !record.is_valid() {
            warn!("legacy system {} fails validation, skipping", record.external_id);
            continue;
        }

        // The stored cell assignment may predate the current grid layout.
        let computed = grid_id(record.x, record.z);
        if cache.resolve(store, classifier, record, computed, presume_empty)? {
            staged += 1;
        }
    }
    Ok(staged)
}

/// Legacy coordinates were stored as wider integers; out-of-range values
/// collapse to the unset sentinel and fail validation downstream.
fn clamp_coord(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(stardex_core::COORD_UNSET)
}
