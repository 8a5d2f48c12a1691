//! Batch transaction writer: drains the identity cache into the store.
//!
//! One transaction covers one block. Row-level failures are logged and
//! skipped so a single bad row cannot sink the rest of the block; the
//! commit still happens with whatever succeeded. Only transaction-level
//! failures propagate.
#![forbid(unsafe_code)]

use std::io::{self, Write};

use log::warn;
use rusqlite::{CachedStatement, Error as SqliteError, TransactionBehavior, params};
use stardex_core::NameClass;
use thiserror::Error;

use super::ImportError;
use super::resolve::{PendingRow, SectorCache};
use crate::store::SystemStore;

/// Why a single system row was dropped from its block.
#[derive(Debug, Error)]
enum RowError {
    /// A database write failed.
    #[error("database write failed: {0}")]
    Sqlite(#[from] SqliteError),
    /// The debug trace sink rejected the row's line.
    #[error("debug trace write failed: {0}")]
    Trace(#[from] io::Error),
}

/// Write everything staged in the cache and return the number of system
/// rows committed.
///
/// Dirty sectors are inserted with their pre-assigned ids, custom names get
/// the next sequential name id, and every pending row upserts its system
/// row keyed on the external id. Pending lists are drained; sector entries
/// persist for the following blocks of the same run.
pub(super) fn flush_block(
    store: &mut SystemStore,
    cache: &mut SectorCache,
    next_name_id: &mut i64,
    mut debug_sink: Option<&mut (dyn Write + '_)>,
) -> Result<u64, ImportError> {
    let sectors_table = store.table("Sectors");
    let names_table = store.table("Names");
    let systems_table = store.table("Systems");

    // Immediate mode takes SQLite's write intent at BEGIN, covering the
    // whole block.
    let transaction = store
        .connection_mut()
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|source| ImportError::BeginTransaction { source })?;

    let mut written = 0u64;
    {
        let mut insert_sector = transaction
            .prepare_cached(&format!(
                "INSERT INTO {sectors_table} (id, name, gridid) VALUES (?1, ?2, ?3)"
            ))
            .map_err(|source| ImportError::Prepare {
                statement: "sector insert",
                source,
            })?;
        let mut insert_name = transaction
            .prepare_cached(&format!(
                "INSERT INTO {names_table} (id, name) VALUES (?1, ?2)"
            ))
            .map_err(|source| ImportError::Prepare {
                statement: "name insert",
                source,
            })?;
        let mut upsert_system = transaction
            .prepare_cached(&format!(
                "INSERT OR REPLACE INTO {systems_table} (sectorid, nameid, x, y, z, edsmid)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))
            .map_err(|source| ImportError::Prepare {
                statement: "system upsert",
                source,
            })?;

        for id in cache.ordered_ids() {
            let Some(sector) = cache.sector_by_id_mut(id) else {
                continue;
            };

            if sector.dirty {
                insert_sector
                    .execute(params![sector.id, sector.name, sector.grid_id])
                    .map_err(|source| ImportError::InsertSector {
                        name: sector.name.clone(),
                        grid_id: sector.grid_id,
                        source,
                    })?;
                sector.dirty = false;
            }

            let sector_id = sector.id;
            for row in sector.pending.drain(..) {
                let outcome = write_row(
                    &mut insert_name,
                    &mut upsert_system,
                    sector_id,
                    &row,
                    next_name_id,
                    debug_sink.as_deref_mut(),
                );
                match outcome {
                    Ok(()) => written += 1,
                    Err(err) => {
                        warn!("skipping system row {}: {err}", row.record.external_id);
                    }
                }
            }
        }
    }

    transaction
        .commit()
        .map_err(|source| ImportError::Commit { source })?;
    Ok(written)
}

fn write_row(
    insert_name: &mut CachedStatement<'_>,
    upsert_system: &mut CachedStatement<'_>,
    sector_id: i64,
    row: &PendingRow,
    next_name_id: &mut i64,
    debug_sink: Option<&mut (dyn Write + '_)>,
) -> Result<(), RowError> {
    // Trace first, before any id is consumed, so a failed row leaves no
    // half-written state behind.
    if let Some(sink) = debug_sink {
        writeln!(
            sink,
            "{} {},{},{}, EDSM:{} Grid:{}",
            row.name, row.record.x, row.record.y, row.record.z, row.record.external_id, row.grid_id
        )?;
    }

    let name_id = match row.name.class {
        NameClass::Standard { id } => id,
        NameClass::Custom => {
            // Allocated before the insert is attempted; a failed insert
            // leaves a gap but the sequence stays strictly increasing.
            let id = *next_name_id;
            *next_name_id += 1;
            insert_name.execute(params![id, row.name.star])?;
            id
        }
    };

    upsert_system.execute(params![
        sector_id,
        name_id,
        row.record.x,
        row.record.y,
        row.record.z,
        row.record.external_id,
    ])?;
    Ok(())
}
