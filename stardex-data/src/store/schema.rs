//! Table creation for the current and prior-generation system schemas.
#![forbid(unsafe_code)]

use rusqlite::Connection;

use super::StoreError;

/// Create the normalized system tables, suffixed for shadow-table runs.
///
/// All statements are idempotent; calling this against an initialised
/// database is a no-op.
pub(super) fn create_current(connection: &mut Connection, suffix: &str) -> Result<(), StoreError> {
    let transaction = connection
        .transaction()
        .map_err(|source| StoreError::Schema {
            step: "begin schema transaction",
            source,
        })?;

    run_step(
        &transaction,
        "create sectors table",
        &format!(
            "CREATE TABLE IF NOT EXISTS Sectors{suffix} (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                gridid INTEGER NOT NULL
            )"
        ),
    )?;
    run_step(
        &transaction,
        "index sectors by name and grid",
        &format!(
            "CREATE INDEX IF NOT EXISTS idx_Sectors{suffix}_name_grid
                ON Sectors{suffix}(name, gridid)"
        ),
    )?;
    run_step(
        &transaction,
        "create names table",
        &format!(
            "CREATE TABLE IF NOT EXISTS Names{suffix} (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            )"
        ),
    )?;
    run_step(
        &transaction,
        "create systems table",
        &format!(
            "CREATE TABLE IF NOT EXISTS Systems{suffix} (
                edsmid INTEGER PRIMARY KEY,
                sectorid INTEGER NOT NULL,
                nameid INTEGER NOT NULL,
                x INTEGER NOT NULL,
                y INTEGER NOT NULL,
                z INTEGER NOT NULL
            )"
        ),
    )?;
    run_step(
        &transaction,
        "index systems by sector",
        &format!(
            "CREATE INDEX IF NOT EXISTS idx_Systems{suffix}_sector
                ON Systems{suffix}(sectorid)"
        ),
    )?;

    transaction.commit().map_err(|source| StoreError::Schema {
        step: "commit schema transaction",
        source,
    })
}

/// Create the prior-generation flat tables consumed by the legacy
/// migration driver. These never take a table suffix.
pub(super) fn create_legacy(connection: &mut Connection) -> Result<(), StoreError> {
    let transaction = connection
        .transaction()
        .map_err(|source| StoreError::Schema {
            step: "begin legacy schema transaction",
            source,
        })?;

    run_step(
        &transaction,
        "create legacy systems table",
        "CREATE TABLE IF NOT EXISTS EdsmSystems (
            EdsmId INTEGER PRIMARY KEY,
            x INTEGER NOT NULL,
            y INTEGER NOT NULL,
            z INTEGER NOT NULL,
            GridId INTEGER NOT NULL,
            UpdateTimestamp INTEGER NOT NULL
        )",
    )?;
    run_step(
        &transaction,
        "index legacy systems by grid",
        "CREATE INDEX IF NOT EXISTS idx_EdsmSystems_grid ON EdsmSystems(GridId)",
    )?;
    run_step(
        &transaction,
        "create legacy names table",
        "CREATE TABLE IF NOT EXISTS SystemNames (
            EdsmId INTEGER PRIMARY KEY,
            Name TEXT NOT NULL
        )",
    )?;

    transaction.commit().map_err(|source| StoreError::Schema {
        step: "commit legacy schema transaction",
        source,
    })
}

fn run_step(
    transaction: &rusqlite::Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), StoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| StoreError::Schema { step, source })
}
