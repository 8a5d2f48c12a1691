//! Incremental catalogue import.
//!
//! The ingest loop alternates between staging (streaming records through
//! the identity cache) and flushing (one transaction per block). Between
//! blocks it checks for cancellation and yields briefly when reader
//! sessions signal contention, so a multi-hour import stays interruptible
//! and does not starve queries against the same database.
#![forbid(unsafe_code)]

mod legacy;
mod reader;
mod resolve;
mod writer;

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rusqlite::Error as SqliteError;
use stardex_core::NameClassifier;
use thiserror::Error;

pub use legacy::{MigrateOptions, migrate_legacy};
use reader::RecordReader;
use resolve::SectorCache;
use writer::flush_block;

use crate::store::{StoreError, SystemStore};

/// Records staged per transaction when no other size is requested.
pub const DEFAULT_BLOCK_SIZE: usize = 100_000;

/// How long the write path sleeps between blocks while readers wait.
const READ_YIELD: Duration = Duration::from_millis(20);

/// Errors raised by the import pipeline.
#[derive(Debug, Error)]
pub enum ImportError {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The catalogue file could not be opened.
    #[error("failed to open catalogue file {path:?}")]
    OpenInput {
        /// Path that could not be opened.
        path: PathBuf,
        /// Source I/O error.
        #[source]
        source: io::Error,
    },
    /// Starting a block transaction failed.
    #[error("failed to begin block transaction")]
    BeginTransaction {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Preparing a write statement failed.
    #[error("failed to prepare {statement} statement")]
    Prepare {
        /// Description of the statement.
        statement: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Inserting a sector row failed; this poisons every system row of the
    /// sector, so the block aborts.
    #[error("failed to insert sector {name:?} in grid cell {grid_id}")]
    InsertSector {
        /// Sector name that failed to insert.
        name: String,
        /// Grid cell of the failed sector.
        grid_id: u16,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Committing a block transaction failed.
    #[error("failed to commit block transaction")]
    Commit {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Scanning a legacy grid cell failed.
    #[error("failed to scan legacy rows in grid cell {grid_id}")]
    LegacyScan {
        /// Grid cell whose scan failed.
        grid_id: u16,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Tuning knobs for an import run.
#[derive(Debug)]
pub struct ImportOptions {
    /// Per-cell allow list indexed by grid id; `None` admits every cell.
    pub grid_allow: Option<Vec<bool>>,
    /// Skip per-sector point lookups because the tables start empty.
    pub presume_empty: bool,
    /// Records staged per transaction.
    pub block_size: usize,
    /// Stop after decoding this many records.
    pub record_limit: Option<u64>,
    /// Timestamp the catalogue was fetched from; folded into the outcome's
    /// watermark so an all-stale dump still reports a usable date.
    pub start_date: Option<DateTime<Utc>>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            grid_allow: None,
            presume_empty: false,
            block_size: DEFAULT_BLOCK_SIZE,
            record_limit: None,
            start_date: None,
        }
    }
}

/// Result of an import or migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    /// System rows committed across all blocks.
    pub rows_written: u64,
    /// Whether the run stopped on the cancellation predicate. Rows staged
    /// at that point were still flushed and committed.
    pub cancelled: bool,
    /// Latest record timestamp observed, including records that were
    /// filtered out, combined with the caller-supplied starting date.
    pub latest_date: Option<DateTime<Utc>>,
}

impl ImportOutcome {
    /// Signed row total: the committed row count, or -1 for a cancelled
    /// run so callers treating the total as a progress signal can tell the
    /// difference.
    #[must_use]
    pub fn total(&self) -> i64 {
        if self.cancelled {
            -1
        } else {
            i64::try_from(self.rows_written).unwrap_or(i64::MAX)
        }
    }
}

/// First free (name id, sector id) pair for this run.
///
/// An empty or presumed-empty database starts both counters at one;
/// otherwise they continue from just past the committed watermarks.
fn starting_ids(store: &SystemStore, presume_empty: bool) -> Result<(i64, i64), StoreError> {
    if presume_empty {
        return Ok((1, 1));
    }
    let names = store.max_row_id("Names")? + 1;
    let sectors = store.max_row_id("Sectors")? + 1;
    Ok((names, sectors))
}

/// Stream a catalogue dump into the store in block-sized transactions.
///
/// `cancel` is polled between records and between blocks; when it fires,
/// staged work is flushed and the outcome is marked cancelled. `progress`
/// receives human-readable status lines. An optional `debug_sink` gets one
/// trace line per committed system row.
///
/// # Errors
/// Returns [`ImportError`] when the store or a block transaction fails.
/// Malformed individual records are logged and skipped instead.
pub fn import_systems<R: Read>(
    store: &mut SystemStore,
    input: R,
    classifier: &dyn NameClassifier,
    options: &ImportOptions,
    mut debug_sink: Option<&mut (dyn Write + '_)>,
    cancel: &dyn Fn() -> bool,
    mut progress: impl FnMut(&str),
) -> Result<ImportOutcome, ImportError> {
    let (mut next_name_id, next_sector_id) = starting_ids(store, options.presume_empty)?;
    // A zero block size would stage nothing and never reach end of input.
    let block_size = options.block_size.max(1);
    let mut cache = SectorCache::new(next_sector_id);
    let mut reader = RecordReader::new(
        input,
        options.grid_allow.as_deref(),
        options.record_limit,
        cancel,
    );

    progress("import starting");
    let mut rows_written = 0u64;
    let mut cancelled = false;
    loop {
        let block_started = Instant::now();
        let mut staged = 0usize;
        while staged < block_size {
            let Some((record, cell)) = reader.next() else {
                break;
            };
            if cache.resolve(store, classifier, record, cell, options.presume_empty)? {
                staged += 1;
            }
        }
        if cancel() {
            cancelled = true;
        }

        if staged > 0 {
            rows_written += flush_block(store, &mut cache, &mut next_name_id, debug_sink.as_deref_mut())?;
            progress(&format!("{rows_written} systems committed"));
        }
        log::debug!(
            "block staged {staged} rows in {:?}",
            block_started.elapsed()
        );

        if cancelled || reader.at_end() {
            break;
        }
        if store.readers_waiting() {
            thread::sleep(READ_YIELD);
        }
    }

    let latest_date = [options.start_date, reader.latest_date(), cache.latest_date()]
        .into_iter()
        .flatten()
        .max();
    progress(if cancelled {
        "import cancelled"
    } else {
        "import complete"
    });
    Ok(ImportOutcome {
        rows_written,
        cancelled,
        latest_date,
    })
}

/// Import a catalogue dump from a file on disk.
///
/// # Errors
/// Returns [`ImportError::OpenInput`] when the file cannot be opened, and
/// otherwise whatever [`import_systems`] returns.
pub fn import_file(
    store: &mut SystemStore,
    path: &Path,
    classifier: &dyn NameClassifier,
    options: &ImportOptions,
    debug_sink: Option<&mut (dyn Write + '_)>,
    cancel: &dyn Fn() -> bool,
    progress: impl FnMut(&str),
) -> Result<ImportOutcome, ImportError> {
    let file = File::open(path).map_err(|source| ImportError::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;
    import_systems(
        store,
        BufReader::new(file),
        classifier,
        options,
        debug_sink,
        cancel,
        progress,
    )
}

/// Import a catalogue dump held in memory.
///
/// # Errors
/// See [`import_systems`].
pub fn import_str(
    store: &mut SystemStore,
    input: &str,
    classifier: &dyn NameClassifier,
    options: &ImportOptions,
    debug_sink: Option<&mut (dyn Write + '_)>,
    cancel: &dyn Fn() -> bool,
    progress: impl FnMut(&str),
) -> Result<ImportOutcome, ImportError> {
    import_systems(
        store,
        input.as_bytes(),
        classifier,
        options,
        debug_sink,
        cancel,
        progress,
    )
}
