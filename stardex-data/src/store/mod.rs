//! SQLite session for the system store.
//!
//! One [`SystemStore`] wraps one connection and is used sequentially by a
//! single importer run: point lookups during resolution and block commits
//! share the session, there is no internal parallelism. A table-name suffix
//! redirects every read and write to a shadow table set, and an optional
//! shared flag lets externally driven reader sessions signal contention.
#![forbid(unsafe_code)]

mod schema;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::{Connection, Error as SqliteError, OptionalExtension};
use thiserror::Error;

/// Errors raised by the system store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open system database at {path:?}")]
    Open {
        /// Database path that could not be opened.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A schema creation step failed.
    #[error("failed to execute schema step '{step}'")]
    Schema {
        /// Name of the failed step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A point lookup or statement preparation failed.
    #[error("failed to {operation}")]
    Sqlite {
        /// Description of the failed operation.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Reading the current maximum id of a table failed.
    #[error("failed to read id watermark from {table}")]
    Watermark {
        /// Table whose watermark could not be read.
        table: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// A SQLite session over the normalized system tables.
#[derive(Debug)]
pub struct SystemStore {
    connection: Connection,
    suffix: String,
    read_waiting: Option<Arc<AtomicBool>>,
}

impl SystemStore {
    /// Open (or create) the system database at the supplied path.
    ///
    /// # Errors
    /// Returns [`StoreError::Open`] when the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_connection(connection))
    }

    /// Open a transient in-memory store, mostly useful for tests and
    /// dry runs.
    ///
    /// # Errors
    /// Returns [`StoreError::Open`] when SQLite refuses the connection.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Ok(Self::from_connection(connection))
    }

    fn from_connection(connection: Connection) -> Self {
        Self {
            connection,
            suffix: String::new(),
            read_waiting: None,
        }
    }

    /// Redirect all reads and writes to an alternate table set by
    /// appending `suffix` to every table name.
    #[must_use]
    pub fn with_table_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Attach the advisory flag reader sessions raise while they wait for
    /// the write path to yield.
    #[must_use]
    pub fn with_read_waiting_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.read_waiting = Some(flag);
        self
    }

    /// Create the normalized system tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns [`StoreError::Schema`] naming the failed step.
    pub fn initialise(&mut self) -> Result<(), StoreError> {
        schema::create_current(&mut self.connection, &self.suffix)
    }

    /// Create the prior-generation flat tables consumed (and, in tests,
    /// seeded) by the legacy migration driver.
    ///
    /// # Errors
    /// Returns [`StoreError::Schema`] naming the failed step.
    pub fn initialise_legacy(&mut self) -> Result<(), StoreError> {
        schema::create_legacy(&mut self.connection)
    }

    /// Whether another session has signalled that it is waiting to read.
    #[must_use]
    pub fn readers_waiting(&self) -> bool {
        self.read_waiting
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Suffixed name of one of the store's tables.
    pub(crate) fn table(&self, base: &str) -> String {
        format!("{base}{}", self.suffix)
    }

    /// Current maximum id in a table, or zero when it is empty.
    ///
    /// # Errors
    /// Returns [`StoreError::Watermark`] when the scan fails.
    pub fn max_row_id(&self, base: &str) -> Result<i64, StoreError> {
        let table = self.table(base);
        self.connection
            .query_row(&format!("SELECT IFNULL(MAX(id), 0) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map_err(|source| StoreError::Watermark { table, source })
    }

    /// Point lookup of a sector by exact name and grid cell.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the lookup fails.
    pub fn find_sector_id(&self, name: &str, grid_id: u16) -> Result<Option<i64>, StoreError> {
        let sectors = self.table("Sectors");
        let mut statement = self
            .connection
            .prepare_cached(&format!(
                "SELECT id FROM {sectors} WHERE name = ?1 AND gridid = ?2"
            ))
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare sector lookup",
                source,
            })?;
        statement
            .query_row((name, grid_id), |row| row.get(0))
            .optional()
            .map_err(|source| StoreError::Sqlite {
                operation: "look up sector",
                source,
            })
    }

    /// Borrow the underlying connection, e.g. for ad-hoc queries.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }
}
