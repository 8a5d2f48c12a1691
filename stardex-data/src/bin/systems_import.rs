//! Command-line driver for catalogue imports and legacy migration.
#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use stardex_data::{
    DEFAULT_BLOCK_SIZE, ImportError, ImportOptions, MigrateOptions, StoreError, SystemStore,
    import_file, migrate_legacy,
};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(
    name = "systems-import",
    about = "Import a star-system catalogue dump into a normalized SQLite store"
)]
struct Arguments {
    /// Path of the SQLite database to import into.
    database: PathBuf,
    /// Catalogue dump to read; omit with --from-legacy.
    catalogue: Option<PathBuf>,
    /// Rebuild from the prior-generation flat tables instead of a dump.
    #[arg(long)]
    from_legacy: bool,
    /// Write to a suffixed shadow table set instead of the live tables.
    #[arg(long, default_value = "")]
    table_suffix: String,
    /// Skip per-sector lookups because the target tables start empty.
    #[arg(long)]
    presume_empty: bool,
    /// Records staged per transaction.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
    /// Stop after this many records.
    #[arg(long)]
    limit: Option<u64>,
    /// Write one trace line per committed system row to this file.
    #[arg(long)]
    debug_trace: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("a catalogue path is required unless --from-legacy is set")]
    MissingCatalogue,
    #[error("failed to create trace file {path:?}")]
    CreateTrace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

fn main() {
    let arguments = Arguments::parse();
    if let Err(error) = run(&arguments) {
        eprintln!("systems-import: {error}");
        process::exit(1);
    }
}

fn run(arguments: &Arguments) -> Result<(), CliError> {
    if !arguments.from_legacy && arguments.catalogue.is_none() {
        return Err(CliError::MissingCatalogue);
    }

    let mut store =
        SystemStore::open(&arguments.database)?.with_table_suffix(&arguments.table_suffix);
    store.initialise()?;

    let never = || false;
    let progress = |line: &str| println!("{line}");

    let outcome = if arguments.from_legacy {
        let options = MigrateOptions {
            presume_empty: arguments.presume_empty,
            row_limit: arguments.limit,
            max_grid: None,
        };
        migrate_legacy(
            &mut store,
            &stardex_core::ProcgenClassifier,
            &options,
            &never,
            progress,
        )?
    } else {
        let catalogue = arguments
            .catalogue
            .as_deref()
            .ok_or(CliError::MissingCatalogue)?;
        let options = ImportOptions {
            presume_empty: arguments.presume_empty,
            block_size: arguments.block_size,
            record_limit: arguments.limit,
            ..ImportOptions::default()
        };
        let mut trace = arguments
            .debug_trace
            .as_deref()
            .map(|path| {
                File::create(path).map_err(|source| CliError::CreateTrace {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .transpose()?;
        import_file(
            &mut store,
            catalogue,
            &stardex_core::ProcgenClassifier,
            &options,
            trace.as_mut().map(|file| file as &mut dyn Write),
            &never,
            progress,
        )?
    };

    println!(
        "done: {} rows, latest record {}",
        outcome.total(),
        outcome
            .latest_date
            .map_or_else(|| "unknown".to_owned(), |date| date.to_rfc3339()),
    );
    Ok(())
}
