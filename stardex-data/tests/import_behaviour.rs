//! Behavioural tests for the catalogue import entry points.
//!
//! These exercise the public surface end to end: stream decode, identity
//! resolution, block commits and the migration driver, all against real
//! SQLite databases.

use std::cell::Cell;
use std::fs;
use std::io::Write;

use chrono::{TimeZone, Utc};
use rstest::{fixture, rstest};
use stardex_core::{GRID_CELLS, ProcgenClassifier, grid_id};
use stardex_data::{
    ImportError, ImportOptions, ImportOutcome, MigrateOptions, SystemStore, import_file,
    import_str, migrate_legacy,
};

const SOL: &str =
    r#"{"id":1,"name":"Sol","date":"2017-03-01T12:00:00Z","coords":{"x":0,"y":0,"z":0}}"#;

#[fixture]
fn store() -> SystemStore {
    let mut store = SystemStore::open_in_memory().expect("open in-memory store");
    store.initialise().expect("create schema");
    store
}

fn run_import(store: &mut SystemStore, dump: &str, options: &ImportOptions) -> ImportOutcome {
    let never = || false;
    import_str(store, dump, &ProcgenClassifier, options, None, &never, |_| {})
        .expect("import should succeed")
}

fn count(store: &SystemStore, sql: &str) -> i64 {
    store
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .expect("count query")
}

#[rstest]
fn imports_a_single_custom_named_system(mut store: SystemStore) {
    let outcome = run_import(&mut store, &format!("[{SOL}]"), &ImportOptions::default());

    assert_eq!(outcome.total(), 1);
    assert_eq!(
        outcome.latest_date,
        Utc.with_ymd_and_hms(2017, 3, 1, 12, 0, 0).single()
    );
    assert_eq!(count(&store, "SELECT COUNT(*) FROM Systems"), 1);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM Sectors"), 1);

    let cell: u16 = store
        .connection()
        .query_row("SELECT gridid FROM Sectors", [], |row| row.get(0))
        .expect("sector cell");
    assert_eq!(cell, grid_id(0, 0));
}

#[rstest]
fn a_duplicate_external_id_keeps_the_later_coordinates(mut store: SystemStore) {
    let first = r#"{"id":1,"name":"Sol","coords":{"x":0,"y":0,"z":0}}"#;
    let second = r#"{"id":1,"name":"Sol","coords":{"x":1,"y":0,"z":0}}"#;
    let outcome = run_import(
        &mut store,
        &format!("[{first},{second}]"),
        &ImportOptions::default(),
    );

    // Both rows are written; the second replaces the first.
    assert_eq!(outcome.total(), 2);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM Systems"), 1);
    let x: i64 = store
        .connection()
        .query_row("SELECT x FROM Systems WHERE edsmid = 1", [], |row| {
            row.get(0)
        })
        .expect("replaced row");
    assert_eq!(x, 128);
}

#[rstest]
fn a_repeat_import_reuses_committed_sectors(mut store: SystemStore) {
    run_import(&mut store, &format!("[{SOL}]"), &ImportOptions::default());
    run_import(&mut store, &format!("[{SOL}]"), &ImportOptions::default());

    assert_eq!(count(&store, "SELECT COUNT(*) FROM Sectors"), 1);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM Systems"), 1);
}

#[rstest]
fn a_standard_name_packs_into_its_id(mut store: SystemStore) {
    let dump = r#"[{"id":7,"name":"Synuefe XR-H d11-102","coords":{"x":0,"y":0,"z":0}}]"#;
    run_import(&mut store, dump, &ImportOptions::default());

    // No Names row: the name reconstructs from the id alone.
    assert_eq!(count(&store, "SELECT COUNT(*) FROM Names"), 0);
    let name_id: i64 = store
        .connection()
        .query_row("SELECT nameid FROM Systems WHERE edsmid = 7", [], |row| {
            row.get(0)
        })
        .expect("name id");
    assert!(name_id & (1_i64 << 62) != 0, "marker bit must be set");
}

#[rstest]
fn custom_name_ids_are_strictly_increasing(mut store: SystemStore) {
    let dump = r#"[
        {"id":1,"name":"Sol","coords":{"x":0,"y":0,"z":0}},
        {"id":2,"name":"Beagle Point","coords":{"x":-8.5,"y":0,"z":65000}}
    ]"#;
    run_import(&mut store, dump, &ImportOptions::default());

    let ids: Vec<i64> = store
        .connection()
        .prepare("SELECT id FROM Names ORDER BY id")
        .expect("prepare")
        .query_map([], |row| row.get(0))
        .expect("query")
        .collect::<Result<_, _>>()
        .expect("collect");
    assert_eq!(ids, vec![1, 2]);
}

#[rstest]
fn the_grid_allow_list_confines_the_import(mut store: SystemStore) {
    let mut allow = vec![false; usize::from(GRID_CELLS)];
    allow[usize::from(grid_id(0, 0))] = true;
    let options = ImportOptions {
        grid_allow: Some(allow),
        ..ImportOptions::default()
    };

    let far = r#"{"id":2,"name":"Far Away","coords":{"x":20000,"y":0,"z":20000}}"#;
    let outcome = run_import(&mut store, &format!("[{SOL},{far}]"), &options);

    assert_eq!(outcome.total(), 1);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM Systems"), 1);
}

#[rstest]
fn cancellation_commits_staged_rows_and_reports_negative(mut store: SystemStore) {
    // Fires after the first record has been staged.
    let polls = Cell::new(0_u32);
    let cancel = || {
        polls.set(polls.get() + 1);
        polls.get() > 1
    };

    let outcome = import_str(
        &mut store,
        &format!("[{SOL},{SOL}]"),
        &ProcgenClassifier,
        &ImportOptions::default(),
        None,
        &cancel,
        |_| {},
    )
    .expect("cancelled import still succeeds");

    assert!(outcome.cancelled);
    assert_eq!(outcome.total(), -1);
    assert_eq!(outcome.rows_written, 1);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM Systems"), 1);
}

#[rstest]
fn a_table_suffix_redirects_the_whole_import() {
    let mut store = SystemStore::open_in_memory()
        .expect("open in-memory store")
        .with_table_suffix("_new");
    store.initialise().expect("create schema");

    run_import(&mut store, &format!("[{SOL}]"), &ImportOptions::default());

    assert_eq!(count(&store, "SELECT COUNT(*) FROM Systems_new"), 1);
    assert_eq!(
        count(
            &store,
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'Systems'"
        ),
        0
    );
}

#[rstest]
fn the_debug_trace_records_one_line_per_row(mut store: SystemStore) {
    let mut trace = Vec::new();
    let never = || false;
    import_str(
        &mut store,
        &format!("[{SOL}]"),
        &ProcgenClassifier,
        &ImportOptions::default(),
        Some(&mut trace as &mut dyn Write),
        &never,
        |_| {},
    )
    .expect("import should succeed");

    let text = String::from_utf8(trace).expect("trace is utf8");
    assert_eq!(text, format!("Sol 0,0,0, EDSM:1 Grid:{}\n", grid_id(0, 0)));
}

#[rstest]
fn the_starting_date_floors_the_watermark(mut store: SystemStore) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
    let options = ImportOptions {
        start_date: start,
        ..ImportOptions::default()
    };

    // The dump's own dates are older than the starting date.
    let outcome = run_import(&mut store, &format!("[{SOL}]"), &options);
    assert_eq!(outcome.latest_date, start);
}

#[rstest]
fn a_zero_block_size_still_completes(mut store: SystemStore) {
    let options = ImportOptions {
        block_size: 0,
        ..ImportOptions::default()
    };
    let outcome = run_import(&mut store, &format!("[{SOL}]"), &options);
    assert_eq!(outcome.total(), 1);
    assert!(!outcome.cancelled);
}

#[rstest]
fn the_record_limit_caps_a_run(mut store: SystemStore) {
    let options = ImportOptions {
        record_limit: Some(1),
        ..ImportOptions::default()
    };
    let outcome = run_import(&mut store, &format!("[{SOL},{SOL}]"), &options);
    assert_eq!(outcome.total(), 1);
}

#[rstest]
fn imports_from_a_file_on_disk() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let dump_path = dir.path().join("dump.json");
    fs::write(&dump_path, format!("[{SOL}]")).expect("write dump");
    let db_path = dir.path().join("systems.db");

    let mut store = SystemStore::open(&db_path).expect("open database");
    store.initialise().expect("create schema");
    let never = || false;
    let outcome = import_file(
        &mut store,
        &dump_path,
        &ProcgenClassifier,
        &ImportOptions::default(),
        None,
        &never,
        |_| {},
    )
    .expect("import should succeed");
    assert_eq!(outcome.total(), 1);
    drop(store);

    // The rows survive reopening the database.
    let reopened = SystemStore::open(&db_path).expect("reopen database");
    assert_eq!(count(&reopened, "SELECT COUNT(*) FROM Systems"), 1);
}

#[rstest]
fn a_missing_catalogue_file_is_reported(mut store: SystemStore) {
    let never = || false;
    let err = import_file(
        &mut store,
        std::path::Path::new("/nonexistent/dump.json"),
        &ProcgenClassifier,
        &ImportOptions::default(),
        None,
        &never,
        |_| {},
    )
    .expect_err("open should fail");
    assert!(matches!(err, ImportError::OpenInput { .. }));
}

#[rstest]
fn migrates_a_legacy_database_end_to_end() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db_path = dir.path().join("systems.db");

    let mut store = SystemStore::open(&db_path).expect("open database");
    store.initialise().expect("create schema");
    store.initialise_legacy().expect("create legacy schema");
    store
        .connection()
        .execute(
            "INSERT INTO EdsmSystems (EdsmId, x, y, z, GridId, UpdateTimestamp)
                VALUES (1, 0, 0, 0, ?1, 86400)",
            [grid_id(0, 0)],
        )
        .expect("seed legacy system");
    store
        .connection()
        .execute("INSERT INTO SystemNames (EdsmId, Name) VALUES (1, 'Sol')", [])
        .expect("seed legacy name");

    let never = || false;
    let outcome = migrate_legacy(
        &mut store,
        &ProcgenClassifier,
        &MigrateOptions::default(),
        &never,
        |_| {},
    )
    .expect("migration should succeed");

    assert_eq!(outcome.total(), 1);
    assert_eq!(
        outcome.latest_date,
        Utc.with_ymd_and_hms(2015, 1, 2, 0, 0, 0).single()
    );
    assert_eq!(count(&store, "SELECT COUNT(*) FROM Systems"), 1);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM Names"), 1);
}
