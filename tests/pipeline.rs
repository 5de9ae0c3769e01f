use ingot::db::SqliteSession;
use ingot::{ingest_jsonl, run_load, DbSettings, IngotError, LoadConfig, LoadJob, ProgressReporter};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

const MAPPING: &str = "\
Column Name,Target Table
city,property
price,property
listed,property
name,amenities
beds,details
baths,details
";

const LISTINGS: &str = concat!(
    r#"{"city": "Austin", "price": 410000, "amenities": [{"name": "pool"}, {"name": "gym"}], "#,
    r#""details": {"beds": 3, "baths": 2}}"#,
    "\n",
    r#"{"city": "Boise", "price": 299999.5, "amenities": "none", "name": "rooftop"}"#,
    "\n",
    "this line is not json\n",
    r#"{"city": "Reno", "details": {}, "listed": "2024-03-01"}"#,
    "\n",
);

struct Fixture {
    _dir: tempfile::TempDir,
    mapping: PathBuf,
    jsonl: PathBuf,
    database: PathBuf,
}

fn fixture(listings: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mapping = dir.path().join("fields.csv");
    let jsonl = dir.path().join("listings.jsonl");
    fs::write(&mapping, MAPPING).unwrap();
    fs::write(&jsonl, listings).unwrap();
    let database = dir.path().join("ingot.db");
    Fixture {
        _dir: dir,
        mapping,
        jsonl,
        database,
    }
}

fn job(fx: &Fixture) -> LoadJob {
    LoadJob {
        jsonl: fx.jsonl.clone(),
        mapping: fx.mapping.clone(),
        config: LoadConfig::default(),
        show_progress: false,
    }
}

fn sqlite_settings(path: &Path) -> DbSettings {
    DbSettings::Sqlite {
        path: path.to_string_lossy().into_owned(),
    }
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}

#[test]
fn test_full_load_against_sqlite_file() {
    let fx = fixture(LISTINGS);
    let summary = run_load(&job(&fx), &sqlite_settings(&fx.database)).unwrap();

    assert_eq!(summary.lines_read, 4);
    assert_eq!(summary.records_processed, 3);
    assert_eq!(summary.malformed_lines, 1);
    assert_eq!(summary.root_failures, 0);
    // two amenities, one details row, one rooftop fallback row
    assert_eq!(summary.child_rows_written, 4);

    let conn = Connection::open(&fx.database).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM property"), 3);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM details"), 1);

    let austin: i64 = conn
        .query_row("SELECT id FROM property WHERE city = 'Austin'", [], |r| r.get(0))
        .unwrap();
    let pool_owner: i64 = conn
        .query_row("SELECT property_id FROM amenities WHERE name = 'pool'", [], |r| r.get(0))
        .unwrap();
    let gym_owner: i64 = conn
        .query_row("SELECT property_id FROM amenities WHERE name = 'gym'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(pool_owner, austin);
    assert_eq!(gym_owner, austin);

    let rooftop_owner: String = conn
        .query_row(
            "SELECT p.city FROM amenities a JOIN property p ON p.id = a.property_id \
             WHERE a.name = 'rooftop'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(rooftop_owner, "Boise");
}

#[test]
fn test_inferred_column_types() {
    let fx = fixture(LISTINGS);
    run_load(&job(&fx), &sqlite_settings(&fx.database)).unwrap();

    let conn = Connection::open(&fx.database).unwrap();
    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info('property')").unwrap();
    let columns: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let type_of = |name: &str| {
        columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.clone())
            .unwrap()
    };
    assert_eq!(type_of("id"), "INTEGER");
    assert_eq!(type_of("city"), "VARCHAR(32)");
    assert_eq!(type_of("price"), "DOUBLE");
    assert_eq!(type_of("listed"), "VARCHAR(32)");
    assert!(columns.iter().all(|(n, _)| n != "property_id"));

    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info('details')").unwrap();
    let details: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let names: Vec<&str> = details.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["id", "property_id", "beds", "baths"]);
    assert_eq!(details[2].1, "BIGINT");
}

#[test]
fn test_rerun_reuses_tables() {
    let fx = fixture(LISTINGS);
    run_load(&job(&fx), &sqlite_settings(&fx.database)).unwrap();
    let second = run_load(&job(&fx), &sqlite_settings(&fx.database)).unwrap();
    assert_eq!(second.records_processed, 3);

    let conn = Connection::open(&fx.database).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM property"), 6);
    assert_eq!(
        count(
            &conn,
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'amenities'",
        ),
        1
    );
}

#[test]
fn test_rejected_child_row_keeps_siblings_and_root() {
    let fx = fixture(LISTINGS);
    let table_map = ingot::load_table_map(&fx.mapping, &LoadConfig::default()).unwrap();
    let mut session = SqliteSession::in_memory().unwrap();

    // tables exist up front so the trigger can be attached before loading
    session
        .connection()
        .execute_batch(
            "CREATE TABLE amenities (id INTEGER PRIMARY KEY AUTOINCREMENT,
                 property_id BIGINT NULL, name VARCHAR(32) NULL);
             CREATE TRIGGER no_gym BEFORE INSERT ON amenities
             WHEN NEW.name = 'gym' BEGIN SELECT RAISE(ABORT, 'gym rejected'); END;",
        )
        .unwrap();

    let summary = ingest_jsonl(
        &mut session,
        &fx.jsonl,
        &table_map,
        &LoadConfig::default(),
        &ProgressReporter::hidden(),
    )
    .unwrap();

    assert_eq!(summary.records_processed, 3);
    assert_eq!(summary.child_rows_failed, 1);
    let conn = session.connection();
    assert_eq!(count(conn, "SELECT COUNT(*) FROM amenities WHERE name = 'pool'"), 1);
    assert_eq!(count(conn, "SELECT COUNT(*) FROM amenities WHERE name = 'gym'"), 0);
    assert_eq!(count(conn, "SELECT COUNT(*) FROM property WHERE city = 'Austin'"), 1);
}

#[test]
fn test_mapping_without_root_table_fails_before_connecting() {
    let fx = fixture(LISTINGS);
    fs::write(&fx.mapping, "column_name,target_table\nbeds,details\n").unwrap();

    let err = run_load(&job(&fx), &sqlite_settings(&fx.database)).unwrap_err();
    assert!(matches!(err, IngotError::MissingRootTable(ref t) if t == "property"));
    assert!(!fx.database.exists());
}

#[test]
fn test_mapping_with_unknown_headers_lists_them() {
    let fx = fixture(LISTINGS);
    fs::write(&fx.mapping, "field,destination\ncity,property\n").unwrap();

    let err = run_load(&job(&fx), &sqlite_settings(&fx.database)).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("field"), "{}", message);
    assert!(message.contains("destination"), "{}", message);
}

#[test]
fn test_custom_root_table() {
    let fx = fixture("{\"title\": \"Loft\", \"photos\": [{\"url\": \"a.jpg\"}]}\n");
    fs::write(&fx.mapping, "Column Name,Target Table\ntitle,listing\nurl,photos\n").unwrap();

    let mut job = job(&fx);
    job.config = LoadConfig::default().with_root_table("listing");
    let summary = run_load(&job, &sqlite_settings(&fx.database)).unwrap();
    assert_eq!(summary.child_rows_written, 1);

    let conn = Connection::open(&fx.database).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM photos WHERE listing_id IS NOT NULL"), 1);
}
