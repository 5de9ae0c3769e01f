//! # Ingot - JSON Lines to relational tables
//!
//! Loads newline-delimited JSON records into a relational database. A field
//! mapping assigns every source column to a target table; one table is the
//! root. The loader infers column types from a sample of the input, creates
//! the tables, then splits every record into one root row and any number of
//! child rows that reference it.
//!
//! ## Modules
//!
//! - **mapping**: field mapping file → [`TableMap`]
//! - **schema**: type inference, schema planning and table creation
//! - **melt**: record shredding and per-record inserts
//! - **source**: JSON Lines reading
//! - **db**: database sessions (MySQL, SQLite) and SQL rendering
//! - **recover**: salvaging objects from a damaged export
//!
//! ## Quick Start
//!
//! ```rust
//! use ingot::melt::{RecordShredder, ShredPlan};
//! use ingot::{LoadConfig, TableMap};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let map = TableMap::from_pairs([("city", "property"), ("name", "amenities")]);
//! let shredder = RecordShredder::new(ShredPlan::new(&map, &LoadConfig::default())?);
//!
//! let record = json!({"city": "Austin", "amenities": [{"name": "pool"}, {"name": "gym"}]});
//! let rows = shredder.shred(record.as_object().unwrap());
//!
//! assert_eq!(rows.root.values["city"], "Austin");
//! assert_eq!(rows.children.len(), 2);
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod melt;
pub mod progress;
pub mod recover;
pub mod schema;
pub mod source;
pub mod types;

pub use config::DbSettings;
pub use db::{open_session, Session};
pub use error::{IngotError, Result};
pub use melt::{RecordOutcome, RecordShredder, RowWriter, ShredPlan};
pub use progress::ProgressReporter;
pub use schema::{materialize_schema, SchemaBuilder, SchemaPlan};
pub use source::{RecordReader, SourceLine};
pub use types::{LoadConfig, Row, ShreddedRecord, TableMap};

/// Counts reported at the end of a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Physical input lines consumed
    pub lines_read: usize,
    /// Records whose root row was inserted and whose commit was attempted
    pub records_processed: usize,
    /// Records that were committed
    pub records_committed: usize,
    pub malformed_lines: usize,
    pub root_failures: usize,
    pub child_rows_written: usize,
    pub child_rows_failed: usize,
    pub commit_failures: usize,
}

/// Inputs of one load run
#[derive(Debug, Clone)]
pub struct LoadJob {
    pub jsonl: PathBuf,
    pub mapping: PathBuf,
    pub config: LoadConfig,
    pub show_progress: bool,
}

/// Read the field mapping and group it by table
pub fn load_table_map(path: &Path, config: &LoadConfig) -> Result<TableMap> {
    let mappings = mapping::read_field_mapping(path)?;
    let table_map = mapping::build_table_map(&mappings, config);
    tracing::info!(
        path = %path.display(),
        columns = mappings.len(),
        tables = table_map.len(),
        "field mapping loaded"
    );
    Ok(table_map)
}

/// Sample the input and plan the schema.
///
/// Sample records are shredded with the same plan used for loading, so each
/// column is typed from the values that will actually land in it.
pub fn plan_schema(
    jsonl: &Path,
    shredder: &RecordShredder,
    config: &LoadConfig,
    table_map: &TableMap,
) -> Result<SchemaPlan> {
    let sample = source::read_sample(jsonl, config.sample_lines)?;

    let mut builder = SchemaBuilder::new(config.clone());
    for record in &sample {
        builder.add_record(&shredder.shred(record));
    }

    let plan = builder.build(table_map);
    tracing::info!(
        records = sample.len(),
        rows = builder.rows_seen(),
        tables = plan.tables.len(),
        "schema planned from sample"
    );
    match serde_json::to_string(&plan) {
        Ok(json) => tracing::debug!(plan = %json, "planned schema"),
        Err(e) => tracing::debug!(error = %e, "planned schema not serializable"),
    }
    Ok(plan)
}

/// Drive every line of `reader` through the shredder and writer.
///
/// Malformed lines, root failures and dropped child rows are counted and
/// skipped. Only a read failure or a lost connection stops the load.
pub fn load_records<S, R>(
    session: &mut S,
    reader: &mut RecordReader<R>,
    shredder: &RecordShredder,
    writer: &RowWriter,
    progress: &ProgressReporter,
) -> Result<LoadSummary>
where
    S: Session + ?Sized,
    R: BufRead,
{
    let mut summary = LoadSummary::default();

    while let Some(line) = reader.next() {
        let line = line.map_err(|source| IngotError::Input {
            path: reader.path().to_path_buf(),
            source,
        })?;

        let (line_no, record) = match line {
            SourceLine::Record(line_no, record) => (line_no, record),
            SourceLine::Malformed(line_no, e) => {
                tracing::debug!(line = line_no, error = %e, "skipping malformed line");
                summary.malformed_lines += 1;
                continue;
            }
        };

        let outcome = writer
            .write_record(session, shredder.shred(&record))
            .map_err(|e| {
                tracing::error!(
                    line = line_no,
                    error = %e,
                    "database connection lost; aborting load"
                );
                IngotError::Db(e)
            })?;

        match outcome {
            RecordOutcome::Committed {
                children_written,
                children_failed,
                ..
            } => {
                summary.records_processed += 1;
                summary.records_committed += 1;
                summary.child_rows_written += children_written;
                summary.child_rows_failed += children_failed;
            }
            RecordOutcome::RootFailed(e) => {
                tracing::warn!(line = line_no, error = %e, "record skipped");
                summary.root_failures += 1;
            }
            RecordOutcome::CommitFailed(e) => {
                tracing::warn!(line = line_no, error = %e, "record rolled back");
                summary.records_processed += 1;
                summary.commit_failures += 1;
            }
        }
        progress.inc();
    }

    summary.lines_read = reader.lines_read();
    Ok(summary)
}

/// Create the schema for `table_map` and load `jsonl` through `session`
pub fn ingest_jsonl<S>(
    session: &mut S,
    jsonl: &Path,
    table_map: &TableMap,
    config: &LoadConfig,
    progress: &ProgressReporter,
) -> Result<LoadSummary>
where
    S: Session + ?Sized,
{
    let shredder = RecordShredder::new(ShredPlan::new(table_map, config)?);
    let plan = plan_schema(jsonl, &shredder, config, table_map)?;

    let schema = materialize_schema(session, &plan)?;
    if !schema.is_usable(&config.root_table) {
        return Err(IngotError::RootTableUnavailable(config.root_table.clone()));
    }
    tracing::info!(
        tables = schema.usable.len(),
        failed = schema.failed.len(),
        constraints = schema.constraints_added,
        "schema ready"
    );

    let writer =
        RowWriter::new(config.reference_column()).with_usable_tables(schema.usable_set());
    let mut reader = RecordReader::open(jsonl)?;
    let summary = load_records(session, &mut reader, &shredder, &writer, progress)?;
    progress.finish();

    tracing::info!(
        lines = summary.lines_read,
        records = summary.records_processed,
        malformed = summary.malformed_lines,
        root_failures = summary.root_failures,
        child_rows = summary.child_rows_written,
        "load finished"
    );
    Ok(summary)
}

/// Full run: read the mapping, connect, create the schema and load.
///
/// The mapping and root table are validated before any connection is made.
pub fn run_load(job: &LoadJob, settings: &DbSettings) -> Result<LoadSummary> {
    let table_map = load_table_map(&job.mapping, &job.config)?;
    ShredPlan::new(&table_map, &job.config)?;

    let mut session = open_session(settings)?;
    tracing::info!(settings = ?settings, "connected");

    let progress = ProgressReporter::new(job.show_progress);
    let result = ingest_jsonl(
        session.as_mut(),
        &job.jsonl,
        &table_map,
        &job.config,
        &progress,
    );
    progress.finish();

    let closed = session.close();
    let summary = result?;
    closed?;
    Ok(summary)
}
