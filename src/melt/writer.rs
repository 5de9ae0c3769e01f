use crate::db::{Session, SqlValue};
use crate::error::DbError;
use crate::types::{Row, ShreddedRecord};
use std::collections::HashSet;

const ROW_SAVEPOINT: &str = "ingot_row";

/// What happened to one source record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Root row inserted and the record committed; some children may have
    /// been dropped
    Committed {
        root_id: i64,
        children_written: usize,
        children_failed: usize,
    },
    /// Root row could not be inserted; no child rows were attempted
    RootFailed(DbError),
    /// Rows were attempted but the commit failed and was rolled back
    CommitFailed(DbError),
}

/// Writes shredded records through a session, one transaction per record
#[derive(Debug, Clone)]
pub struct RowWriter {
    reference_column: String,
    usable_tables: Option<HashSet<String>>,
}

impl RowWriter {
    pub fn new(reference_column: impl Into<String>) -> Self {
        RowWriter {
            reference_column: reference_column.into(),
            usable_tables: None,
        }
    }

    /// Restrict writes to tables that were actually created. Rows for other
    /// tables are dropped without touching the database.
    pub fn with_usable_tables(mut self, tables: HashSet<String>) -> Self {
        self.usable_tables = Some(tables);
        self
    }

    fn is_usable(&self, table: &str) -> bool {
        self.usable_tables
            .as_ref()
            .map_or(true, |tables| tables.contains(table))
    }

    /// Insert the root row, then every child row bound to the root key, and
    /// commit once.
    ///
    /// Returns `Err` only for connection-class failures, which leave the
    /// session unusable. Every other failure is reported in the outcome.
    pub fn write_record<S>(
        &self,
        session: &mut S,
        record: ShreddedRecord,
    ) -> Result<RecordOutcome, DbError>
    where
        S: Session + ?Sized,
    {
        let ShreddedRecord { root, children } = record;

        if let Err(e) = session.begin() {
            if e.is_fatal() {
                return Err(e);
            }
            return Ok(RecordOutcome::RootFailed(e));
        }

        let root_id = match insert_row(session, &root) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    table = %root.table,
                    row = %describe(&root),
                    error = %e,
                    "root insert failed; skipping record"
                );
                rollback(session)?;
                if e.is_fatal() {
                    return Err(e);
                }
                return Ok(RecordOutcome::RootFailed(e));
            }
        };

        let mut children_written = 0;
        let mut children_failed = 0;
        for mut row in children {
            if !self.is_usable(&row.table) {
                tracing::warn!(table = %row.table, "table unavailable; dropping row");
                children_failed += 1;
                continue;
            }

            row.bind_root(&self.reference_column, root_id);
            match self.write_child(session, &row)? {
                true => children_written += 1,
                false => children_failed += 1,
            }
        }

        if let Err(e) = session.commit() {
            tracing::warn!(root_id, error = %e, "commit failed; rolling back record");
            rollback(session)?;
            if e.is_fatal() {
                return Err(e);
            }
            return Ok(RecordOutcome::CommitFailed(e));
        }

        Ok(RecordOutcome::Committed {
            root_id,
            children_written,
            children_failed,
        })
    }

    /// Insert one child row inside a savepoint so a failure only undoes
    /// this row. Returns whether the row was written.
    fn write_child<S>(&self, session: &mut S, row: &Row) -> Result<bool, DbError>
    where
        S: Session + ?Sized,
    {
        if let Err(e) = session.savepoint(ROW_SAVEPOINT) {
            if e.is_fatal() {
                return Err(e);
            }
            tracing::warn!(
                table = %row.table,
                row = %describe(row),
                error = %e,
                "could not open savepoint; dropping row"
            );
            return Ok(false);
        }

        match insert_row(session, row) {
            Ok(_) => {
                session.release(ROW_SAVEPOINT).or_else(ignore_recoverable)?;
                Ok(true)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(
                    table = %row.table,
                    row = %describe(row),
                    error = %e,
                    "insert failed; dropping row"
                );
                session.rollback_to(ROW_SAVEPOINT).or_else(ignore_recoverable)?;
                session.release(ROW_SAVEPOINT).or_else(ignore_recoverable)?;
                Ok(false)
            }
        }
    }
}

fn insert_row<S>(session: &mut S, row: &Row) -> Result<i64, DbError>
where
    S: Session + ?Sized,
{
    let columns: Vec<&str> = row.values.keys().map(String::as_str).collect();
    let params: Vec<SqlValue> = row.values.values().map(SqlValue::from).collect();
    let sql = session.dialect().insert(&row.table, &columns);
    session.insert(&sql, &params)
}

fn rollback<S>(session: &mut S) -> Result<(), DbError>
where
    S: Session + ?Sized,
{
    session.rollback().or_else(ignore_recoverable)
}

fn ignore_recoverable(e: DbError) -> Result<(), DbError> {
    if e.is_fatal() {
        return Err(e);
    }
    tracing::debug!(error = %e, "ignoring transaction control failure");
    Ok(())
}

fn describe(row: &Row) -> String {
    serde_json::to_string(&row.values).unwrap_or_else(|_| format!("{:?}", row.values))
}
