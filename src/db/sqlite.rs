//! SQLite session backed by `rusqlite`.

use crate::db::{Dialect, Session, SqlValue};
use crate::error::DbError;
use rusqlite::types::Value as SqliteValue;
use rusqlite::{params_from_iter, Connection, ErrorCode};

pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    /// Open (or create) a database file. `:memory:` opens a private
    /// in-memory database.
    pub fn open(path: &str) -> Result<Self, DbError> {
        tracing::info!(path = %path, "opening SQLite database");
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| {
            DbError::connection(format!("failed to open SQLite database {}: {}", path, e))
        })?;

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| DbError::connection(format!("failed to enable foreign keys: {}", e)))?;

        Ok(SqliteSession { conn })
    }

    pub fn in_memory() -> Result<Self, DbError> {
        Self::open(":memory:")
    }

    /// Borrow the underlying connection, e.g. for inspection in tests
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn to_sqlite(value: &SqlValue) -> SqliteValue {
    match value {
        SqlValue::Null => SqliteValue::Null,
        SqlValue::Int(i) => SqliteValue::Integer(*i),
        SqlValue::Float(f) => SqliteValue::Real(*f),
        SqlValue::Text(s) => SqliteValue::Text(s.clone()),
    }
}

fn classify(err: rusqlite::Error) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => DbError::constraint(err.to_string()),
            ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::SystemIoFailure => {
                DbError::connection(err.to_string())
            }
            _ => DbError::statement(err.to_string()),
        },
        _ => DbError::statement(err.to_string()),
    }
}

impl Session for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        tracing::trace!(sql, "executing statement");
        self.conn.execute_batch(sql).map_err(classify)
    }

    fn insert(&mut self, sql: &str, params: &[SqlValue]) -> Result<i64, DbError> {
        tracing::trace!(sql, params = params.len(), "executing insert");
        self.conn
            .execute(sql, params_from_iter(params.iter().map(to_sqlite)))
            .map_err(classify)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn close(self: Box<Self>) -> Result<(), DbError> {
        self.conn
            .close()
            .map_err(|(_, e)| {
                DbError::connection(format!("failed to close SQLite database: {}", e))
            })
    }
}
