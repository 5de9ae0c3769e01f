//! Database sessions.
//!
//! A [`Session`] is one open connection, created once per run and passed
//! down explicitly. Transaction control is expressed through the session's
//! [`Dialect`] so every backend shares the same record/row scoping.

pub mod dialect;
pub mod mysql;
pub mod sqlite;

pub use dialect::Dialect;
pub use mysql::MySqlSession;
pub use sqlite::SqliteSession;

use crate::config::DbSettings;
use crate::error::DbError;
use serde_json::Value;

/// A bound statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Int(i64::from(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else if n.is_u64() {
                    // wider than BIGINT; keep every digit
                    SqlValue::Text(n.to_string())
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
        }
    }
}

/// An open database connection used for the whole run
pub trait Session {
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns no rows
    fn execute(&mut self, sql: &str) -> Result<(), DbError>;

    /// Run an insert and return the generated primary key
    fn insert(&mut self, sql: &str, params: &[SqlValue]) -> Result<i64, DbError>;

    /// Release the connection
    fn close(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }

    fn begin(&mut self) -> Result<(), DbError> {
        let sql = self.dialect().begin();
        self.execute(sql)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.execute("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.execute("ROLLBACK")
    }

    fn savepoint(&mut self, name: &str) -> Result<(), DbError> {
        let sql = self.dialect().savepoint(name);
        self.execute(&sql)
    }

    fn rollback_to(&mut self, name: &str) -> Result<(), DbError> {
        let sql = self.dialect().rollback_to(name);
        self.execute(&sql)
    }

    fn release(&mut self, name: &str) -> Result<(), DbError> {
        let sql = self.dialect().release(name);
        self.execute(&sql)
    }
}

/// Open the session described by `settings`
pub fn open_session(settings: &DbSettings) -> Result<Box<dyn Session>, DbError> {
    match settings {
        DbSettings::MySql {
            host,
            port,
            user,
            password,
            database,
        } => {
            let session = MySqlSession::connect(host, *port, user, password, database)?;
            Ok(Box::new(session))
        }
        DbSettings::Sqlite { path } => Ok(Box::new(SqliteSession::open(path)?)),
    }
}
