//! MySQL / MariaDB session backed by `mysql_async`.
//!
//! The loader is synchronous, so the session owns a current-thread Tokio
//! runtime and drives every call to completion with `block_on`. A single
//! connection (not a pool) is held for the whole run so that transaction and
//! savepoint statements always land on the same server session.

use crate::db::{Dialect, Session, SqlValue};
use crate::error::DbError;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Params};
use tokio::runtime::Runtime;

/// Server error codes that signal a constraint violation or duplicate constraint
const CONSTRAINT_CODES: [u16; 8] = [1022, 1062, 1216, 1217, 1451, 1452, 1826, 3780];

pub struct MySqlSession {
    runtime: Runtime,
    conn: Option<Conn>,
}

impl MySqlSession {
    /// Connect to a MySQL database
    pub fn connect(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        database: &str,
    ) -> Result<Self, DbError> {
        tracing::info!(
            host = %host,
            port = %port,
            database = %database,
            "connecting to MySQL database"
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbError::connection(format!("failed to start MySQL runtime: {}", e)))?;

        let opts: Opts = OptsBuilder::from_opts(Opts::default())
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(Some(user))
            .pass(Some(password))
            .db_name(Some(database))
            .into();

        let conn = runtime
            .block_on(Conn::new(opts))
            .map_err(|e| DbError::connection(format!("failed to connect to MySQL: {}", e)))?;

        tracing::info!(
            host = %host,
            port = %port,
            database = %database,
            "MySQL connection established"
        );
        Ok(MySqlSession {
            runtime,
            conn: Some(conn),
        })
    }
}

impl Drop for MySqlSession {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.disconnect()) {
                tracing::debug!(error = %e, "MySQL disconnect on drop failed");
            }
        }
    }
}

fn live(conn: &mut Option<Conn>) -> Result<&mut Conn, DbError> {
    conn.as_mut()
        .ok_or_else(|| DbError::connection("MySQL connection already closed"))
}

fn to_mysql(value: &SqlValue) -> mysql_async::Value {
    match value {
        SqlValue::Null => mysql_async::Value::NULL,
        SqlValue::Int(i) => mysql_async::Value::Int(*i),
        SqlValue::Float(f) => mysql_async::Value::Double(*f),
        SqlValue::Text(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
    }
}

fn classify(err: mysql_async::Error) -> DbError {
    match &err {
        mysql_async::Error::Server(server) if CONSTRAINT_CODES.contains(&server.code) => {
            DbError::constraint(err.to_string())
        }
        mysql_async::Error::Server(_) => DbError::statement(err.to_string()),
        mysql_async::Error::Io(_) | mysql_async::Error::Driver(_) => {
            DbError::connection(err.to_string())
        }
        _ => DbError::statement(err.to_string()),
    }
}

impl Session for MySqlSession {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        tracing::trace!(sql, "executing statement");
        let MySqlSession { runtime, conn } = self;
        let conn = live(conn)?;
        runtime.block_on(conn.query_drop(sql)).map_err(classify)
    }

    fn insert(&mut self, sql: &str, params: &[SqlValue]) -> Result<i64, DbError> {
        tracing::trace!(sql, params = params.len(), "executing insert");
        let params = if params.is_empty() {
            Params::Empty
        } else {
            Params::Positional(params.iter().map(to_mysql).collect())
        };

        let MySqlSession { runtime, conn } = self;
        let conn = live(conn)?;
        runtime.block_on(conn.exec_drop(sql, params)).map_err(classify)?;

        let id = conn
            .last_insert_id()
            .ok_or_else(|| DbError::statement("insert did not report a generated key"))?;
        i64::try_from(id)
            .map_err(|_| DbError::statement(format!("generated key {} exceeds BIGINT", id)))
    }

    fn close(mut self: Box<Self>) -> Result<(), DbError> {
        match self.conn.take() {
            Some(conn) => self
                .runtime
                .block_on(conn.disconnect())
                .map_err(|e| {
                    DbError::connection(format!("failed to close MySQL connection: {}", e))
                }),
            None => Ok(()),
        }
    }
}
