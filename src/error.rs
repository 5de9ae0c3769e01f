//! Error types for the loader.
//!
//! Each concern gets its own enum so callers can decide explicitly whether a
//! failure is fatal (startup), per table, per record, per row or per line.

use std::path::PathBuf;
use thiserror::Error;

/// Database settings could not be resolved from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "missing environment variables: {} (set them in the environment or a .env file)",
        .0.join(", ")
    )]
    MissingSettings(Vec<&'static str>),

    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// The field mapping resource could not be turned into a table map.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to read field mapping {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read field mapping workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("field mapping workbook {path} has no worksheets")]
    EmptyWorkbook { path: PathBuf },

    #[error("field mapping {path} is missing required columns; found columns: {found:?}")]
    MissingColumns { path: PathBuf, found: Vec<String> },
}

/// Classification of a database failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// The session is unusable (network, I/O, driver state).
    Connection,
    /// The statement violated a constraint (FK, unique, not-null).
    Constraint,
    /// Any other statement-level rejection (syntax, type, unknown table).
    Statement,
}

/// A tagged database failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind:?} error: {message}")]
pub struct DbError {
    pub kind: DbErrorKind,
    pub message: String,
}

impl DbError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: DbErrorKind::Connection,
            message: message.into(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self {
            kind: DbErrorKind::Constraint,
            message: message.into(),
        }
    }

    pub fn statement(message: impl Into<String>) -> Self {
        Self {
            kind: DbErrorKind::Statement,
            message: message.into(),
        }
    }

    /// Connection-class failures abort the run; everything else is recoverable.
    pub fn is_fatal(&self) -> bool {
        self.kind == DbErrorKind::Connection
    }
}

/// A sample value the type inferrer cannot reason about.
#[derive(Debug, Error)]
#[error("column {column}: unsupported sample value {value}")]
pub struct InferenceError {
    pub column: String,
    pub value: String,
}

/// One input line could not be decoded into a record.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Top-level failure of a load run.
#[derive(Debug, Error)]
pub enum IngotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("root table {0:?} is not defined in the field mapping")]
    MissingRootTable(String),

    #[error("root table {0:?} could not be created")]
    RootTableUnavailable(String),
}

pub type Result<T> = std::result::Result<T, IngotError>;
