//! Database connection settings.
//!
//! Settings come from the process environment, optionally backed by a
//! `.env` file. Variables already set in the environment take precedence over
//! the file. There are no built-in credential defaults: every missing value is
//! reported at once, before anything connects.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub const DB_DRIVER: &str = "DB_DRIVER";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASS: &str = "DB_PASS";
pub const DB_HOST: &str = "DB_HOST";
pub const DB_PORT: &str = "DB_PORT";
pub const DB_NAME: &str = "DB_NAME";

/// Resolved connection settings for one backend
#[derive(Clone, PartialEq, Eq)]
pub enum DbSettings {
    MySql {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
    Sqlite {
        path: String,
    },
}

impl DbSettings {
    /// Resolve settings from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve settings from the process environment, falling back to values
    /// read from an env file
    pub fn from_env_with_file(file: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_layers(|name| std::env::var(name).ok(), file)
    }

    /// `env` wins over `file` unless it is unset or empty
    pub fn from_layers<F>(env: F, file: &HashMap<String, String>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(|name| {
            env(name)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file.get(name).cloned())
        })
    }

    /// Resolve settings through an arbitrary lookup.
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let driver = get(DB_DRIVER).unwrap_or_else(|| "mysql".to_string());
        match driver.to_lowercase().as_str() {
            "mysql" | "mariadb" => {
                let required = [DB_USER, DB_PASS, DB_HOST, DB_PORT, DB_NAME];
                let missing: Vec<&'static str> =
                    required.into_iter().filter(|name| get(*name).is_none()).collect();
                if !missing.is_empty() {
                    return Err(ConfigError::MissingSettings(missing));
                }

                let value = |name: &str| get(name).unwrap_or_default();
                let raw_port = value(DB_PORT);
                let port = raw_port
                    .trim()
                    .parse::<u16>()
                    .map_err(|e| ConfigError::InvalidSetting {
                        name: DB_PORT,
                        value: raw_port.clone(),
                        reason: e.to_string(),
                    })?;

                Ok(DbSettings::MySql {
                    host: value(DB_HOST),
                    port,
                    user: value(DB_USER),
                    password: value(DB_PASS),
                    database: value(DB_NAME),
                })
            }
            "sqlite" => match get(DB_NAME) {
                Some(path) => Ok(DbSettings::Sqlite { path }),
                None => Err(ConfigError::MissingSettings(vec![DB_NAME])),
            },
            _ => Err(ConfigError::InvalidSetting {
                name: DB_DRIVER,
                value: driver.clone(),
                reason: "expected mysql or sqlite".to_string(),
            }),
        }
    }
}

/// Read `KEY=VALUE` pairs from a dotenv file without touching the process
/// environment
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let env_file_error = |source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    };
    dotenvy::from_path_iter(path)
        .map_err(env_file_error)?
        .map(|item| item.map_err(env_file_error))
        .collect()
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbSettings::MySql {
                host,
                port,
                user,
                database,
                ..
            } => f
                .debug_struct("MySql")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("password", &"***")
                .field("database", database)
                .finish(),
            DbSettings::Sqlite { path } => f.debug_struct("Sqlite").field("path", path).finish(),
        }
    }
}
