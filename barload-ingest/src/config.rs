//! Loader configuration.
//!
//! Two values, both built once at process entry and passed by reference:
//! - `StoreConfig`: Postgres connection parameters from `POSTGRES_*`
//!   environment variables, with conventional local defaults.
//! - `LoaderConfig`: data root and the ordered timeframe → table mapping,
//!   optionally read from a TOML file.

use barload_core::domain::{TableNameError, TimeframeTable};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DATA_DIR: &str = "sp500_data";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    TableName(#[from] TableNameError),

    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("timeframe label {0:?} must be a single directory name")]
    InvalidLabel(String),

    #[error("timeframe {0:?} is mapped more than once")]
    DuplicateTimeframe(String),

    #[error("no timeframes configured")]
    NoTimeframes,
}

/// Postgres connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub user: String,
    pub password: String,
    /// Empty means the server default (the user's own database).
    pub database: String,
    pub host: String,
    pub port: u16,
    /// Pool size; also bounds how many files are ingested at once.
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
            database: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl StoreConfig {
    /// Load from the process environment.
    ///
    /// Environment variables:
    /// - `POSTGRES_USER` (default: postgres)
    /// - `POSTGRES_PASSWORD` (default: empty)
    /// - `POSTGRES_DB` (default: empty, server default)
    /// - `POSTGRES_HOST` (default: localhost)
    /// - `POSTGRES_PORT` (default: 5432)
    /// - `POSTGRES_MAX_CONNECTIONS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load through an arbitrary variable lookup; unset or empty values fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let port = match get("POSTGRES_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "POSTGRES_PORT",
                value: raw,
            })?,
            None => defaults.port,
        };

        let max_connections = match get("POSTGRES_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "POSTGRES_MAX_CONNECTIONS",
                        value: raw,
                    })
                }
            },
            None => defaults.max_connections,
        };

        Ok(Self {
            user: get("POSTGRES_USER").unwrap_or(defaults.user),
            password: lookup("POSTGRES_PASSWORD").unwrap_or(defaults.password),
            database: get("POSTGRES_DB").unwrap_or(defaults.database),
            host: get("POSTGRES_HOST").unwrap_or(defaults.host),
            port,
            max_connections,
        })
    }

    /// sqlx connect options. Built field by field so passwords with URL
    /// metacharacters need no escaping.
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user);
        if !self.password.is_empty() {
            opts = opts.password(&self.password);
        }
        if !self.database.is_empty() {
            opts = opts.database(&self.database);
        }
        opts
    }
}

/// Where the CSV files live and which table each timeframe loads into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Loaded in this order, one timeframe at a time.
    #[serde(default = "TimeframeTable::defaults")]
    pub timeframes: Vec<TimeframeTable>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            timeframes: TimeframeTable::defaults(),
        }
    }
}

impl LoaderConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: LoaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the mapping (command-line `LABEL=TABLE` overrides).
    pub fn with_timeframes(mut self, timeframes: Vec<TimeframeTable>) -> Result<Self, ConfigError> {
        self.timeframes = timeframes;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeframes.is_empty() {
            return Err(ConfigError::NoTimeframes);
        }
        let mut seen = HashSet::new();
        for tf in &self.timeframes {
            let single_component = Path::new(&tf.label).components().count() == 1
                && !tf.label.contains(['/', '\\'])
                && tf.label != "."
                && tf.label != "..";
            if tf.label.trim().is_empty() || !single_component {
                return Err(ConfigError::InvalidLabel(tf.label.clone()));
            }
            if !seen.insert(tf.label.as_str()) {
                return Err(ConfigError::DuplicateTimeframe(tf.label.clone()));
            }
        }
        Ok(())
    }
}
