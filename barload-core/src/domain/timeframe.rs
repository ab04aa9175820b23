//! Timeframe → table mapping.
//!
//! A timeframe label names both a directory under the data root and, through
//! this mapping, the table its bars are loaded into. Table names end up
//! interpolated into SQL, so they only exist as validated identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid table name `{0}` (expected [schema.]table, each part matching [A-Za-z_][A-Za-z0-9_]*)")]
pub struct TableNameError(pub String);

/// A Postgres table identifier, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> Result<Self, TableNameError> {
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|p| is_pg_ident(p)) {
            return Err(TableNameError(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_pg_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TableName {
    type Err = TableNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TableName {
    type Error = TableNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

/// One entry of the timeframe mapping: `{data_dir}/{label}/*.csv` → `table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeTable {
    pub label: String,
    pub table: TableName,
}

impl TimeframeTable {
    pub fn new(label: impl Into<String>, table: TableName) -> Self {
        Self {
            label: label.into(),
            table,
        }
    }

    /// The default mapping, in load order: daily bars over two years, then
    /// hourly, then five-minute bars.
    pub fn defaults() -> Vec<TimeframeTable> {
        [("2y", "ohlcv_1d"), ("1h", "ohlcv_1h"), ("5m", "ohlcv_5m")]
            .into_iter()
            .map(|(label, table)| TimeframeTable {
                label: label.to_string(),
                table: TableName(table.to_string()),
            })
            .collect()
    }
}

impl FromStr for TimeframeTable {
    type Err = TableNameError;

    /// Parses `LABEL=TABLE`, the form used on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, table) = s
            .split_once('=')
            .ok_or_else(|| TableNameError(s.to_string()))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(TableNameError(s.to_string()));
        }
        Ok(Self::new(label, TableName::new(table.trim())?))
    }
}
