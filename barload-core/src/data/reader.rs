//! CSV loading into an in-memory record set.
//!
//! Reading is split from validation so the caller can do the file I/O however
//! it likes (the loader reads asynchronously) and hand the bytes over.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;
use thiserror::Error;

/// A parsed CSV file: header row plus every data row, untyped.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl RecordSet {
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Parse CSV bytes. Rows may have differing lengths; short rows surface later
/// as coercion errors naming the missing column.
///
/// Only header names are trimmed. Field values reach coercion as written, and
/// a row of empty fields is kept so it fails coercion like any other bad row.
pub fn read_records(bytes: &[u8]) -> Result<RecordSet, ReadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;

    Ok(RecordSet { headers, rows })
}

/// Read and parse a CSV file from disk.
pub fn read_file(path: &Path) -> Result<RecordSet, ReadError> {
    let bytes = std::fs::read(path)?;
    read_records(&bytes)
}
