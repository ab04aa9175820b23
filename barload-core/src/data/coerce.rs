//! Row coercion: one validated CSV record → one typed `OhlcvRecord`.
//!
//! A single bad value fails the whole file; there is no row-level partial
//! success. Timestamps never consult the local timezone: values without an
//! offset are UTC.

use crate::data::reader::RecordSet;
use crate::data::schema::ColumnIndex;
use crate::domain::OhlcvRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;
use thiserror::Error;

/// Formats carrying an explicit UTC offset (the downloader writes these).
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%:z",
];

/// Offset-less formats; interpreted as UTC. A trailing `UTC` or `Z` is
/// stripped before these are tried.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn strip_utc_suffix(s: &str) -> &str {
    ["UTC", "Z", "z"]
        .iter()
        .find_map(|suffix| s.strip_suffix(suffix))
        .map_or(s, str::trim_end)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoerceError {
    #[error("line {line}: column {column} is empty")]
    EmptyField { line: u64, column: &'static str },

    #[error("line {line}: unparseable timestamp {value:?}")]
    Timestamp { line: u64, value: String },

    #[error("line {line}: column {column} is not a finite number: {value:?}")]
    Number {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("line {line}: volume {value:?} is not a non-negative integer")]
    Volume { line: u64, value: String },
}

/// Parse a textual timestamp into an absolute UTC instant.
///
/// Returns `None` for anything that is not one of the accepted shapes.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let s = strip_utc_suffix(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a volume, truncating any fractional part toward zero.
pub fn parse_volume(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<i64>() {
        return (v >= 0).then_some(v);
    }
    let v = s.parse::<f64>().ok()?;
    // i64::MAX as f64 rounds up to 2^63, so the bound is exclusive.
    if !v.is_finite() || v < 0.0 || v >= i64::MAX as f64 {
        return None;
    }
    Some(v.trunc() as i64)
}

/// The field with surrounding whitespace removed; blank counts as missing.
fn field<'r>(
    record: &'r StringRecord,
    pos: usize,
    line: u64,
    column: &'static str,
) -> Result<&'r str, CoerceError> {
    match record.get(pos).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CoerceError::EmptyField { line, column }),
    }
}

fn price(
    record: &StringRecord,
    pos: usize,
    line: u64,
    column: &'static str,
) -> Result<f64, CoerceError> {
    let raw = field(record, pos, line, column)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CoerceError::Number {
            line,
            column,
            value: raw.to_string(),
        }),
    }
}

/// Coerce one record. `line` is the 1-based file line used in error messages.
pub fn coerce_record(
    record: &StringRecord,
    columns: &ColumnIndex,
    line: u64,
) -> Result<OhlcvRecord, CoerceError> {
    // Blank is rejected, but a present ticker is stored exactly as written.
    field(record, columns.ticker, line, "Ticker")?;
    let ticker = record.get(columns.ticker).unwrap_or_default().to_string();

    let raw_ts = field(record, columns.timestamp, line, "Datetime")?;
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| CoerceError::Timestamp {
        line,
        value: raw_ts.to_string(),
    })?;

    let open = price(record, columns.open, line, "Open")?;
    let high = price(record, columns.high, line, "High")?;
    let low = price(record, columns.low, line, "Low")?;
    let close = price(record, columns.close, line, "Close")?;

    let raw_volume = field(record, columns.volume, line, "Volume")?;
    let volume = parse_volume(raw_volume).ok_or_else(|| CoerceError::Volume {
        line,
        value: raw_volume.to_string(),
    })?;

    Ok(OhlcvRecord {
        ticker,
        timestamp,
        open,
        high,
        low,
        close,
        volume,
    })
}

/// Coerce every record of a validated set, failing on the first bad row.
///
/// Errors name the record's line in the file (the header is line 1).
pub fn coerce_all(records: &RecordSet, columns: &ColumnIndex) -> Result<Vec<OhlcvRecord>, CoerceError> {
    records
        .rows()
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let line = record.position().map_or(i as u64 + 2, |p| p.line());
            coerce_record(record, columns, line)
        })
        .collect()
}
