//! Required-column check for bar CSV files.

use csv::StringRecord;

/// Required columns, each with the header spellings accepted for it.
/// The first spelling is the canonical one used in diagnostics.
const REQUIRED_COLUMNS: [(&str, &[&str]); 7] = [
    ("Ticker", &["ticker"]),
    ("Datetime", &["datetime", "timestamp", "date"]),
    ("Open", &["open"]),
    ("High", &["high"]),
    ("Low", &["low"]),
    ("Close", &["close"]),
    ("Volume", &["volume"]),
];

/// Expected schema for bar CSV files
pub struct BarSchema;

/// Positions of the required columns within a validated header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    pub ticker: usize,
    pub timestamp: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub volume: usize,
}

impl BarSchema {
    /// Canonical names of the required columns.
    pub fn required_columns() -> Vec<&'static str> {
        REQUIRED_COLUMNS.iter().map(|(name, _)| *name).collect()
    }

    /// Validate a header row against the schema.
    ///
    /// Presence is checked case-insensitively and ignores surrounding
    /// whitespace; column order does not matter and extra columns are allowed.
    pub fn validate(headers: &StringRecord) -> Result<ColumnIndex, SchemaError> {
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(SchemaError::NoHeader);
        }

        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
            .collect();

        let mut positions = [0usize; 7];
        let mut missing = Vec::new();
        for (slot, (name, aliases)) in REQUIRED_COLUMNS.iter().enumerate() {
            // Aliases are listed by preference, so `Datetime` wins over `Date`
            // when a file carries both.
            let found = aliases
                .iter()
                .find_map(|alias| normalized.iter().position(|h| h == alias));
            match found {
                Some(pos) => positions[slot] = pos,
                None => missing.push((*name).to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns(missing));
        }

        let [ticker, timestamp, open, high, low, close, volume] = positions;
        Ok(ColumnIndex {
            ticker,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("file has no header row")]
    NoHeader,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cols: &[&str]) -> StringRecord {
        StringRecord::from(cols.to_vec())
    }

    #[test]
    fn test_schema_has_all_required_columns() {
        let cols = BarSchema::required_columns();
        assert_eq!(
            cols,
            vec!["Ticker", "Datetime", "Open", "High", "Low", "Close", "Volume"]
        );
    }

    #[test]
    fn test_validate_accepts_canonical_header() {
        let idx = BarSchema::validate(&headers(&[
            "Ticker", "Datetime", "Open", "High", "Low", "Close", "Volume",
        ]))
        .unwrap();
        assert_eq!(idx.ticker, 0);
        assert_eq!(idx.timestamp, 1);
        assert_eq!(idx.volume, 6);
    }

    #[test]
    fn test_validate_ignores_order_case_and_extras() {
        let idx = BarSchema::validate(&headers(&[
            "Datetime", " ticker ", "Adj Close", "CLOSE", "high", "Low", "open", "Volume",
        ]))
        .unwrap();
        assert_eq!(idx.timestamp, 0);
        assert_eq!(idx.ticker, 1);
        assert_eq!(idx.close, 3);
        assert_eq!(idx.high, 4);
        assert_eq!(idx.open, 6);
        assert_eq!(idx.volume, 7);
    }

    #[test]
    fn test_validate_accepts_timestamp_aliases() {
        let idx = BarSchema::validate(&headers(&[
            "Ticker", "Date", "Open", "High", "Low", "Close", "Volume",
        ]))
        .unwrap();
        assert_eq!(idx.timestamp, 1);

        let both = BarSchema::validate(&headers(&[
            "Date", "Ticker", "Datetime", "Open", "High", "Low", "Close", "Volume",
        ]))
        .unwrap();
        assert_eq!(both.timestamp, 2, "Datetime preferred over Date");
    }

    #[test]
    fn test_validate_rejects_missing_column() {
        let result = BarSchema::validate(&headers(&[
            "Ticker", "Datetime", "Open", "High", "Low", "Close",
        ]));
        assert_eq!(
            result.unwrap_err(),
            SchemaError::MissingColumns(vec!["Volume".into()])
        );
    }

    #[test]
    fn test_validate_reports_every_missing_column() {
        let result = BarSchema::validate(&headers(&["Ticker", "Open"]));
        match result.unwrap_err() {
            SchemaError::MissingColumns(cols) => {
                assert_eq!(cols, vec!["Datetime", "High", "Low", "Close", "Volume"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_empty_header() {
        assert_eq!(
            BarSchema::validate(&StringRecord::new()).unwrap_err(),
            SchemaError::NoHeader
        );
    }

    #[test]
    fn test_validate_strips_byte_order_mark() {
        let idx = BarSchema::validate(&headers(&[
            "\u{feff}Ticker", "Datetime", "Open", "High", "Low", "Close", "Volume",
        ]))
        .unwrap();
        assert_eq!(idx.ticker, 0);
    }
}
