//! OhlcvRecord: one price bar for one ticker at one instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar as it is stored: one row per `(ticker, timestamp)` per timeframe table.
///
/// The ticker is kept verbatim from the source file; no case folding happens
/// between the CSV and the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvRecord {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvRecord {
    /// Composite key the store deduplicates on.
    pub fn key(&self) -> (&str, DateTime<Utc>) {
        (self.ticker.as_str(), self.timestamp)
    }

    /// Basic OHLC sanity check: high >= low and open/close inside the range.
    ///
    /// Not enforced by the loader (the store accepts whatever the provider
    /// produced); used by the downloader to flag suspicious bars.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.open <= self.high
            && self.open >= self.low
            && self.close <= self.high
            && self.close >= self.low
            && self.volume >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> OhlcvRecord {
        OhlcvRecord {
            ticker: "AAPL".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open: 185.0,
            high: 186.0,
            low: 184.0,
            close: 185.5,
            volume: 1_000_000,
        }
    }

    #[test]
    fn record_is_sane() {
        assert!(sample_record().is_sane());
    }

    #[test]
    fn record_detects_inverted_range() {
        let mut record = sample_record();
        record.high = 183.0;
        assert!(!record.is_sane());
    }

    #[test]
    fn key_is_ticker_and_timestamp() {
        let record = sample_record();
        let (ticker, ts) = record.key();
        assert_eq!(ticker, "AAPL");
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }
}
