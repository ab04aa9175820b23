//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over bar sources so the download
//! orchestrator can be driven by Yahoo Finance in production and by a canned
//! provider in tests.

use crate::domain::OhlcvRecord;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Structured error types for download operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} for {ticker}")]
    Http { ticker: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("ticker not found: {ticker}")]
    TickerNotFound { ticker: String },

    #[error("invalid fetch window: {0}")]
    InvalidWindow(String),

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// How far back to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchWindow {
    /// A provider lookback such as `2y`, `5d`, `max`.
    Range(String),
    /// Inclusive calendar-date bounds.
    Dates { start: NaiveDate, end: NaiveDate },
}

impl FetchWindow {
    pub fn dates(start: NaiveDate, end: NaiveDate) -> Result<Self, DataError> {
        if start > end {
            return Err(DataError::InvalidWindow(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self::Dates { start, end })
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchWindow::Range(r) => write!(f, "{r}"),
            FetchWindow::Dates { start, end } => write!(f, "{start}..{end}"),
        }
    }
}

/// Trait for bar providers.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch bars for one ticker. An empty result is reported as
    /// `TickerNotFound` rather than an empty vector.
    fn fetch(
        &self,
        ticker: &str,
        window: &FetchWindow,
        interval: &str,
    ) -> Result<Vec<OhlcvRecord>, DataError>;
}

/// Progress callback for multi-ticker operations.
pub trait DownloadProgress: Send {
    /// Called when starting to fetch a ticker.
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    /// Called when a ticker fetch completes.
    fn on_complete(&self, ticker: &str, index: usize, total: usize, result: &Result<usize, DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress {
    pub label: String,
}

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        println!("[{}][{}/{}] Loading {ticker}...", self.label, index + 1, total);
    }

    fn on_complete(
        &self,
        ticker: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, DataError>,
    ) {
        match result {
            Ok(rows) => println!("  OK: {ticker} ({rows} bars)"),
            Err(e) => println!("  FAIL: {ticker}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nDownload complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}
