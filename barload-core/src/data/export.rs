//! Writing bars as loader-compatible CSV.
//!
//! Layout: `{root}/{timeframe_label}/{TICKER}.csv`, header
//! `Datetime,Ticker,Open,High,Low,Close,Volume`. Writes are atomic: the file
//! is written next to its destination as `.csv.tmp` and renamed into place,
//! so the loader never sees a half-written file.

use super::provider::DataError;
use crate::domain::OhlcvRecord;
use std::fs;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: [&str; 7] = ["Datetime", "Ticker", "Open", "High", "Low", "Close", "Volume"];

/// Timestamp format written to CSV, e.g. `2024-01-02 00:00:00+00:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// File name for a ticker. Class-share dots become hyphens (`BRK.B` → `BRK-B`)
/// to match the provider's symbology.
pub fn ticker_file_name(ticker: &str) -> String {
    format!("{}.csv", ticker.replace('.', "-"))
}

/// Path of a ticker's CSV under a timeframe directory.
pub fn ticker_path(root: &Path, label: &str, ticker: &str) -> PathBuf {
    root.join(label).join(ticker_file_name(ticker))
}

fn io_err(path: &Path, source: std::io::Error) -> DataError {
    DataError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Write bars to `path`, creating parent directories as needed.
pub fn write_bars_csv(path: &Path, bars: &[OhlcvRecord]) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        writer.write_record(CSV_HEADER)?;
        for bar in bars {
            writer.write_record([
                bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                bar.ticker.clone(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ])?;
        }
        writer.flush().map_err(|e| io_err(&tmp_path, e))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(path, e)
    })
}
