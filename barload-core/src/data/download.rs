//! Download orchestrator. Fetches tickers one by one and writes one CSV per
//! ticker under the timeframe directory the loader reads from.
//!
//! A ticker that fails produces no file; the loader only ever sees its absence.

use super::export::{ticker_path, write_bars_csv};
use super::provider::{DataError, DataProvider, DownloadProgress, FetchWindow};
use std::path::Path;
use tracing::warn;

/// What to download and where to put it.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub window: FetchWindow,
    pub interval: String,
}

impl DownloadRequest {
    /// Directory label under the data root: the range when one is given,
    /// otherwise the interval (`2y`, or `1h` for a dated window).
    pub fn label(&self) -> String {
        match &self.window {
            FetchWindow::Range(range) => range.clone(),
            FetchWindow::Dates { .. } => self.interval.clone(),
        }
    }
}

/// Download multiple tickers into `{root}/{label}/`.
///
/// Returns a summary of successes and failures.
pub fn download_tickers(
    provider: &dyn DataProvider,
    root: &Path,
    tickers: &[&str],
    request: &DownloadRequest,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = tickers.len();
    let label = request.label();
    let mut succeeded = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, ticker) in tickers.iter().enumerate() {
        progress.on_start(ticker, i, total);

        let result = download_single(provider, root, &label, ticker, request);
        progress.on_complete(ticker, i, total, &result);

        match result {
            Ok(_) => succeeded += 1,
            Err(e) => {
                warn!(ticker, error = %e, "download failed");
                errors.push((ticker.to_string(), e));
            }
        }
    }

    let failed = errors.len();
    progress.on_batch_complete(succeeded, failed, total);

    DownloadSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

/// Download a single ticker: fetch → write CSV. Returns the number of bars written.
fn download_single(
    provider: &dyn DataProvider,
    root: &Path,
    label: &str,
    ticker: &str,
    request: &DownloadRequest,
) -> Result<usize, DataError> {
    let provider_ticker = ticker.replace('.', "-");
    let bars = provider.fetch(&provider_ticker, &request.window, &request.interval)?;
    let insane = bars.iter().filter(|b| !b.is_sane()).count();
    if insane > 0 {
        warn!(ticker, insane, "provider returned bars with inconsistent OHLC");
    }
    write_bars_csv(&ticker_path(root, label, ticker), &bars)?;
    Ok(bars.len())
}

/// Summary of a batch download operation.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
