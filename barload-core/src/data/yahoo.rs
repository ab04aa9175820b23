//! Yahoo Finance data provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API, either for a lookback range
//! (`range=2y`) or explicit dates. One request per ticker, no retries.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{DataError, DataProvider, FetchWindow};
use crate::domain::OhlcvRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Intervals whose bars represent a whole session or more; their timestamps
/// are normalized to midnight UTC of the exchange-local trading date.
const SESSION_INTERVALS: [&str; 5] = ["1d", "5d", "1wk", "1mo", "3mo"];

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<i64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url("https://query2.finance.yahoo.com")
    }

    /// Point the provider at another host (a mirror or a local stub).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build the chart API URL for a ticker, window and interval.
    fn chart_url(&self, ticker: &str, window: &FetchWindow, interval: &str) -> String {
        let span = match window {
            FetchWindow::Range(range) => format!("range={range}"),
            FetchWindow::Dates { start, end } => {
                let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
                // end is inclusive: request up to the start of the following day
                let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() + 86_400;
                format!("period1={start_ts}&period2={end_ts}")
            }
        };
        format!(
            "{}/v8/finance/chart/{ticker}?{span}&interval={interval}&includePrePost=false",
            self.base_url
        )
    }

    /// Parse the chart API response into records.
    fn parse_response(
        ticker: &str,
        interval: &str,
        resp: ChartResponse,
    ) -> Result<Vec<OhlcvRecord>, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::TickerNotFound {
                        ticker: ticker.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let gmtoffset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
        let per_session = SESSION_INTERVALS.contains(&interval);

        // A valid ticker with no bars in the window comes back without timestamps.
        let timestamps = data.timestamp.unwrap_or_default();

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        let mut incomplete = 0usize;

        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = bar_timestamp(ts, gmtoffset, per_session).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Halted or non-trading intervals come back with null prices.
            let (Some(open), Some(high), Some(low), Some(close)) = (open, high, low, close) else {
                incomplete += 1;
                continue;
            };

            bars.push(OhlcvRecord {
                ticker: ticker.to_string(),
                timestamp,
                open,
                high,
                low,
                close,
                volume: volume.unwrap_or(0).max(0),
            });
        }

        if incomplete > 0 {
            debug!(ticker, incomplete, "dropped bars with null prices");
        }

        if bars.is_empty() {
            return Err(DataError::TickerNotFound {
                ticker: ticker.to_string(),
            });
        }

        Ok(bars)
    }
}

fn bar_timestamp(ts: i64, gmtoffset: i64, per_session: bool) -> Option<DateTime<Utc>> {
    let instant = DateTime::from_timestamp(ts, 0)?;
    if !per_session {
        return Some(instant);
    }
    let local_date = DateTime::from_timestamp(ts + gmtoffset, 0)?.date_naive();
    Some(local_date.and_time(chrono::NaiveTime::MIN).and_utc())
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        ticker: &str,
        window: &FetchWindow,
        interval: &str,
    ) -> Result<Vec<OhlcvRecord>, DataError> {
        let url = self.chart_url(ticker, window, interval);
        debug!(%url, "requesting chart");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::TickerNotFound {
                ticker: ticker.to_string(),
            });
        }
        if !status.is_success() {
            return Err(DataError::Http {
                ticker: ticker.to_string(),
                status: status.as_u16(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {ticker}: {e}"))
        })?;

        Self::parse_response(ticker, interval, chart)
    }
}
