use super::{BarStore, StoreError};
use async_trait::async_trait;
use barload_core::domain::{OhlcvRecord, TableName};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

type Table = BTreeMap<(String, DateTime<Utc>), OhlcvRecord>;

/// In-process store with the same conflict rule as the Postgres one: the
/// first record for a (ticker, timestamp) key wins.
pub struct MemoryStore {
    tables: Mutex<HashMap<TableName, Table>>,
    max_concurrency: usize,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_CONNECTIONS as usize)
    }
}

impl MemoryStore {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            max_concurrency: max_concurrency.max(1),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TableName, Table>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn row_count(&self, table: &TableName) -> usize {
        self.lock().get(table).map_or(0, BTreeMap::len)
    }

    pub fn get(&self, table: &TableName, ticker: &str, timestamp: DateTime<Utc>) -> Option<OhlcvRecord> {
        self.lock()
            .get(table)
            .and_then(|rows| rows.get(&(ticker.to_string(), timestamp)))
            .cloned()
    }

    /// Every row in `table`, ordered by (ticker, timestamp).
    pub fn rows(&self, table: &TableName) -> Vec<OhlcvRecord> {
        self.lock()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    async fn upsert_bars(&self, table: &TableName, bars: &[OhlcvRecord]) -> Result<u64, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let mut tables = self.lock();
        let rows = tables.entry(table.clone()).or_default();
        let mut inserted = 0u64;
        for bar in bars {
            let (ticker, timestamp) = bar.key();
            let key = (ticker.to_string(), timestamp);
            if !rows.contains_key(&key) {
                rows.insert(key, bar.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(ticker: &str, hour: u32, close: f64) -> OhlcvRecord {
        OhlcvRecord {
            ticker: ticker.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    #[tokio::test]
    async fn first_writer_wins() {
        let store = MemoryStore::default();
        let table = TableName::new("ohlcv_1h").unwrap();

        let first = store.upsert_bars(&table, &[bar("AAPL", 14, 1.0)]).await.unwrap();
        let second = store
            .upsert_bars(&table, &[bar("AAPL", 14, 2.0), bar("AAPL", 15, 3.0)])
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(store.row_count(&table), 2);
        let kept = store.get(&table, "AAPL", bar("AAPL", 14, 0.0).timestamp).unwrap();
        assert_eq!(kept.close, 1.0);
    }

    #[tokio::test]
    async fn duplicates_within_one_batch_keep_the_first() {
        let store = MemoryStore::default();
        let table = TableName::new("ohlcv_1h").unwrap();
        let inserted = store
            .upsert_bars(&table, &[bar("MSFT", 9, 5.0), bar("MSFT", 9, 6.0)])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.rows(&table)[0].close, 5.0);
    }

    #[tokio::test]
    async fn tables_are_independent() {
        let store = MemoryStore::default();
        let daily = TableName::new("ohlcv_1d").unwrap();
        let hourly = TableName::new("ohlcv_1h").unwrap();
        store.upsert_bars(&daily, &[bar("AAPL", 0, 1.0)]).await.unwrap();
        assert_eq!(store.row_count(&daily), 1);
        assert_eq!(store.row_count(&hourly), 0);
    }

    #[tokio::test]
    async fn closed_store_rejects_writes() {
        let store = MemoryStore::default();
        let table = TableName::new("ohlcv_1d").unwrap();
        store.close().await;
        assert!(store.is_closed());
        assert_eq!(store.close_calls(), 1);
        let err = store.upsert_bars(&table, &[bar("AAPL", 0, 1.0)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }
}
