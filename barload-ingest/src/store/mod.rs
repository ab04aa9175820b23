//! Bar storage behind a trait, so the orchestrator runs unchanged against
//! Postgres or the in-memory store used for dry runs and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use barload_core::domain::{OhlcvRecord, TableName};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store is closed")]
    Closed,
}

/// Insert-if-absent storage keyed by (ticker, timestamp).
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Upper bound on useful concurrent `upsert_bars` calls.
    fn max_concurrency(&self) -> usize;

    /// Insert `bars` into `table`, skipping any whose (ticker, timestamp)
    /// already exists. The whole slice lands or none of it does. Returns
    /// how many rows were actually inserted.
    async fn upsert_bars(&self, table: &TableName, bars: &[OhlcvRecord]) -> Result<u64, StoreError>;

    /// Release connections. Called once, after the last timeframe.
    async fn close(&self);
}
