use super::{BarStore, StoreError};
use crate::config::StoreConfig;
use async_trait::async_trait;
use barload_core::domain::{OhlcvRecord, TableName};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info};

/// Postgres caps a statement at 65535 bind parameters; seven per row.
const MAX_ROWS_PER_STATEMENT: usize = 5_000;

/// Pooled Postgres store. Tables must already exist with a unique
/// constraint on (ticker, timestamp).
pub struct PgStore {
    pool: PgPool,
    max_connections: u32,
}

impl PgStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(config.connect_options())
            .await?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            max_connections = config.max_connections,
            "connected to postgres"
        );
        Ok(Self {
            pool,
            max_connections: config.max_connections,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn insert_prefix(table: &TableName) -> String {
    format!("INSERT INTO {table} (ticker, timestamp, open, high, low, close, volume) ")
}

#[async_trait]
impl BarStore for PgStore {
    fn name(&self) -> &str {
        "postgres"
    }

    fn max_concurrency(&self) -> usize {
        self.max_connections as usize
    }

    async fn upsert_bars(&self, table: &TableName, bars: &[OhlcvRecord]) -> Result<u64, StoreError> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for chunk in bars.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(insert_prefix(table));
            qb.push_values(chunk, |mut row, bar| {
                row.push_bind(bar.ticker.clone())
                    .push_bind(bar.timestamp)
                    .push_bind(bar.open)
                    .push_bind(bar.high)
                    .push_bind(bar.low)
                    .push_bind(bar.close)
                    .push_bind(bar.volume);
            });
            qb.push(" ON CONFLICT (ticker, timestamp) DO NOTHING");

            let result = qb.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(table = %table, rows = bars.len(), inserted, "batch committed");
        Ok(inserted)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("postgres pool closed");
    }
}
