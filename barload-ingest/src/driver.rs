//! Timeframe driver: loads each configured timeframe in order against one
//! store, then releases the store.

use crate::config::{LoaderConfig, StoreConfig};
use crate::error::IngestError;
use crate::ingest::load_timeframe;
use crate::report::RunSummary;
use crate::store::{BarStore, PgStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Run every timeframe sequentially; timeframe N+1 starts only after every
/// file task of timeframe N has finished. The store is closed exactly once,
/// after the last timeframe.
pub async fn run_timeframes(store: Arc<dyn BarStore>, config: &LoaderConfig) -> RunSummary {
    let started = Instant::now();
    let mut timeframes = Vec::with_capacity(config.timeframes.len());

    for timeframe in &config.timeframes {
        let report = load_timeframe(Arc::clone(&store), timeframe, &config.data_dir).await;
        timeframes.push(report);
    }

    store.close().await;

    let summary = RunSummary {
        timeframes,
        elapsed: started.elapsed(),
    };
    info!(
        store = store.name(),
        timeframes = summary.timeframes.len(),
        inserted = summary.rows_inserted(),
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "load finished"
    );
    summary
}

/// Connect to Postgres and run every timeframe. Connection failure is the
/// only error; per-file problems are in the summary.
pub async fn load_postgres(store_config: &StoreConfig, config: &LoaderConfig) -> Result<RunSummary, IngestError> {
    config.validate()?;
    let store = PgStore::connect(store_config).await?;
    Ok(run_timeframes(Arc::new(store), config).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use barload_core::domain::{TableName, TimeframeTable};
    use tempfile::TempDir;

    #[tokio::test]
    async fn closes_store_once_even_with_nothing_to_load() {
        let dir = TempDir::new().unwrap();
        let memory = Arc::new(MemoryStore::default());
        let config = LoaderConfig {
            data_dir: dir.path().to_path_buf(),
            ..LoaderConfig::default()
        };

        let summary = run_timeframes(memory.clone(), &config).await;

        assert_eq!(summary.timeframes.len(), 3);
        assert!(summary.timeframes.iter().all(|tf| tf.files.is_empty()));
        assert_eq!(memory.close_calls(), 1);
        assert!(!summary.has_failures());
    }

    #[tokio::test]
    async fn reports_follow_configured_order() {
        let dir = TempDir::new().unwrap();
        let config = LoaderConfig {
            data_dir: dir.path().to_path_buf(),
            timeframes: vec![
                TimeframeTable::new("5m", TableName::new("ohlcv_5m").unwrap()),
                TimeframeTable::new("2y", TableName::new("ohlcv_1d").unwrap()),
            ],
        };
        let summary = run_timeframes(Arc::new(MemoryStore::default()), &config).await;
        let labels: Vec<&str> = summary.timeframes.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["5m", "2y"]);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_connecting() {
        let config = LoaderConfig {
            timeframes: vec![],
            ..LoaderConfig::default()
        };
        let err = load_postgres(&StoreConfig::default(), &config).await.unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }
}
