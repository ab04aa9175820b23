//! barload ingest — loads per-ticker OHLCV CSV files into Postgres.
//!
//! Layout on disk is `{data_dir}/{timeframe}/{TICKER}.csv`; each timeframe
//! maps to one table. Files within a timeframe load concurrently, timeframes
//! load one after another, and re-running is safe because rows whose
//! (ticker, timestamp) already exists are skipped.

pub mod config;
pub mod driver;
pub mod error;
pub mod ingest;
pub mod report;
pub mod store;

pub use config::{ConfigError, LoaderConfig, StoreConfig};
pub use driver::{load_postgres, run_timeframes};
pub use error::IngestError;
pub use ingest::{ingest_file, list_csv_files, load_timeframe};
pub use report::{FileOutcome, FileReport, RunSummary, Stage, TimeframeReport};
pub use store::{BarStore, MemoryStore, PgStore, StoreError};
