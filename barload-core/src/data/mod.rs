//! CSV schema validation, row coercion, and the download collaborator

pub mod coerce;
pub mod download;
pub mod export;
pub mod provider;
pub mod reader;
pub mod schema;
pub mod yahoo;

pub use coerce::{coerce_all, coerce_record, parse_timestamp, parse_volume, CoerceError};
pub use download::{download_tickers, DownloadRequest, DownloadSummary};
pub use export::{ticker_path, write_bars_csv};
pub use provider::{DataError, DataProvider, DownloadProgress, FetchWindow, StdoutProgress};
pub use reader::{read_file, read_records, ReadError, RecordSet};
pub use schema::{BarSchema, ColumnIndex, SchemaError};
pub use yahoo::YahooProvider;
