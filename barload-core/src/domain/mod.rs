//! Domain types for barload

pub mod bar;
pub mod timeframe;

pub use bar::OhlcvRecord;
pub use timeframe::{TableName, TableNameError, TimeframeTable};
