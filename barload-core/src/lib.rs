//! barload core — domain types and everything on the file side of the loader.
//!
//! - Domain types (`OhlcvRecord`, timeframe → table mapping)
//! - Required-column validation for bar CSV files
//! - Row coercion into typed records (UTC timestamps, truncated volumes)
//! - CSV reading and atomic CSV writing
//! - Yahoo Finance provider and the multi-ticker download orchestrator

pub mod data;
pub mod domain;
