//! Error taxonomy for the load pipeline.

use crate::config::ConfigError;
use crate::report::Stage;
use crate::store::StoreError;
use barload_core::data::{CoerceError, ReadError};
use thiserror::Error;

/// Anything that can fail one file's ingestion task, or the run setup.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Parse(#[from] ReadError),

    #[error("coercion failed: {0}")]
    Coerce(#[from] CoerceError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingestion task aborted: {0}")]
    Task(String),
}

impl IngestError {
    /// Pipeline stage the error belongs to, for per-file reports.
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::Io(_) => Stage::Read,
            IngestError::Parse(ReadError::Io(_)) => Stage::Read,
            IngestError::Parse(ReadError::Csv(_)) => Stage::Parse,
            IngestError::Coerce(_) => Stage::Coerce,
            IngestError::Store(_) => Stage::Store,
            IngestError::Config(_) | IngestError::Task(_) => Stage::Task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_follow_variants() {
        let io = IngestError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.stage(), Stage::Read);

        let coerce = IngestError::Coerce(CoerceError::Volume {
            line: 3,
            value: "-1".into(),
        });
        assert_eq!(coerce.stage(), Stage::Coerce);
        assert_eq!(
            coerce.to_string(),
            "coercion failed: line 3: volume \"-1\" is not a non-negative integer"
        );

        assert_eq!(IngestError::Store(StoreError::Closed).stage(), Stage::Store);
        assert_eq!(IngestError::Task("panicked".into()).stage(), Stage::Task);
    }
}
