//! Per-file, per-timeframe, and per-run outcomes.

use barload_core::domain::TableName;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where in a file's pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Read,
    Parse,
    Coerce,
    Store,
    Task,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Parse => "parse",
            Stage::Coerce => "coerce",
            Stage::Store => "store",
            Stage::Task => "task",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Every row coerced and the batch committed. `inserted` excludes rows
    /// whose key was already present.
    Loaded { rows: usize, inserted: u64 },
    /// Rejected by schema validation; nothing was written.
    Skipped { missing: Vec<String> },
    /// Nothing from this file was written.
    Failed { stage: Stage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn new(path: PathBuf, outcome: FileOutcome) -> Self {
        Self { path, outcome }
    }

    /// File name for display, falling back to the full path.
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, FileOutcome::Failed { .. })
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeReport {
    pub label: String,
    pub table: TableName,
    pub directory: PathBuf,
    /// Sorted by path.
    pub files: Vec<FileReport>,
    /// Set when the directory exists but could not be listed.
    pub listing_error: Option<String>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

impl TimeframeReport {
    pub fn loaded(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Loaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    pub fn rows_inserted(&self) -> u64 {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Loaded { inserted, .. } => inserted,
                _ => 0,
            })
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        self.listing_error.is_some() || self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub timeframes: Vec<TimeframeReport>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.timeframes.iter().any(TimeframeReport::has_failures)
    }

    pub fn rows_inserted(&self) -> u64 {
        self.timeframes.iter().map(TimeframeReport::rows_inserted).sum()
    }

    /// Every failed file across all timeframes, in load order.
    pub fn failures(&self) -> impl Iterator<Item = (&TimeframeReport, &FileReport)> {
        self.timeframes
            .iter()
            .flat_map(|tf| tf.files.iter().filter(|f| f.is_failed()).map(move |f| (tf, f)))
    }
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
