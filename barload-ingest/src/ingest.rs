//! File ingestion: one task per CSV file, fanned out over a timeframe
//! directory and bounded by the store's connection budget.

use crate::error::IngestError;
use crate::report::{display_name, FileOutcome, FileReport, Stage, TimeframeReport};
use crate::store::BarStore;
use barload_core::data::{coerce_all, read_records, BarSchema, SchemaError};
use barload_core::domain::{TableName, TimeframeTable};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Validate, coerce, and upsert one file. Never returns an error: every
/// failure is folded into the report's outcome.
pub async fn ingest_file(store: &dyn BarStore, table: &TableName, path: &Path) -> FileReport {
    let name = display_name(path);
    let outcome = match run_file(store, table, path).await {
        Ok(outcome) => {
            match &outcome {
                FileOutcome::Skipped { missing } => {
                    warn!(file = %name, missing = %missing.join(","), "Skip.. (missed required fields): {name}");
                }
                FileOutcome::Loaded { rows, inserted } => {
                    debug!(file = %name, table = %table, rows, inserted, "file loaded");
                }
                FileOutcome::Failed { .. } => {}
            }
            outcome
        }
        Err(err) => {
            error!(file = %name, table = %table, stage = %err.stage(), "{err}");
            FileOutcome::Failed {
                stage: err.stage(),
                reason: err.to_string(),
            }
        }
    };
    FileReport::new(path.to_path_buf(), outcome)
}

async fn run_file(store: &dyn BarStore, table: &TableName, path: &Path) -> Result<FileOutcome, IngestError> {
    let bytes = tokio::fs::read(path).await?;
    let set = read_records(&bytes)?;

    let columns = match BarSchema::validate(set.headers()) {
        Ok(columns) => columns,
        Err(SchemaError::MissingColumns(missing)) => return Ok(FileOutcome::Skipped { missing }),
        Err(SchemaError::NoHeader) => {
            return Ok(FileOutcome::Skipped {
                missing: BarSchema::required_columns()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            })
        }
    };

    // All-or-nothing: one bad row rejects the file before anything is sent.
    let bars = coerce_all(&set, &columns)?;
    if bars.is_empty() {
        return Ok(FileOutcome::Loaded { rows: 0, inserted: 0 });
    }

    let inserted = store.upsert_bars(table, &bars).await?;
    Ok(FileOutcome::Loaded {
        rows: bars.len(),
        inserted,
    })
}

/// Regular files directly under `dir` with a `.csv` extension (any case),
/// sorted by path.
pub async fn list_csv_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            continue;
        }
        // Follows symlinks.
        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every CSV in `{data_dir}/{label}` into the timeframe's table.
///
/// One task per file, all started up front; a semaphore sized to the
/// store's concurrency limits how many are past the gate at once. Every
/// task is awaited and its outcome kept. A task that dies without
/// reporting is recorded as a `task` failure for its file.
pub async fn load_timeframe(
    store: Arc<dyn BarStore>,
    timeframe: &TimeframeTable,
    data_dir: &Path,
) -> TimeframeReport {
    let started = Instant::now();
    let directory = data_dir.join(&timeframe.label);

    let mut report = TimeframeReport {
        label: timeframe.label.clone(),
        table: timeframe.table.clone(),
        directory: directory.clone(),
        files: Vec::new(),
        listing_error: None,
        elapsed: Default::default(),
    };

    let files = match list_csv_files(&directory).await {
        Ok(files) => files,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(dir = %directory.display(), "timeframe directory not found; nothing to load");
            report.elapsed = started.elapsed();
            return report;
        }
        Err(err) => {
            error!(dir = %directory.display(), "cannot list timeframe directory: {err}");
            report.listing_error = Some(err.to_string());
            report.elapsed = started.elapsed();
            return report;
        }
    };

    info!(
        timeframe = %timeframe.label,
        table = %timeframe.table,
        files = files.len(),
        "loading timeframe"
    );

    let permits = Arc::new(Semaphore::new(store.max_concurrency().max(1)));
    let mut tasks = JoinSet::new();
    for path in &files {
        let store = Arc::clone(&store);
        let permits = Arc::clone(&permits);
        let table = timeframe.table.clone();
        let path = path.clone();
        tasks.spawn(async move {
            // The semaphore is never closed, so this only fails if it were.
            let _permit = permits.acquire_owned().await.ok();
            ingest_file(store.as_ref(), &table, &path).await
        });
    }

    let mut join_errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(file_report) => report.files.push(file_report),
            Err(err) => {
                error!(timeframe = %timeframe.label, "ingestion task aborted: {err}");
                join_errors.push(err.to_string());
            }
        }
    }

    if !join_errors.is_empty() {
        let reported: HashSet<PathBuf> = report.files.iter().map(|f| f.path.clone()).collect();
        let reason = IngestError::Task(join_errors.join("; ")).to_string();
        for path in files.iter().filter(|p| !reported.contains(*p)) {
            report.files.push(FileReport::new(
                path.clone(),
                FileOutcome::Failed {
                    stage: Stage::Task,
                    reason: reason.clone(),
                },
            ));
        }
    }

    report.files.sort_by(|a, b| a.path.cmp(&b.path));
    report.elapsed = started.elapsed();

    info!(
        timeframe = %report.label,
        loaded = report.loaded(),
        skipped = report.skipped(),
        failed = report.failed(),
        inserted = report.rows_inserted(),
        "Loading {}: {:.2} seconds",
        report.label,
        report.elapsed.as_secs_f64()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use barload_core::domain::OhlcvRecord;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const HEADER: &str = "Datetime,Ticker,Open,High,Low,Close,Volume\n";

    fn table() -> TableName {
        TableName::new("ohlcv_1h").unwrap()
    }

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn loads_a_good_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "AAPL.csv",
            &format!(
                "{HEADER}2024-01-02 09:30:00-05:00,AAPL,187.15,188.44,183.89,185.64,82488700\n\
                 2024-01-03 09:30:00-05:00,AAPL,184.22,185.88,183.43,184.25,58414500\n"
            ),
        );
        let store = MemoryStore::default();

        let outcome = ingest_file(&store, &table(), &path).await.outcome;

        assert_eq!(outcome, FileOutcome::Loaded { rows: 2, inserted: 2 });
        assert_eq!(store.row_count(&table()), 2);
    }

    #[tokio::test]
    async fn header_only_file_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "EMPTY.csv", HEADER);
        let store = MemoryStore::default();
        let outcome = ingest_file(&store, &table(), &path).await.outcome;
        assert_eq!(outcome, FileOutcome::Loaded { rows: 0, inserted: 0 });
    }

    #[tokio::test]
    async fn missing_column_skips() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "BAD.csv",
            "Datetime,Ticker,Open,High,Low,Close\n2024-01-02 09:30:00,BAD,1,1,1,1\n",
        );
        let store = MemoryStore::default();
        let outcome = ingest_file(&store, &table(), &path).await.outcome;
        assert_eq!(outcome, FileOutcome::Skipped { missing: vec!["Volume".into()] });
        assert_eq!(store.row_count(&table()), 0);
    }

    #[tokio::test]
    async fn empty_file_skips() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "NONE.csv", "");
        let store = MemoryStore::default();
        let outcome = ingest_file(&store, &table(), &path).await.outcome;
        assert!(matches!(outcome, FileOutcome::Skipped { missing } if missing.len() == 7));
    }

    #[tokio::test]
    async fn bad_row_fails_at_coerce_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "MSFT.csv",
            &format!(
                "{HEADER}2024-01-02 09:30:00,MSFT,1,2,0.5,1.5,100\n\
                 2024-01-02 10:30:00,MSFT,1,2,0.5,oops,100\n"
            ),
        );
        let store = MemoryStore::default();
        let outcome = ingest_file(&store, &table(), &path).await.outcome;
        assert!(matches!(outcome, FileOutcome::Failed { stage: Stage::Coerce, .. }));
        assert_eq!(store.row_count(&table()), 0);
    }

    #[tokio::test]
    async fn row_of_empty_fields_fails_the_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "AAPL.csv",
            &format!("{HEADER}2024-01-02,AAPL,1,2,0.5,1.5,100\n,,,,,,\n"),
        );
        let store = MemoryStore::default();
        let outcome = ingest_file(&store, &table(), &path).await.outcome;
        match outcome {
            FileOutcome::Failed { stage, reason } => {
                assert_eq!(stage, Stage::Coerce);
                assert!(reason.contains("line 3"), "{reason}");
            }
            other => panic!("expected a coerce failure, got {other:?}"),
        }
        assert_eq!(store.row_count(&table()), 0);
    }

    #[tokio::test]
    async fn ticker_whitespace_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "AAPL.csv",
            &format!("{HEADER}2024-01-02 14:30:00 UTC, aapl ,1,2,0.5,1.5,100\n"),
        );
        let store = MemoryStore::default();
        let outcome = ingest_file(&store, &table(), &path).await.outcome;
        assert_eq!(outcome, FileOutcome::Loaded { rows: 1, inserted: 1 });
        assert_eq!(store.rows(&table())[0].ticker, " aapl ");
    }

    #[tokio::test]
    async fn unreadable_path_fails_at_read() {
        let store = MemoryStore::default();
        let report = ingest_file(&store, &table(), Path::new("/no/such/file.csv")).await;
        assert_eq!(report.file_name(), "file.csv");
        let outcome = report.outcome;
        assert!(matches!(outcome, FileOutcome::Failed { stage: Stage::Read, .. }));
    }

    #[tokio::test]
    async fn lists_only_csv_files_sorted() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.csv", HEADER);
        write(dir.path(), "A.CSV", HEADER);
        write(dir.path(), "notes.txt", "x");
        write(dir.path(), "csv", "x");
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = list_csv_files(dir.path()).await.unwrap();
        let names: Vec<String> = files.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["A.CSV", "b.csv"]);
    }

    #[tokio::test]
    async fn missing_directory_is_an_empty_report() {
        let dir = TempDir::new().unwrap();
        let tf = TimeframeTable::new("5m", TableName::new("ohlcv_5m").unwrap());
        let store: Arc<dyn BarStore> = Arc::new(MemoryStore::default());
        let report = load_timeframe(store, &tf, dir.path()).await;
        assert!(report.files.is_empty());
        assert!(report.listing_error.is_none());
        assert!(!report.has_failures());
    }

    /// Records the peak number of concurrent upserts.
    struct GatedStore {
        limit: usize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl BarStore for GatedStore {
        fn name(&self) -> &str {
            "gated"
        }

        fn max_concurrency(&self) -> usize {
            self.limit
        }

        async fn upsert_bars(&self, _table: &TableName, bars: &[OhlcvRecord]) -> Result<u64, StoreError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(bars.len() as u64)
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_the_store() {
        let dir = TempDir::new().unwrap();
        let tf_dir = dir.path().join("1h");
        fs::create_dir(&tf_dir).unwrap();
        for i in 0..12 {
            write(
                &tf_dir,
                &format!("T{i:02}.csv"),
                &format!("{HEADER}2024-01-02 09:30:00,T{i},1,1,1,1,1\n"),
            );
        }
        let gated = Arc::new(GatedStore {
            limit: 3,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let store: Arc<dyn BarStore> = gated.clone();
        let tf = TimeframeTable::new("1h", table());

        let report = load_timeframe(store, &tf, dir.path()).await;

        assert_eq!(report.loaded(), 12);
        assert!(gated.peak.load(Ordering::SeqCst) <= 3);
        assert!(gated.peak.load(Ordering::SeqCst) >= 1);
    }

    struct PanickingStore;

    #[async_trait]
    impl BarStore for PanickingStore {
        fn name(&self) -> &str {
            "panicking"
        }

        fn max_concurrency(&self) -> usize {
            2
        }

        async fn upsert_bars(&self, _table: &TableName, bars: &[OhlcvRecord]) -> Result<u64, StoreError> {
            if bars.iter().any(|b| b.ticker == "BOOM") {
                panic!("store blew up");
            }
            Ok(bars.len() as u64)
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn panicking_task_is_recorded_and_others_finish() {
        let dir = TempDir::new().unwrap();
        let tf_dir = dir.path().join("1h");
        fs::create_dir(&tf_dir).unwrap();
        write(&tf_dir, "BOOM.csv", &format!("{HEADER}2024-01-02 09:30:00,BOOM,1,1,1,1,1\n"));
        write(&tf_dir, "OK.csv", &format!("{HEADER}2024-01-02 09:30:00,OK,1,1,1,1,1\n"));
        let store: Arc<dyn BarStore> = Arc::new(PanickingStore);
        let tf = TimeframeTable::new("1h", table());

        let report = load_timeframe(store, &tf, dir.path()).await;

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].file_name(), "BOOM.csv");
        assert!(matches!(
            report.files[0].outcome,
            FileOutcome::Failed { stage: Stage::Task, .. }
        ));
        assert_eq!(report.files[1].outcome, FileOutcome::Loaded { rows: 1, inserted: 1 });
    }
}
