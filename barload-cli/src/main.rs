//! barload CLI — load per-ticker OHLCV CSV files into Postgres, and download
//! them from Yahoo Finance.
//!
//! Commands:
//! - `load` — ingest `{data_dir}/{timeframe}/*.csv` into one table per timeframe
//! - `download` — fetch bars and write `{output_dir}/{range or interval}/{TICKER}.csv`

use anyhow::{Context, Result};
use barload_core::data::{download_tickers, DownloadRequest, FetchWindow, StdoutProgress, YahooProvider};
use barload_core::domain::TimeframeTable;
use barload_ingest::{
    load_postgres, run_timeframes, FileOutcome, LoaderConfig, MemoryStore, RunSummary, StoreConfig,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "barload",
    about = "barload — bulk-load OHLCV CSV files into Postgres"
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every timeframe directory into its table.
    Load {
        /// TOML file with `data_dir` and `[[timeframes]]` entries.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data root. Defaults to ./sp500_data.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Timeframe mapping as LABEL=TABLE; repeat to load several, in order.
        /// Replaces the configured mapping.
        #[arg(long = "timeframe", value_name = "LABEL=TABLE")]
        timeframes: Vec<TimeframeTable>,

        /// Pool size and per-timeframe file concurrency. Overrides
        /// POSTGRES_MAX_CONNECTIONS.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_connections: Option<u32>,

        /// Parse and validate everything, but write to an in-memory store.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Print the run summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Download bars from Yahoo Finance as loader-ready CSV files.
    Download {
        /// Tickers to download (e.g., AAPL MSFT BRK.B).
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Lookback range (e.g., 2y, 60d). Ignored when --start is given.
        #[arg(long, default_value = "2y", conflicts_with = "start")]
        range: String,

        /// Bar interval (1d, 1h, 5m, ...).
        #[arg(long, default_value = "1d")]
        interval: String,

        /// Start date (YYYY-MM-DD).
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// Data root. Defaults to ./sp500_data.
        #[arg(long, default_value = "sp500_data")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Load {
            config,
            data_dir,
            timeframes,
            max_connections,
            dry_run,
            json,
        } => run_load(config, data_dir, timeframes, max_connections, dry_run, json),
        Commands::Download {
            tickers,
            range,
            interval,
            start,
            end,
            output_dir,
        } => run_download(tickers, range, interval, start, end, output_dir),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

fn run_load(
    config_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    timeframes: Vec<TimeframeTable>,
    max_connections: Option<u32>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => LoaderConfig::from_file(path)?,
        None => LoaderConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    if !timeframes.is_empty() {
        config = config.with_timeframes(timeframes)?;
    }
    config.validate()?;

    let mut store_config = StoreConfig::from_env()?;
    if let Some(n) = max_connections {
        store_config.max_connections = n;
    }
    debug!(?config, ?store_config, "resolved configuration");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let summary = if dry_run {
        info!(data_dir = %config.data_dir.display(), "dry run: writing to an in-memory store");
        let store = Arc::new(MemoryStore::new(store_config.max_connections as usize));
        runtime.block_on(run_timeframes(store, &config))
    } else {
        runtime.block_on(load_postgres(&store_config, &config))?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_download(
    tickers: Vec<String>,
    range: String,
    interval: String,
    start: Option<String>,
    end: Option<String>,
    output_dir: PathBuf,
) -> Result<()> {
    let window = match (start.as_deref(), end.as_deref()) {
        (Some(start), Some(end)) => {
            let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
                .with_context(|| format!("invalid --start {start:?}"))?;
            let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
                .with_context(|| format!("invalid --end {end:?}"))?;
            FetchWindow::dates(start, end)?
        }
        _ => FetchWindow::Range(range),
    };
    let request = DownloadRequest { window, interval };

    let provider = YahooProvider::new()?;
    let progress = StdoutProgress {
        label: request.label(),
    };
    let ticker_refs: Vec<&str> = tickers.iter().map(|s| s.as_str()).collect();

    let summary = download_tickers(&provider, &output_dir, &ticker_refs, &request, &progress);

    if !summary.all_succeeded() {
        for (ticker, err) in &summary.errors {
            eprintln!("Error for {ticker}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("=== Load Summary ===");
    println!(
        "{:<10} {:<20} {:>7} {:>8} {:>7} {:>10} {:>9}",
        "Timeframe", "Table", "Loaded", "Skipped", "Failed", "Inserted", "Seconds"
    );
    println!("{}", "-".repeat(77));
    for tf in &summary.timeframes {
        println!(
            "{:<10} {:<20} {:>7} {:>8} {:>7} {:>10} {:>9.2}",
            tf.label,
            tf.table.as_str(),
            tf.loaded(),
            tf.skipped(),
            tf.failed(),
            tf.rows_inserted(),
            tf.elapsed.as_secs_f64()
        );
    }
    println!();
    println!(
        "Total: {} rows inserted in {:.2} seconds",
        summary.rows_inserted(),
        summary.elapsed.as_secs_f64()
    );

    for tf in &summary.timeframes {
        if let Some(err) = &tf.listing_error {
            println!("ERROR: cannot list {}: {err}", tf.directory.display());
        }
        for file in &tf.files {
            match &file.outcome {
                FileOutcome::Skipped { missing } => println!(
                    "SKIPPED: {}/{} (missing {})",
                    tf.label,
                    file.file_name(),
                    missing.join(", ")
                ),
                FileOutcome::Failed { stage, reason } => println!(
                    "FAILED:  {}/{} [{stage}] {reason}",
                    tf.label,
                    file.file_name()
                ),
                FileOutcome::Loaded { .. } => {}
            }
        }
    }
    println!();
}
