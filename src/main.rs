use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;

use stock_metrics::api::{ApiRateLimiter, YahooClient};
use stock_metrics::database;
use stock_metrics::models::Config;
use stock_metrics::reconcile::{run_filing_job, FilingJobStatus};
use stock_metrics::snapshot::SnapshotJob;
use stock_metrics::utils::{init_logging, parse_date_arg, today_utc};

/// Stock metrics collector and FINRA short interest reconciler
#[derive(Parser)]
#[command(name = "stock-metrics")]
#[command(version)]
#[command(about = "Snapshot stock metrics into stock_metrics and reconcile FINRA short interest filings")]
#[command(long_about = "
Two batch jobs against the stock_metrics table:

  snapshot  fetch 30 days of history + key statistics per ticker, derive
            volatility / spike flags / days-to-cover and insert one row each
  finra     load the FINRA short interest file (pipe-delimited) and write the
            filing values onto every row from settlement date + 1 to today

Connection settings come from SUPABASE_URL and SUPABASE_KEY (a .env file is
read if present). Use --local-db to work against a local SQLite file instead.

Examples:
  stock-metrics snapshot
  stock-metrics --tickers GME,AMC snapshot
  stock-metrics finra --file ~/Downloads/shrt20250715.csv
  stock-metrics --local-db metrics.db finra --today 20250713
")]
struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Use a local SQLite database instead of the hosted datastore
    #[arg(long, global = true, value_name = "PATH")]
    local_db: Option<PathBuf>,

    /// Comma separated ticker list overriding TICKERS / the built-in watchlist
    #[arg(long, short = 't', global = true, value_delimiter = ',')]
    tickers: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch market data and insert one metrics row per ticker
    Snapshot,

    /// Apply FINRA short interest filings to existing metrics rows
    Finra {
        /// Filing file (defaults to FINRA_FILE_NAME in the download directory)
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        /// Last day to update, YYYYMMDD or YYYY-MM-DD (defaults to today, UTC)
        #[arg(long, value_parser = parse_date_arg)]
        today: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::from_env(cli.local_db.clone()).context("Configuration error")?;
    if !cli.tickers.is_empty() {
        config = config.with_tickers(cli.tickers.clone()).context("Configuration error")?;
    }

    match cli.command {
        Command::Snapshot => run_snapshot(&config).await,
        Command::Finra { file, today } => {
            let path = config.filing_path_or(file.as_deref());
            run_finra(&config, &path, today.unwrap_or_else(today_utc)).await
        }
    }
}

async fn run_snapshot(config: &Config) -> Result<ExitCode> {
    let store = database::connect(&config.datastore)
        .await
        .context("Failed to open datastore")?;
    let provider = YahooClient::new(&config.market_data_base_url)
        .and_then(|client| client.with_cookie_url(&config.market_data_cookie_url))
        .context("Failed to build market-data client")?;
    let job = SnapshotJob::new(
        &provider,
        store.as_ref(),
        ApiRateLimiter::new(config.ticker_delay_ms),
        config.history_period_days,
    );

    let summary = job.run(&config.tickers).await;

    println!("\n📈 Processing complete!");
    println!("✅ Successful: {}", summary.successful);
    println!("❌ Failed: {}", summary.failed);
    println!("📊 Total: {}", summary.total);

    // Partial failure is still a completed run
    Ok(ExitCode::SUCCESS)
}

async fn run_finra(config: &Config, path: &Path, today: NaiveDate) -> Result<ExitCode> {
    let status = run_filing_job(path, &config.tickers, &config.datastore, today)
        .await
        .context("Failed to open datastore")?;

    if let FilingJobStatus::Completed(summary) = &status {
        println!("\n✅ FINRA data processing completed.");
        println!("✅ Days updated: {} ({} rows)", summary.days_updated, summary.rows_updated);
        println!("⚠️ Days without matching rows: {}", summary.days_without_match);
        println!("❌ Failed updates: {}", summary.days_failed);
    }

    Ok(if status.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
