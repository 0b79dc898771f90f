//! FINRA reconciliation job: apply each filing to every day of its window

use chrono::NaiveDate;
use std::path::Path;
use tracing::{error, info, warn};

use crate::database::{self, day_bounds, MetricsStore};
use crate::error::{Result, SyncError};
use crate::finra::{effective_days, filter_to_tickers, load_filings, unique_symbols};
use crate::models::{DatastoreConfig, FilingRecord};

/// Result of one per-day update
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Updated(usize),
    NoMatch,
    Failed(String),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileSummary {
    pub filings_processed: usize,
    pub days_updated: usize,
    pub days_without_match: usize,
    pub days_failed: usize,
    pub rows_updated: usize,
}

impl ReconcileSummary {
    fn record(&mut self, outcome: &DayOutcome) {
        match outcome {
            DayOutcome::Updated(rows) => {
                self.days_updated += 1;
                self.rows_updated += rows;
            }
            DayOutcome::NoMatch => self.days_without_match += 1,
            DayOutcome::Failed(_) => self.days_failed += 1,
        }
    }

    pub fn update_calls(&self) -> usize {
        self.days_updated + self.days_without_match + self.days_failed
    }
}

pub struct ReconcileJob<'a> {
    store: &'a dyn MetricsStore,
}

impl<'a> ReconcileJob<'a> {
    pub fn new(store: &'a dyn MetricsStore) -> Self {
        Self { store }
    }

    /// Apply every filing to its `[settlement + 1, today]` window, one day per update
    pub async fn run(&self, filings: &[FilingRecord], today: NaiveDate) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for filing in filings {
            for day in effective_days(filing.settlement_date, today) {
                let outcome = self.apply_day(filing, day).await;
                summary.record(&outcome);
            }
            summary.filings_processed += 1;
        }

        summary
    }

    /// Update the rows of `filing.symbol_code` stamped on `day`
    pub async fn apply_day(&self, filing: &FilingRecord, day: NaiveDate) -> DayOutcome {
        let symbol = &filing.symbol_code;
        let (from, to) = day_bounds(day);

        match self.store.update_finra(symbol, from, to, &filing.to_update()).await {
            Ok(0) => {
                warn!("⚠️ No records found to update for {} on {}", symbol, day);
                DayOutcome::NoMatch
            }
            Ok(rows) => {
                info!("✅ Updated {} for {} ({} records)", symbol, day, rows);
                DayOutcome::Updated(rows)
            }
            Err(e) => {
                error!("❌ Failed to update {} on {}: {}", symbol, day, e);
                DayOutcome::Failed(e.to_string())
            }
        }
    }
}

/// How a filing run ended
#[derive(Debug)]
pub enum FilingJobStatus {
    /// The file could not be read or lacks required columns
    LoadFailed(SyncError),
    /// Nothing in the file is on the watchlist
    NoMatches { rows_read: usize },
    Completed(ReconcileSummary),
}

impl FilingJobStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, FilingJobStatus::LoadFailed(_))
    }
}

/// Load the filing file, keep the watchlist tickers and apply them.
///
/// The datastore is opened only when there is at least one filing to apply;
/// failing to open it is the only `Err`.
pub async fn run_filing_job(
    path: &Path,
    tickers: &[String],
    datastore: &DatastoreConfig,
    today: NaiveDate,
) -> Result<FilingJobStatus> {
    let load = match load_filings(path) {
        Ok(load) => load,
        Err(e) => {
            error!("❌ {}", e);
            return Ok(FilingJobStatus::LoadFailed(e));
        }
    };
    info!("✅ Loaded {} records from {}", load.rows_read, path.display());
    if load.rows_dropped > 0 {
        warn!("⚠️ Dropped {} rows with missing or malformed required fields", load.rows_dropped);
    }

    let rows_read = load.rows_read;
    let filtered = filter_to_tickers(load.filings, tickers);
    if filtered.is_empty() {
        warn!("⚠️ No matching tickers found in {}", path.display());
        return Ok(FilingJobStatus::NoMatches { rows_read });
    }
    info!("📊 Processing {} filings: {:?}", filtered.len(), unique_symbols(&filtered));

    let store = database::connect(datastore).await?;
    let summary = ReconcileJob::new(store.as_ref()).run(&filtered, today).await;
    Ok(FilingJobStatus::Completed(summary))
}
