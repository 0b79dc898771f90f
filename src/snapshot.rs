//! Metrics snapshot job: fetch → derive → insert, one ticker at a time

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::api::{ApiRateLimiter, MarketDataProvider};
use crate::database::MetricsStore;
use crate::metrics::derive_metrics;
use crate::models::{InfoBundle, MetricRecord};

/// What happened to one ticker
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    Inserted(MetricRecord),
    NoHistory,
    NotConfirmed,
    Failed(String),
}

impl TickerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TickerOutcome::Inserted(_))
    }
}

/// Counters printed at the end of a snapshot run
#[derive(Debug, Default)]
pub struct SnapshotSummary {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub outcomes: Vec<(String, TickerOutcome)>,
}

impl SnapshotSummary {
    fn record(&mut self, ticker: &str, outcome: TickerOutcome) {
        if outcome.is_success() {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push((ticker.to_string(), outcome));
    }
}

/// Drives the snapshot over a ticker list
pub struct SnapshotJob<'a> {
    provider: &'a dyn MarketDataProvider,
    store: &'a dyn MetricsStore,
    rate_limiter: ApiRateLimiter,
    history_period_days: u32,
}

impl<'a> SnapshotJob<'a> {
    pub fn new(
        provider: &'a dyn MarketDataProvider,
        store: &'a dyn MetricsStore,
        rate_limiter: ApiRateLimiter,
        history_period_days: u32,
    ) -> Self {
        Self { provider, store, rate_limiter, history_period_days }
    }

    /// Process every ticker in order. Never aborts early.
    pub async fn run(&self, tickers: &[String]) -> SnapshotSummary {
        info!("📊 Processing {} tickers...", tickers.len());

        let mut summary = SnapshotSummary { total: tickers.len(), ..Default::default() };

        for (i, ticker) in tickers.iter().enumerate() {
            info!("Processing {} ({}/{})...", ticker, i + 1, tickers.len());

            let outcome = self.process_ticker(ticker).await;
            match &outcome {
                TickerOutcome::Inserted(_) => info!("✅ Inserted data for {}", ticker),
                TickerOutcome::NoHistory => warn!("⚠️ No historical data for {}, skipping.", ticker),
                TickerOutcome::NotConfirmed => warn!("⚠️ No data returned for {} insert", ticker),
                TickerOutcome::Failed(e) => error!("❌ Error processing {}: {}", ticker, e),
            }
            summary.record(ticker, outcome);

            if i + 1 < tickers.len() {
                self.rate_limiter.wait().await;
            }
        }

        summary
    }

    /// Fetch, derive and persist a single ticker
    pub async fn process_ticker(&self, ticker: &str) -> TickerOutcome {
        let history = match self.provider.get_price_history(ticker, self.history_period_days).await {
            Ok(history) => history,
            Err(e) => return TickerOutcome::Failed(format!("history fetch failed: {}", e)),
        };
        if history.is_empty() {
            return TickerOutcome::NoHistory;
        }

        let info = match self.provider.get_info(ticker).await {
            Ok(info) => info,
            Err(e) => {
                warn!("⚠️ Could not fetch info for {}: {}", ticker, e);
                InfoBundle::empty()
            }
        };

        let Some(record) = derive_metrics(ticker, &history, &info, Utc::now()) else {
            return TickerOutcome::NoHistory;
        };
        debug!("Derived metrics for {}: {:?}", ticker, record);

        match self.store.insert_metric(&record).await {
            Ok(rows) if rows.is_empty() => TickerOutcome::NotConfirmed,
            Ok(_) => TickerOutcome::Inserted(record),
            Err(e) => TickerOutcome::Failed(format!("insert failed: {}", e)),
        }
    }
}
