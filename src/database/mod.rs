use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::Result;
use crate::models::{DatastoreConfig, FinraUpdate, MetricRecord, StoredMetric};

pub mod sqlite;
pub mod supabase;

pub use sqlite::SqliteMetricsStore;
pub use supabase::SupabaseClient;

/// Persistence for `stock_metrics` rows
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetricsStore: Send + Sync {
    /// Insert one snapshot row; returns the rows the store confirms (empty = not confirmed)
    async fn insert_metric(&self, record: &MetricRecord) -> Result<Vec<StoredMetric>>;

    /// Write the FINRA columns onto every `ticker` row with `from <= timestamp < to`.
    /// Returns the number of rows updated.
    async fn update_finra(
        &self,
        ticker: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        update: &FinraUpdate,
    ) -> Result<usize>;
}

/// Open the configured datastore
pub async fn connect(config: &DatastoreConfig) -> Result<Box<dyn MetricsStore>> {
    match config {
        DatastoreConfig::Supabase { url, key } => Ok(Box::new(SupabaseClient::new(url, key)?)),
        DatastoreConfig::Sqlite { path } => Ok(Box::new(SqliteMetricsStore::open(path).await?)),
    }
}

/// `[day 00:00Z, next day 00:00Z)`
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

/// Fixed-width UTC timestamp text (`2025-07-11T00:00:00.000000Z`), ordered lexically
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
