use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Row, SqlitePool};
use std::path::Path;
use tracing::info;

use crate::error::{Result, SyncError};
use crate::models::{FinraUpdate, MetricRecord, StoredMetric};
use super::{format_timestamp, MetricsStore};

/// Local SQLite mirror of the hosted `stock_metrics` table
#[derive(Clone)]
pub struct SqliteMetricsStore {
    pool: SqlitePool,
}

impl SqliteMetricsStore {
    /// Open (or create) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(SqliteConnectOptions::new().filename(path).create_if_missing(true))
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.create_schema().await?;
        info!("💾 Local metrics store ready at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stock_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                price REAL NOT NULL,
                volume INTEGER NOT NULL,
                short_interest REAL,
                float_shares INTEGER,
                days_to_cover REAL,
                price_spike INTEGER NOT NULL DEFAULT 0,
                volume_spike INTEGER NOT NULL DEFAULT 0,
                volatility_14d REAL,
                timestamp TEXT NOT NULL,
                finra_current_short INTEGER,
                finra_previous_short INTEGER,
                finra_stock_split_flag TEXT,
                finra_avg_daily_volume INTEGER,
                finra_days_to_cover REAL,
                finra_change_percent REAL,
                finra_settlement_date TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_stock_metrics_ticker_ts ON stock_metrics(ticker, timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Rows for `ticker`, oldest first
    pub async fn metrics_for_ticker(&self, ticker: &str) -> Result<Vec<MetricRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT ticker, price, volume, short_interest, float_shares, days_to_cover,
                   price_spike, volume_spike, volatility_14d, timestamp
            FROM stock_metrics
            WHERE ticker = ?
            ORDER BY timestamp, id
            "#,
        )
        .bind(ticker)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let timestamp: String = r.get("timestamp");
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| SyncError::InvalidResponse(format!("bad timestamp {}: {}", timestamp, e)))?
                    .with_timezone(&Utc);
                Ok(MetricRecord {
                    ticker: r.get("ticker"),
                    price: r.get("price"),
                    volume: r.get("volume"),
                    short_interest: r.get("short_interest"),
                    float_shares: r.get("float_shares"),
                    days_to_cover: r.get("days_to_cover"),
                    price_spike: r.get::<i64, _>("price_spike") != 0,
                    volume_spike: r.get::<i64, _>("volume_spike") != 0,
                    volatility_14d: r.get("volatility_14d"),
                    timestamp,
                })
            })
            .collect()
    }

    /// FINRA settlement date recorded on each `ticker` row, oldest first
    pub async fn finra_settlement_dates(&self, ticker: &str) -> Result<Vec<Option<NaiveDate>>> {
        let rows = sqlx::query(
            "SELECT finra_settlement_date FROM stock_metrics WHERE ticker = ? ORDER BY timestamp, id",
        )
        .bind(ticker)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                r.get::<Option<String>, _>("finra_settlement_date")
                    .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            })
            .collect())
    }

    /// Total row count
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM stock_metrics")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

#[async_trait::async_trait]
impl MetricsStore for SqliteMetricsStore {
    async fn insert_metric(&self, record: &MetricRecord) -> Result<Vec<StoredMetric>> {
        let row = sqlx::query(
            r#"
            INSERT INTO stock_metrics (
                ticker, price, volume, short_interest, float_shares, days_to_cover,
                price_spike, volume_spike, volatility_14d, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, ticker
            "#,
        )
        .bind(&record.ticker)
        .bind(record.price)
        .bind(record.volume)
        .bind(record.short_interest)
        .bind(record.float_shares)
        .bind(record.days_to_cover)
        .bind(i64::from(record.price_spike))
        .bind(i64::from(record.volume_spike))
        .bind(record.volatility_14d)
        .bind(format_timestamp(record.timestamp))
        .fetch_one(&self.pool)
        .await?;

        Ok(vec![StoredMetric {
            id: Some(row.get("id")),
            ticker: row.get("ticker"),
            finra_settlement_date: None,
        }])
    }

    async fn update_finra(
        &self,
        ticker: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        update: &FinraUpdate,
    ) -> Result<usize> {
        let result = sqlx::query(
            r#"
            UPDATE stock_metrics SET
                finra_current_short = ?,
                finra_previous_short = ?,
                finra_stock_split_flag = ?,
                finra_avg_daily_volume = ?,
                finra_days_to_cover = ?,
                finra_change_percent = ?,
                finra_settlement_date = ?
            WHERE ticker = ? AND timestamp >= ? AND timestamp < ?
            "#,
        )
        .bind(update.finra_current_short)
        .bind(update.finra_previous_short)
        .bind(&update.finra_stock_split_flag)
        .bind(update.finra_avg_daily_volume)
        .bind(update.finra_days_to_cover)
        .bind(update.finra_change_percent)
        .bind(update.finra_settlement_date.format("%Y-%m-%d").to_string())
        .bind(ticker)
        .bind(format_timestamp(from))
        .bind(format_timestamp(to))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }
}
