use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{Result, SyncError};

/// Watchlist used when neither `TICKERS` nor `--tickers` is given
pub const DEFAULT_TICKERS: &[&str] = &["A", "AA", "TSLA", "GME", "AMC"];

/// FINRA short interest file expected in the download directory
pub const DEFAULT_FINRA_FILE_NAME: &str = "shrt20250715.csv";

pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Sets the session cookie the quoteSummary crumb is tied to
pub const DEFAULT_MARKET_DATA_COOKIE_URL: &str = "https://fc.yahoo.com";

/// Table both jobs read and write
pub const METRICS_TABLE: &str = "stock_metrics";

/// One daily observation from the market-data provider
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: i64, // Unix seconds
    pub close: f64,
    pub volume: i64,
}

/// Descriptive key/value data for a ticker (`shortPercentOfFloat`, `floatShares`, ...)
#[derive(Debug, Clone, Default)]
pub struct InfoBundle {
    fields: HashMap<String, Value>,
}

impl InfoBundle {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Numeric value for `key`; null, NaN and non-numeric values are treated as absent
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        let value = match self.fields.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }
}

/// A single `stock_metrics` row produced by the snapshot job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub ticker: String,
    pub price: f64,
    pub volume: i64,
    pub short_interest: Option<f64>,
    pub float_shares: Option<i64>,
    pub days_to_cover: Option<f64>,
    #[serde(serialize_with = "flag_as_int")]
    pub price_spike: bool,
    #[serde(serialize_with = "flag_as_int")]
    pub volume_spike: bool,
    pub volatility_14d: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

// The hosted table stores spike flags as 0/1 integers.
fn flag_as_int<S: Serializer>(flag: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_i64(i64::from(*flag))
}

/// Row echoed back by the datastore after an insert
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredMetric {
    #[serde(default)]
    pub id: Option<i64>,
    pub ticker: String,
    #[serde(default)]
    pub finra_settlement_date: Option<NaiveDate>,
}

/// A parsed row of the FINRA short interest file
#[derive(Debug, Clone, PartialEq)]
pub struct FilingRecord {
    pub symbol_code: String,
    pub current_short_position: i64,
    pub previous_short_position: Option<i64>,
    pub average_daily_volume: i64,
    pub days_to_cover: Option<f64>,
    pub change_percent: Option<f64>,
    pub settlement_date: NaiveDate,
    pub stock_split_flag: Option<String>,
}

impl FilingRecord {
    /// Column values written onto every metric row in the filing's window
    pub fn to_update(&self) -> FinraUpdate {
        FinraUpdate {
            finra_current_short: self.current_short_position,
            finra_previous_short: self.previous_short_position,
            finra_stock_split_flag: self.stock_split_flag.clone(),
            finra_avg_daily_volume: self.average_daily_volume,
            finra_days_to_cover: self.days_to_cover,
            finra_change_percent: self.change_percent,
            finra_settlement_date: self.settlement_date,
        }
    }
}

/// PATCH payload for the FINRA columns of `stock_metrics`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinraUpdate {
    pub finra_current_short: i64,
    pub finra_previous_short: Option<i64>,
    pub finra_stock_split_flag: Option<String>,
    pub finra_avg_daily_volume: i64,
    pub finra_days_to_cover: Option<f64>,
    pub finra_change_percent: Option<f64>,
    pub finra_settlement_date: NaiveDate,
}

/// Where metric rows are persisted
#[derive(Debug, Clone, PartialEq)]
pub enum DatastoreConfig {
    Supabase { url: String, key: String },
    Sqlite { path: PathBuf },
}

/// Configuration for both jobs, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub datastore: DatastoreConfig,
    pub tickers: Vec<String>,
    pub finra_file_name: String,
    pub download_dir: PathBuf,
    pub ticker_delay_ms: u64,
    pub history_period_days: u32,
    pub market_data_base_url: String,
    pub market_data_cookie_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env(local_db: Option<PathBuf>) -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| std::env::var(key).ok(), local_db)
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(get: F, local_db: Option<PathBuf>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let datastore = match local_db {
            Some(path) => DatastoreConfig::Sqlite { path },
            None => {
                let url = non_empty("SUPABASE_URL");
                let key = non_empty("SUPABASE_KEY");
                let (url, key) = match (url, key) {
                    (Some(url), Some(key)) => (url, key),
                    _ => {
                        return Err(SyncError::Config(
                            "Missing required environment variables: SUPABASE_URL and/or SUPABASE_KEY".to_string(),
                        ))
                    }
                };
                Url::parse(&url)
                    .map_err(|e| SyncError::Config(format!("SUPABASE_URL is not a valid URL ({}): {}", url, e)))?;
                DatastoreConfig::Supabase { url, key }
            }
        };

        let tickers = match non_empty("TICKERS") {
            Some(list) => parse_ticker_list(&list),
            None => DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
        };
        if tickers.is_empty() {
            return Err(SyncError::Config("Ticker list is empty".to_string()));
        }

        let download_dir = match non_empty("DOWNLOAD_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .map(|home| home.join("Downloads"))
                .ok_or_else(|| SyncError::Config("Could not determine home directory; set DOWNLOAD_DIR".to_string()))?,
        };

        let market_data_base_url = non_empty("MARKET_DATA_BASE_URL")
            .unwrap_or_else(|| DEFAULT_MARKET_DATA_BASE_URL.to_string());
        Url::parse(&market_data_base_url)
            .map_err(|e| SyncError::Config(format!("MARKET_DATA_BASE_URL is not a valid URL: {}", e)))?;

        let market_data_cookie_url = non_empty("MARKET_DATA_COOKIE_URL")
            .unwrap_or_else(|| DEFAULT_MARKET_DATA_COOKIE_URL.to_string());
        Url::parse(&market_data_cookie_url)
            .map_err(|e| SyncError::Config(format!("MARKET_DATA_COOKIE_URL is not a valid URL: {}", e)))?;

        let ticker_delay_ms = parse_number(non_empty("TICKER_DELAY_MS"), "TICKER_DELAY_MS", 100u64)?;
        let history_period_days = parse_number(non_empty("HISTORY_PERIOD_DAYS"), "HISTORY_PERIOD_DAYS", 30u32)?;
        if history_period_days == 0 {
            return Err(SyncError::Config("HISTORY_PERIOD_DAYS must be at least 1".to_string()));
        }

        Ok(Config {
            datastore,
            tickers,
            finra_file_name: non_empty("FINRA_FILE_NAME").unwrap_or_else(|| DEFAULT_FINRA_FILE_NAME.to_string()),
            download_dir,
            ticker_delay_ms,
            history_period_days,
            market_data_base_url,
            market_data_cookie_url,
        })
    }

    /// Replace the watchlist (from `--tickers`)
    pub fn with_tickers(mut self, tickers: Vec<String>) -> Result<Self> {
        let tickers: Vec<String> = tickers
            .iter()
            .flat_map(|t| parse_ticker_list(t))
            .collect();
        if tickers.is_empty() {
            return Err(SyncError::Config("Ticker list is empty".to_string()));
        }
        self.tickers = tickers;
        Ok(self)
    }

    /// Full path of the FINRA file inside the download directory
    pub fn filing_path(&self) -> PathBuf {
        self.download_dir.join(&self.finra_file_name)
    }

    pub fn filing_path_or(&self, explicit: Option<&Path>) -> PathBuf {
        explicit.map(Path::to_path_buf).unwrap_or_else(|| self.filing_path())
    }
}

/// Unset falls back to `default`; a set but malformed value is a configuration error
fn parse_number<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| SyncError::Config(format!("{} must be a non-negative integer, got: {}", key, v))),
    }
}

/// Split a comma separated ticker list, normalising to upper case
pub fn parse_ticker_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}
