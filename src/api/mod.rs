use std::time::Duration;

use crate::error::Result;
use crate::models::{InfoBundle, PriceBar};

pub mod yahoo_client;
pub use yahoo_client::YahooClient;

/// Fixed pause between consecutive tickers
pub struct ApiRateLimiter {
    delay: Duration,
}

impl ApiRateLimiter {
    pub fn new(delay_ms: u64) -> Self {
        Self { delay: Duration::from_millis(delay_ms) }
    }

    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Source of daily price history and descriptive info for a ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily close/volume bars covering the trailing `period_days`, oldest first
    async fn get_price_history(&self, symbol: &str, period_days: u32) -> Result<Vec<PriceBar>>;

    /// Key/value info bundle (`shortPercentOfFloat`, `floatShares`, ...)
    async fn get_info(&self, symbol: &str) -> Result<InfoBundle>;
}
