use reqwest::{header::{HeaderMap, HeaderValue, ACCEPT}, Client};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, SyncError};
use crate::models::{InfoBundle, PriceBar, DEFAULT_MARKET_DATA_COOKIE_URL};
use super::MarketDataProvider;

/// Yahoo Finance market-data client (chart + quoteSummary endpoints)
///
/// quoteSummary only answers requests that carry a session cookie and the
/// matching `crumb` parameter. The cookie comes from `cookie_url`, the crumb
/// from `v1/test/getcrumb`; both are fetched once and reused for every ticker.
pub struct YahooClient {
    client: Client,
    base_url: String,
    cookie_url: String,
    crumb: OnceCell<String>,
}

impl YahooClient {
    /// Create a new client against `base_url` (normally `https://query2.finance.yahoo.com`)
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; stock-metrics/0.1)")
            .cookie_store(true)
            .build()?;

        // Fail early on an unusable base URL
        Url::parse(base_url)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: DEFAULT_MARKET_DATA_COOKIE_URL.to_string(),
            crumb: OnceCell::new(),
        })
    }

    /// Override where the session cookie is obtained
    pub fn with_cookie_url(mut self, cookie_url: &str) -> Result<Self> {
        Url::parse(cookie_url)?;
        self.cookie_url = cookie_url.to_string();
        Ok(self)
    }

    /// Session crumb, fetched on first use
    async fn crumb(&self) -> Result<&str> {
        let crumb = self.crumb.get_or_try_init(|| self.fetch_crumb()).await?;
        Ok(crumb.as_str())
    }

    async fn fetch_crumb(&self) -> Result<String> {
        // The cookie endpoint usually answers 404 but still sets the session cookie
        match self.client.get(&self.cookie_url).send().await {
            Ok(response) => debug!("Cookie endpoint {} answered {}", self.cookie_url, response.status()),
            Err(e) => warn!("⚠️ Could not reach cookie endpoint {}: {}", self.cookie_url, e),
        }

        let url = self.endpoint(&["v1", "test", "getcrumb"], &[])?;
        debug!("Making request to: {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(SyncError::Api { status, body });
        }

        let crumb = body.trim();
        if crumb.is_empty() || crumb.contains('<') || crumb.contains(char::is_whitespace) {
            return Err(SyncError::InvalidResponse(format!("unusable crumb: {:?}", crumb)));
        }

        info!("🔑 Obtained market-data session crumb");
        Ok(crumb.to_string())
    }

    fn endpoint(&self, segments: &[&str], params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Config(format!("Base URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn make_request(&self, url: Url) -> Result<Value> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        debug!("Making request to: {}", url);

        let response = self.client
            .get(url)
            .headers(headers)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Api { status, body });
        }

        Ok(response.json().await?)
    }
}

/// Extract close/volume bars from a `v8/finance/chart` response, skipping null sessions
pub fn parse_chart(data: &Value) -> Vec<PriceBar> {
    let Some(result) = data.pointer("/chart/result/0") else {
        return Vec::new();
    };

    let timestamps = result.get("timestamp").and_then(Value::as_array);
    let quote = result.pointer("/indicators/quote/0");
    let closes = quote.and_then(|q| q.get("close")).and_then(Value::as_array);
    let volumes = quote.and_then(|q| q.get("volume")).and_then(Value::as_array);

    let (Some(timestamps), Some(closes), Some(volumes)) = (timestamps, closes, volumes) else {
        return Vec::new();
    };

    timestamps
        .iter()
        .zip(closes)
        .zip(volumes)
        .filter_map(|((ts, close), volume)| {
            Some(PriceBar {
                timestamp: ts.as_i64()?,
                close: close.as_f64().filter(|c| c.is_finite())?,
                volume: volume.as_i64().or_else(|| volume.as_f64().map(|v| v as i64))?,
            })
        })
        .collect()
}

/// Flatten every module of a `v10/finance/quoteSummary` response into one bundle.
/// `{"raw": .., "fmt": ..}` objects are reduced to their raw value.
pub fn parse_quote_summary(data: &Value) -> InfoBundle {
    let mut fields = HashMap::new();

    if let Some(modules) = data.pointer("/quoteSummary/result/0").and_then(Value::as_object) {
        for module in modules.values().filter_map(Value::as_object) {
            for (key, value) in module {
                let flattened = match value {
                    Value::Object(obj) if obj.contains_key("raw") => obj["raw"].clone(),
                    Value::Object(obj) if obj.is_empty() => Value::Null,
                    other => other.clone(),
                };
                fields.insert(key.clone(), flattened);
            }
        }
    }

    InfoBundle::new(fields)
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooClient {
    async fn get_price_history(&self, symbol: &str, period_days: u32) -> Result<Vec<PriceBar>> {
        let url = self.endpoint(
            &["v8", "finance", "chart", symbol],
            &[("range", format!("{}d", period_days)), ("interval", "1d".to_string())],
        )?;

        let data = match self.make_request(url).await {
            Ok(data) => data,
            // Unknown / delisted symbols come back as 404 with an empty result
            Err(SyncError::Api { status: 404, .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let bars = parse_chart(&data);
        debug!("Retrieved {} price bars for {} ({}d)", bars.len(), symbol, period_days);
        Ok(bars)
    }

    async fn get_info(&self, symbol: &str) -> Result<InfoBundle> {
        let crumb = self.crumb().await?;
        let url = self.endpoint(
            &["v10", "finance", "quoteSummary", symbol],
            &[("modules", "defaultKeyStatistics".to_string()), ("crumb", crumb.to_string())],
        )?;

        let data = self.make_request(url).await?;
        if data.pointer("/quoteSummary/result/0").is_none() {
            let reason = data
                .pointer("/quoteSummary/error/description")
                .and_then(Value::as_str)
                .unwrap_or("empty quoteSummary result");
            return Err(SyncError::InvalidResponse(format!("{}: {}", symbol, reason)));
        }

        Ok(parse_quote_summary(&data))
    }
}
