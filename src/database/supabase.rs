use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE}, Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Result, SyncError};
use crate::models::{FinraUpdate, MetricRecord, StoredMetric, METRICS_TABLE};
use super::MetricsStore;

/// PostgREST client for the hosted `stock_metrics` table
pub struct SupabaseClient {
    client: Client,
    rest_url: Url,
}

impl SupabaseClient {
    /// Create a client for the project at `url` authenticated with `key`
    pub fn new(url: &str, key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(key)
            .map_err(|_| SyncError::Config("SUPABASE_KEY contains invalid header characters".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|_| SyncError::Config("SUPABASE_KEY contains invalid header characters".to_string()))?;
        headers.insert("apikey", key_value);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("stock-metrics/0.1")
            .default_headers(headers)
            .build()?;

        let mut rest_url = Url::parse(url)?;
        rest_url
            .path_segments_mut()
            .map_err(|_| SyncError::Config(format!("SUPABASE_URL cannot carry a path: {}", url)))?
            .pop_if_empty()
            .extend(["rest", "v1", METRICS_TABLE]);

        Ok(Self { client, rest_url })
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Vec<Value>> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Api { status, body });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&body)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }
}

/// PostgREST filter value for a timestamp bound, e.g. `2025-07-11T00:00:00Z`
fn filter_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait::async_trait]
impl MetricsStore for SupabaseClient {
    async fn insert_metric(&self, record: &MetricRecord) -> Result<Vec<StoredMetric>> {
        debug!("POST {} ({})", self.rest_url, record.ticker);

        let rows = self.execute(self.client.post(self.rest_url.clone()).json(record)).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(SyncError::from))
            .collect()
    }

    async fn update_finra(
        &self,
        ticker: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        update: &FinraUpdate,
    ) -> Result<usize> {
        let mut url = self.rest_url.clone();
        url.query_pairs_mut()
            .append_pair("ticker", &format!("eq.{}", ticker))
            .append_pair("timestamp", &format!("gte.{}", filter_timestamp(from)))
            .append_pair("timestamp", &format!("lt.{}", filter_timestamp(to)));

        debug!("PATCH {}", url);

        let rows = self.execute(self.client.patch(url).json(update)).await?;
        Ok(rows.len())
    }
}
