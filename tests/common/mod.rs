//! Common test utilities and helpers


/// Test data utilities
pub mod test_data {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use serde_json::{json, Value};
    use stock_metrics::models::{FilingRecord, MetricRecord, PriceBar};

    /// Create a snapshot row stamped at `timestamp`
    pub fn create_test_metric(ticker: &str, timestamp: DateTime<Utc>) -> MetricRecord {
        MetricRecord {
            ticker: ticker.to_string(),
            price: 25.0,
            volume: 1_000_000,
            short_interest: Some(0.2),
            float_shares: Some(300_000_000),
            days_to_cover: Some(60.0),
            price_spike: false,
            volume_spike: true,
            volatility_14d: Some(0.85),
            timestamp,
        }
    }

    pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn create_test_filing(symbol: &str, settlement_date: NaiveDate) -> FilingRecord {
        FilingRecord {
            symbol_code: symbol.to_string(),
            current_short_position: 52_000_000,
            previous_short_position: Some(50_000_000),
            average_daily_volume: 8_000_000,
            days_to_cover: Some(6.5),
            change_percent: Some(4.0),
            settlement_date,
            stock_split_flag: None,
        }
    }

    /// `len` daily bars with a gently rising close and constant volume
    pub fn create_test_history(len: usize) -> Vec<PriceBar> {
        (0..len)
            .map(|i| PriceBar {
                timestamp: 1_750_000_000 + i as i64 * 86_400,
                close: 100.0 + i as f64 * 0.5,
                volume: 2_000_000,
            })
            .collect()
    }

    /// Yahoo `v8/finance/chart` body for the given closes/volumes
    pub fn chart_response(closes: &[f64], volumes: &[i64]) -> Value {
        let timestamps: Vec<i64> = (0..closes.len()).map(|i| 1_750_000_000 + i as i64 * 86_400).collect();
        json!({
            "chart": {
                "result": [{
                    "meta": {"currency": "USD"},
                    "timestamp": timestamps,
                    "indicators": {"quote": [{"close": closes, "volume": volumes}]}
                }],
                "error": null
            }
        })
    }

    /// Yahoo `v10/finance/quoteSummary` body with the two fields the snapshot reads
    pub fn quote_summary_response(short_percent: f64, float_shares: i64) -> Value {
        json!({
            "quoteSummary": {
                "result": [{
                    "defaultKeyStatistics": {
                        "shortPercentOfFloat": {"raw": short_percent, "fmt": format!("{:.2}%", short_percent * 100.0)},
                        "floatShares": {"raw": float_shares, "fmt": "n/a"}
                    }
                }],
                "error": null
            }
        })
    }

    /// Pipe-delimited filing file contents
    pub fn filing_file(rows: &[&str]) -> String {
        let mut out = String::from(
            "accountingYearMonthNumber|symbolCode|issueName|issuerServicesGroupExchangeCode|marketClassCode|\
             currentShortPositionQuantity|previousShortPositionQuantity|stockSplitFlag|averageDailyVolumeQuantity|\
             daysToCoverQuantity|revisionFlag|changePercent|changePreviousNumber|settlementDate\n",
        );
        for row in rows {
            out.push_str(row);
            out.push('\n');
        }
        out
    }
}

/// Mock market-data server helpers
pub mod market_data {
    use stock_metrics::api::YahooClient;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const TEST_CRUMB: &str = "kVd2xQ9pLm3";
    pub const SESSION_COOKIE: &str = "A3=d=AQABBtest";

    /// Client whose cookie and crumb requests also go to `server`
    pub fn yahoo_client(server: &MockServer) -> YahooClient {
        YahooClient::new(&server.uri())
            .and_then(|client| client.with_cookie_url(&format!("{}/consent", server.uri())))
            .expect("Failed to build market-data client")
    }

    /// Cookie endpoint plus a crumb endpoint answering `TEST_CRUMB`
    pub async fn mount_session(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/consent"))
            .respond_with(
                ResponseTemplate::new(404).insert_header("set-cookie", format!("{}; Path=/", SESSION_COOKIE).as_str()),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TEST_CRUMB))
            .mount(server)
            .await;
    }
}

/// Logging utilities for tests
pub mod logging {
    use std::sync::Once;
    use tracing::{debug, info};

    static INIT: Once = Once::new();

    /// Initialize test logging
    pub fn init_test_logging() {
        INIT.call_once(|| {
            let _ = tracing::subscriber::set_global_default(
                tracing_subscriber::fmt()
                    .with_env_filter("stock_metrics=debug,main=debug")
                    .with_test_writer()
                    .finish(),
            );
        });
    }

    /// Log test step
    pub fn log_test_step(step: &str) {
        info!("🧪 Test Step: {}", step);
    }

    /// Log test data
    pub fn log_test_data<T: std::fmt::Debug>(label: &str, data: &T) {
        debug!("📊 {}: {:?}", label, data);
    }
}
