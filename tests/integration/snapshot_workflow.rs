//! Snapshot job end to end: mock Yahoo server into the local store

use pretty_assertions::assert_eq;
use serde_json::json;
use stock_metrics::api::ApiRateLimiter;
use stock_metrics::snapshot::{SnapshotJob, TickerOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{database, logging, market_data, test_data};

async fn mount_chart(server: &MockServer, symbol: &str, closes: &[f64], volumes: &[i64]) {
    Mock::given(method("GET"))
        .and(path(format!("/v8/finance/chart/{}", symbol)))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data::chart_response(closes, volumes)))
        .mount(server)
        .await;
}

async fn mount_info(server: &MockServer, symbol: &str, short_percent: f64, float_shares: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/v10/finance/quoteSummary/{}", symbol)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(test_data::quote_summary_response(short_percent, float_shares)),
        )
        .mount(server)
        .await;
}

#[test_log::test(tokio::test)]
async fn test_snapshot_over_default_watchlist() {
    logging::log_test_step("Testing snapshot job end to end");

    let server = MockServer::start().await;
    market_data::mount_session(&server).await;
    let history = test_data::create_test_history(30);
    let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
    let volumes: Vec<i64> = history.iter().map(|b| b.volume).collect();

    // A and TSLA have full data; GME has a squeeze on the last session
    mount_chart(&server, "A", &closes, &volumes).await;
    mount_info(&server, "A", 0.012, 285_000_000).await;
    mount_chart(&server, "TSLA", &closes, &volumes).await;
    mount_info(&server, "TSLA", 0.025, 2_800_000_000).await;

    let mut squeeze_closes = closes.clone();
    let mut squeeze_volumes = volumes.clone();
    *squeeze_closes.last_mut().unwrap() = closes[28] * 1.5;
    *squeeze_volumes.last_mut().unwrap() = 40_000_000;
    mount_chart(&server, "GME", &squeeze_closes, &squeeze_volumes).await;
    mount_info(&server, "GME", 0.2, 400_000_000).await;

    // AA is unknown upstream, AMC has a result with no sessions
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AA"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"chart": {"result": null}})))
        .mount(&server)
        .await;
    mount_chart(&server, "AMC", &[], &[]).await;

    let provider = market_data::yahoo_client(&server);
    let store = database::init_memory_database().await;
    let job = SnapshotJob::new(&provider, &store, ApiRateLimiter::new(0), 30);

    let tickers: Vec<String> = ["A", "AA", "TSLA", "GME", "AMC"].iter().map(|s| s.to_string()).collect();
    let summary = job.run(&tickers).await;

    logging::log_test_data("Outcomes", &summary.outcomes);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.successful + summary.failed, summary.total);
    assert_eq!(summary.outcomes[1], ("AA".to_string(), TickerOutcome::NoHistory));
    assert_eq!(summary.outcomes[4], ("AMC".to_string(), TickerOutcome::NoHistory));

    assert_eq!(store.count().await.unwrap(), 3);

    let gme = store.metrics_for_ticker("GME").await.unwrap();
    assert_eq!(gme.len(), 1);
    assert!(gme[0].price_spike);
    assert!(gme[0].volume_spike);
    assert_eq!(gme[0].volume, 40_000_000);
    assert_eq!(gme[0].float_shares, Some(400_000_000));
    assert_eq!(gme[0].days_to_cover, Some(0.2 * 400_000_000.0 / 40_000_000.0));

    let tsla = store.metrics_for_ticker("TSLA").await.unwrap();
    assert!(!tsla[0].price_spike);
    assert!(tsla[0].volatility_14d.is_some());
}

#[test_log::test(tokio::test)]
async fn test_info_failure_still_inserts_row() {
    let server = MockServer::start().await;
    market_data::mount_session(&server).await;
    let history = test_data::create_test_history(5);
    let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
    let volumes: Vec<i64> = history.iter().map(|b| b.volume).collect();
    mount_chart(&server, "GME", &closes, &volumes).await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/GME"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let provider = market_data::yahoo_client(&server);
    let store = database::init_memory_database().await;
    let job = SnapshotJob::new(&provider, &store, ApiRateLimiter::new(0), 30);

    let summary = job.run(&["GME".to_string()]).await;
    assert_eq!(summary.successful, 1);

    let rows = store.metrics_for_ticker("GME").await.unwrap();
    assert_eq!(rows[0].price, 102.0);
    assert_eq!(rows[0].short_interest, None);
    assert_eq!(rows[0].float_shares, None);
    assert_eq!(rows[0].days_to_cover, None);
    // five sessions is not enough for a 14-day window
    assert_eq!(rows[0].volatility_14d, None);
}
