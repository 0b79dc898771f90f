//! Per-ticker metric derivation
//!
//! Everything here is a pure function of the price history and the info
//! bundle. Missing or degenerate inputs produce `None`/`false`, never errors.

use chrono::{DateTime, Utc};

use crate::models::{InfoBundle, MetricRecord, PriceBar};

/// Rolling window (in returns) used for volatility
pub const VOLATILITY_WINDOW: usize = 14;
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
/// Close must exceed the previous close by this factor to count as a spike
pub const PRICE_SPIKE_FACTOR: f64 = 1.05;
pub const VOLUME_SPIKE_FACTOR: f64 = 2.0;
pub const VOLUME_SPIKE_LOOKBACK: usize = 10;

/// Daily percentage returns, `close[i] / close[i-1] - 1`
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Annualized volatility of the most recent `window` daily returns.
///
/// Uses the sample standard deviation, scaled by `sqrt(252)`. Returns `None`
/// when fewer than `window` returns exist or the result is not finite.
pub fn calculate_volatility(closes: &[f64], window: usize) -> Option<f64> {
    if window < 2 {
        return None;
    }
    let returns = daily_returns(closes);
    if returns.len() < window {
        return None;
    }

    let recent = &returns[returns.len() - window..];
    let n = recent.len() as f64;
    let mean = recent.iter().sum::<f64>() / n;
    let variance = recent.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let volatility = variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt();

    volatility.is_finite().then_some(volatility)
}

/// `(short_interest * float_shares) / volume`, when every input is usable
pub fn days_to_cover(short_interest: Option<f64>, float_shares: Option<f64>, volume: Option<i64>) -> Option<f64> {
    let (short_interest, float_shares, volume) = (short_interest?, float_shares?, volume?);
    if volume <= 0 {
        return None;
    }
    let days = (short_interest * float_shares) / volume as f64;
    days.is_finite().then_some(days)
}

/// Latest close above 1.05x the previous close.
/// With a single session the previous close is the latest close.
pub fn is_price_spike(closes: &[f64]) -> bool {
    let Some(&latest) = closes.last() else {
        return false;
    };
    let previous = if closes.len() > 1 { closes[closes.len() - 2] } else { latest };
    latest > previous * PRICE_SPIKE_FACTOR
}

/// Mean of the last `lookback` values (fewer if the history is shorter)
pub fn trailing_mean(values: &[i64], lookback: usize) -> Option<f64> {
    let tail = &values[values.len().saturating_sub(lookback)..];
    if tail.is_empty() {
        return None;
    }
    Some(tail.iter().map(|&v| v as f64).sum::<f64>() / tail.len() as f64)
}

/// Latest volume above twice the trailing 10-session mean volume
pub fn is_volume_spike(volumes: &[i64]) -> bool {
    match (volumes.last(), trailing_mean(volumes, VOLUME_SPIKE_LOOKBACK)) {
        (Some(&latest), Some(mean)) => latest as f64 > mean * VOLUME_SPIKE_FACTOR,
        _ => false,
    }
}

/// Build the snapshot row for `ticker`. Returns `None` only when `bars` is empty.
pub fn derive_metrics(
    ticker: &str,
    bars: &[PriceBar],
    info: &InfoBundle,
    timestamp: DateTime<Utc>,
) -> Option<MetricRecord> {
    let latest = bars.last()?;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<i64> = bars.iter().map(|b| b.volume).collect();

    let short_interest = info.get_f64("shortPercentOfFloat");
    let float_shares = info.get_f64("floatShares");

    Some(MetricRecord {
        ticker: ticker.to_string(),
        price: latest.close,
        volume: latest.volume,
        short_interest,
        float_shares: float_shares.map(|f| f.trunc() as i64),
        days_to_cover: days_to_cover(short_interest, float_shares, Some(latest.volume)),
        price_spike: is_price_spike(&closes),
        volume_spike: is_volume_spike(&volumes),
        volatility_14d: calculate_volatility(&closes, VOLATILITY_WINDOW),
        timestamp,
    })
}
