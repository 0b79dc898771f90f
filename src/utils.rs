use chrono::{NaiveDate, Utc};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "stock_metrics=debug" } else { "stock_metrics=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    // A subscriber may already be installed (tests)
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Today's date in UTC
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse a CLI date given as `YYYYMMDD` or `YYYY-MM-DD`
pub fn parse_date_arg(date_str: &str) -> Result<NaiveDate, String> {
    let trimmed = date_str.trim();

    if trimmed.len() == 8 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(trimmed, "%Y%m%d")
            .map_err(|e| format!("Invalid date {}: {}", trimmed, e));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| format!("Date must be YYYYMMDD or YYYY-MM-DD, got: {}", trimmed))
}
