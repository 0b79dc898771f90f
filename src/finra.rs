//! FINRA short interest file loading
//!
//! The file is pipe-delimited with a header row. Rows missing any of
//! `symbolCode`, `currentShortPositionQuantity`, `averageDailyVolumeQuantity`
//! or `settlementDate` are dropped; other numeric columns that fail to parse
//! are carried as `None`.

use chrono::{Duration, NaiveDate};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::models::FilingRecord;

pub const COL_SYMBOL: &str = "symbolCode";
pub const COL_CURRENT_SHORT: &str = "currentShortPositionQuantity";
pub const COL_PREVIOUS_SHORT: &str = "previousShortPositionQuantity";
pub const COL_AVG_DAILY_VOLUME: &str = "averageDailyVolumeQuantity";
pub const COL_DAYS_TO_COVER: &str = "daysToCoverQuantity";
pub const COL_CHANGE_PERCENT: &str = "changePercent";
pub const COL_SETTLEMENT_DATE: &str = "settlementDate";
pub const COL_STOCK_SPLIT_FLAG: &str = "stockSplitFlag";

const REQUIRED_COLUMNS: [&str; 4] = [COL_SYMBOL, COL_CURRENT_SHORT, COL_AVG_DAILY_VOLUME, COL_SETTLEMENT_DATE];

/// Result of reading a filing file
#[derive(Debug, Clone, Default)]
pub struct FilingLoad {
    pub filings: Vec<FilingRecord>,
    pub rows_read: usize,
    pub rows_dropped: usize,
}

/// Load and clean the filing file at `path`
pub fn load_filings(path: &Path) -> Result<FilingLoad> {
    let file = std::fs::File::open(path).map_err(|e| SyncError::FilingLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    read_filings(file).map_err(|e| match e {
        SyncError::FilingLoad { reason, .. } => SyncError::FilingLoad {
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

/// Parse filing rows from any reader
pub fn read_filings<R: Read>(reader: R) -> Result<FilingLoad> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !columns.contains_key(c))
        .collect();
    if !missing.is_empty() {
        return Err(SyncError::FilingLoad {
            path: String::from("<input>"),
            reason: format!("missing columns: {}", missing.join(", ")),
        });
    }

    let mut load = FilingLoad::default();
    for record in csv_reader.records() {
        let record = record?;
        load.rows_read += 1;
        match parse_row(&record, &columns) {
            Some(filing) => load.filings.push(filing),
            None => {
                debug!("Dropping malformed filing row {}: {:?}", load.rows_read, record);
                load.rows_dropped += 1;
            }
        }
    }

    Ok(load)
}

fn field<'a>(record: &'a StringRecord, columns: &HashMap<&str, usize>, name: &str) -> Option<&'a str> {
    columns
        .get(name)
        .and_then(|&i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_row(record: &StringRecord, columns: &HashMap<&str, usize>) -> Option<FilingRecord> {
    let get = |name: &str| field(record, columns, name);

    Some(FilingRecord {
        symbol_code: get(COL_SYMBOL)?.to_string(),
        current_short_position: parse_quantity(get(COL_CURRENT_SHORT)?)?,
        previous_short_position: get(COL_PREVIOUS_SHORT).and_then(parse_quantity),
        average_daily_volume: parse_quantity(get(COL_AVG_DAILY_VOLUME)?)?,
        days_to_cover: get(COL_DAYS_TO_COVER).and_then(parse_decimal),
        change_percent: get(COL_CHANGE_PERCENT).and_then(parse_decimal),
        settlement_date: parse_settlement_date(get(COL_SETTLEMENT_DATE)?)?,
        stock_split_flag: get(COL_STOCK_SPLIT_FLAG).map(str::to_string),
    })
}

/// Whole-share quantity; accepts `1234`, `1,234` and `1234.0`
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let cleaned = raw.replace(',', "");
    cleaned.parse::<i64>().ok().or_else(|| {
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.trunc() as i64)
    })
}

pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Settlement dates appear as `2025-06-30`, `20250630` or `06/30/2025`
pub fn parse_settlement_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split(|c| c == ' ' || c == 'T').next().unwrap_or(raw);
    ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Keep only filings whose symbol is on the watchlist
pub fn filter_to_tickers(filings: Vec<FilingRecord>, tickers: &[String]) -> Vec<FilingRecord> {
    filings
        .into_iter()
        .filter(|f| tickers.iter().any(|t| t == &f.symbol_code))
        .collect()
}

/// Unique symbols in first-seen order
pub fn unique_symbols(filings: &[FilingRecord]) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for filing in filings {
        if !symbols.contains(&filing.symbol_code) {
            symbols.push(filing.symbol_code.clone());
        }
    }
    symbols
}

/// Every day from `settlement + 1` through `today`, inclusive
pub fn effective_days(settlement: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = settlement + Duration::days(1);
    while current <= today {
        days.push(current);
        current += Duration::days(1);
    }
    days
}
