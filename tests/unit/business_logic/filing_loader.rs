//! FINRA filing file loading tests

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::io::Write;
use stock_metrics::finra::{filter_to_tickers, load_filings};
use stock_metrics::SyncError;
use test_log::test;

use crate::common::test_data;

fn write_filing_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write filing file");
    file
}

#[test]
fn test_load_realistic_finra_file() {
    let contents = test_data::filing_file(&[
        "20250715|GME|GameStop Corp. Class A|A|N|52413981|50112000||8123456|6.45||4.59|2301981|2025-07-15",
        "20250715|AMC|AMC Entertainment Holdings|A|N|84000000|81000000|S|22000000|3.82||3.7|3000000|2025-07-15",
        "20250715|ZZZZ|Unrelated Inc|A|N|1000|||2000|0.5||||2025-07-15",
        "20250715|TSLA|Tesla Inc|A|N|||| |||||2025-07-15",
    ]);
    let file = write_filing_file(&contents);

    let load = load_filings(file.path()).expect("Failed to load filings");
    assert_eq!(load.rows_read, 4);
    assert_eq!(load.rows_dropped, 1);

    let filtered = filter_to_tickers(load.filings, &["GME".to_string(), "AMC".to_string(), "TSLA".to_string()]);
    assert_eq!(filtered.len(), 2);

    let gme = &filtered[0];
    assert_eq!(gme.symbol_code, "GME");
    assert_eq!(gme.current_short_position, 52_413_981);
    assert_eq!(gme.stock_split_flag, None);
    assert_eq!(gme.settlement_date, test_data::date(2025, 7, 15));

    let update = filtered[1].to_update();
    assert_eq!(update.finra_stock_split_flag.as_deref(), Some("S"));
    assert_eq!(update.finra_days_to_cover, Some(3.82));
    assert_eq!(update.finra_change_percent, Some(3.7));
}

#[test]
fn test_empty_file_is_a_load_error() {
    let file = write_filing_file("");
    assert_matches!(load_filings(file.path()), Err(SyncError::FilingLoad { .. }));
}

#[test]
fn test_comma_delimited_file_is_a_load_error() {
    let file = write_filing_file("symbolCode,currentShortPositionQuantity,averageDailyVolumeQuantity,settlementDate\nGME,1,1,2025-07-15\n");
    assert_matches!(load_filings(file.path()), Err(SyncError::FilingLoad { reason, .. }) if reason.contains("missing columns"));
}
