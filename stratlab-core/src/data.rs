//! CSV price history ingestion.
//!
//! Expects a header row and a datetime first column followed by
//! OHLC(+Volume) columns in any order, matched case-insensitively. Rows with
//! non-numeric price cells are dropped; an unparsable timestamp is fatal
//! (the file is the wrong shape, not merely noisy).

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::{Bar, PriceSeries};
use crate::error::DataError;

/// Load and validate a price series from a CSV file.
pub fn load_csv(path: &Path) -> Result<PriceSeries, DataError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let col = |name: &str| -> Option<usize> {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let open_col = col("open").ok_or_else(|| DataError::MissingColumn("open".into()))?;
    let high_col = col("high").ok_or_else(|| DataError::MissingColumn("high".into()))?;
    let low_col = col("low").ok_or_else(|| DataError::MissingColumn("low".into()))?;
    let close_col = col("close").ok_or_else(|| DataError::MissingColumn("close".into()))?;
    let volume_col = col("volume");

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(raw_ts) = record.get(0) else { continue };
        let timestamp = parse_timestamp(raw_ts)?;

        let cell = |idx: usize| -> Option<f64> {
            record
                .get(idx)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };
        let (Some(open), Some(high), Some(low), Some(close)) =
            (cell(open_col), cell(high_col), cell(low_col), cell(close_col))
        else {
            // Non-numeric or missing price cell: drop the row.
            continue;
        };

        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: volume_col.and_then(cell),
        });
    }

    PriceSeries::new(bars)
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DataError> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    Err(DataError::BadTimestamp(raw.to_string()))
}
