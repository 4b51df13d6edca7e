//! Export — CSV and JSON artifact generation for search outcomes.
//!
//! Scan rows persist as CSV in a fixed column order so downstream tooling
//! can rely on the header. Search results persist as pretty JSON for
//! round-tripping into later analysis sessions.

use std::path::Path;

use anyhow::{Context, Result};

use crate::scan::ScanRow;
use crate::search::SearchResult;

// ─── CSV export ─────────────────────────────────────────────────────

/// Serialize scan rows as CSV.
///
/// Columns: series_id, period_start, period_end, template_name,
/// net_profit, win_rate
pub fn scan_csv(rows: &[ScanRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "series_id",
        "period_start",
        "period_end",
        "template_name",
        "net_profit",
        "win_rate",
    ])?;

    for row in rows {
        wtr.write_record([
            &row.series_id,
            &row.period_start.to_string(),
            &row.period_end.to_string(),
            &row.template_name,
            &format!("{:.2}", row.net_profit),
            &format!("{:.2}", row.win_rate),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write scan rows to a CSV file.
pub fn write_scan_csv(path: &Path, rows: &[ScanRow]) -> Result<()> {
    let csv = scan_csv(rows)?;
    std::fs::write(path, csv)
        .with_context(|| format!("failed to write scan CSV to {}", path.display()))
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize ranked search results to pretty JSON.
pub fn results_json(results: &[SearchResult]) -> Result<String> {
    serde_json::to_string_pretty(results).context("failed to serialize search results to JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stratlab_core::engine::BacktestReport;
    use stratlab_core::params::ParamSet;

    fn row() -> ScanRow {
        ScanRow {
            series_id: "BTCUSD".into(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            template_name: "macd_cross".into(),
            net_profit: 1234.5678,
            win_rate: 62.5,
        }
    }

    #[test]
    fn scan_csv_header_and_order() {
        let csv = scan_csv(&[row()]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "series_id,period_start,period_end,template_name,net_profit,win_rate"
        );
        assert_eq!(
            lines.next().unwrap(),
            "BTCUSD,2024-01-01,2024-06-30,macd_cross,1234.57,62.50"
        );
    }

    #[test]
    fn scan_csv_empty_is_header_only() {
        let csv = scan_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn scan_csv_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.csv");
        write_scan_csv(&path, &[row(), row()]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn results_json_includes_params_and_metrics() {
        let mut params = ParamSet::new();
        params.insert(
            "Fast EMA Period".into(),
            stratlab_core::params::ParamValue::Int(12),
        );
        let result = SearchResult {
            task_id: 0,
            params,
            report: BacktestReport::default(),
        };

        let json = results_json(&[result]).unwrap();
        assert!(json.contains("Fast EMA Period"));
        assert!(json.contains("net_profit"));
    }
}
