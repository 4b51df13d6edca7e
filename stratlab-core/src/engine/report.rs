//! Backtest report — the immutable result record of one simulation run.

use serde::{Deserialize, Serialize};

/// Performance report produced once per simulation run, never mutated after
/// return.
///
/// Metric access for ranking goes through [`BacktestReport::metric_by_name`]:
/// an explicit accessor rather than field-name reflection, so a misspelled
/// metric key is a visible `None` instead of a silent zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub net_profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    /// Percentage of trades closed with non-negative PnL; 0 when no trades.
    pub win_rate: f64,
    pub loss_rate: f64,
    pub buy_hold_value: f64,
    pub buy_hold_pct: f64,
    pub max_runup_value: f64,
    pub max_runup_pct: f64,
    pub max_drawdown_value: f64,
    pub max_drawdown_pct: f64,
    pub max_contracts_held: f64,
    pub max_trades_day: u32,
    pub max_trades_week: u32,
    /// Mark-to-market account value, one entry per bar (plus one for the
    /// forced liquidation point when a position was open at the end).
    pub equity_curve: Vec<f64>,
}

impl BacktestReport {
    /// Look up a scalar metric by its snake_case field name.
    ///
    /// Returns `None` for unknown names and for non-scalar fields
    /// (the equity curve).
    pub fn metric_by_name(&self, name: &str) -> Option<f64> {
        let value = match name {
            "net_profit" => self.net_profit,
            "gross_profit" => self.gross_profit,
            "gross_loss" => self.gross_loss,
            "total_trades" => f64::from(self.total_trades),
            "wins" => f64::from(self.wins),
            "losses" => f64::from(self.losses),
            "win_rate" => self.win_rate,
            "loss_rate" => self.loss_rate,
            "buy_hold_value" => self.buy_hold_value,
            "buy_hold_pct" => self.buy_hold_pct,
            "max_runup_value" => self.max_runup_value,
            "max_runup_pct" => self.max_runup_pct,
            "max_drawdown_value" => self.max_drawdown_value,
            "max_drawdown_pct" => self.max_drawdown_pct,
            "max_contracts_held" => self.max_contracts_held,
            "max_trades_day" => f64::from(self.max_trades_day),
            "max_trades_week" => f64::from(self.max_trades_week),
            _ => return None,
        };
        Some(value)
    }

    /// Variance of per-bar equity returns.
    ///
    /// Used as the deterministic tie-break when ranking results whose primary
    /// metric is equal: lower variance wins.
    pub fn equity_return_variance(&self) -> f64 {
        if self.equity_curve.len() < 2 {
            return 0.0;
        }
        let returns: Vec<f64> = self
            .equity_curve
            .windows(2)
            .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
            .collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_by_name_known_fields() {
        let report = BacktestReport {
            net_profit: 123.4,
            total_trades: 7,
            win_rate: 57.1,
            ..BacktestReport::default()
        };
        assert_eq!(report.metric_by_name("net_profit"), Some(123.4));
        assert_eq!(report.metric_by_name("total_trades"), Some(7.0));
        assert_eq!(report.metric_by_name("win_rate"), Some(57.1));
    }

    #[test]
    fn metric_by_name_unknown_is_none() {
        let report = BacktestReport::default();
        assert_eq!(report.metric_by_name("sharpe"), None);
        assert_eq!(report.metric_by_name("equity_curve"), None);
    }

    #[test]
    fn constant_equity_has_zero_variance() {
        let report = BacktestReport {
            equity_curve: vec![10_000.0; 5],
            ..BacktestReport::default()
        };
        assert_eq!(report.equity_return_variance(), 0.0);
    }

    #[test]
    fn varying_equity_has_positive_variance() {
        let report = BacktestReport {
            equity_curve: vec![10_000.0, 10_500.0, 9_800.0, 10_200.0],
            ..BacktestReport::default()
        };
        assert!(report.equity_return_variance() > 0.0);
    }

    #[test]
    fn serialization_roundtrip() {
        let report = BacktestReport {
            net_profit: 100.0,
            equity_curve: vec![10_000.0, 10_100.0],
            ..BacktestReport::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        let deser: BacktestReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, deser);
    }
}
