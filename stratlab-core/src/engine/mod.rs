//! Simulation engine — deterministic trade accounting over a signal sequence.
//!
//! One pass over the price series in timestamp order. Long-only: an `Enter`
//! signal opens a position when none is open and the per-day/per-week
//! admission caps allow it; an `Exit` signal closes it. A position still open
//! after the last bar is force-liquidated at the final close.
//!
//! Given identical `(prices, signals, config)` the report is bit-for-bit
//! reproducible: no clock, no randomness, no shared state.

mod report;

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{PriceSeries, Signal, SignalSeries};
use crate::error::ConfigError;

pub use report::BacktestReport;

/// Configuration of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Starting cash.
    pub initial_capital: f64,
    /// Percentage of current cash committed per entry, in (0, 100].
    pub order_size_pct: f64,
    /// Per-trade tick adjustment: added on entry, subtracted on exit.
    pub tick_adjust: f64,
    /// Per-trade slippage: added on entry, subtracted on exit.
    pub slippage: f64,
    /// Margin percentage; leverage = max(margin_pct / 100, 1.0).
    pub margin_pct: f64,
    /// Maximum entries admitted per calendar date.
    pub max_trades_per_day: u32,
    /// Maximum entries admitted per ISO week.
    pub max_trades_per_week: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            order_size_pct: 20.0,
            tick_adjust: 0.0,
            slippage: 0.0,
            margin_pct: 100.0,
            max_trades_per_day: 100,
            max_trades_per_week: 500,
        }
    }
}

impl SimulationConfig {
    /// Pre-flight validation. Call before any simulation runs; `simulate`
    /// itself assumes a valid config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital > 0.0) {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if !(self.order_size_pct > 0.0 && self.order_size_pct <= 100.0) {
            return Err(ConfigError::OrderSizeOutOfRange(self.order_size_pct));
        }
        if self.tick_adjust < 0.0 {
            return Err(ConfigError::NegativeAdjustment {
                field: "tick_adjust",
                value: self.tick_adjust,
            });
        }
        if self.slippage < 0.0 {
            return Err(ConfigError::NegativeAdjustment {
                field: "slippage",
                value: self.slippage,
            });
        }
        if self.margin_pct < 0.0 {
            return Err(ConfigError::NegativeAdjustment {
                field: "margin_pct",
                value: self.margin_pct,
            });
        }
        Ok(())
    }

    /// Leverage multiplier derived from the margin percentage, floored at 1.
    pub fn leverage(&self) -> f64 {
        (self.margin_pct / 100.0).max(1.0)
    }
}

/// Mutable account state, owned exclusively by one simulation run.
#[derive(Debug, Clone)]
struct Account {
    cash: f64,
    position_size: f64,
    entry_price: f64,
}

impl Account {
    fn new(cash: f64) -> Self {
        Self {
            cash,
            position_size: 0.0,
            entry_price: 0.0,
        }
    }

    fn has_position(&self) -> bool {
        self.position_size > 0.0
    }
}

/// Per-date and per-ISO-week entry counters enforcing admission caps.
///
/// Weeks are keyed by `(iso_year, iso_week)` so the same week number in
/// different years never shares a counter. Created empty at run start,
/// discarded at run end.
#[derive(Debug, Default)]
struct TradeCounters {
    by_day: BTreeMap<NaiveDate, u32>,
    by_week: BTreeMap<(i32, u32), u32>,
}

impl TradeCounters {
    fn week_key(date: NaiveDate) -> (i32, u32) {
        let iso = date.iso_week();
        (iso.year(), iso.week())
    }

    /// Initialize both counters for this date to zero on first sight.
    fn touch(&mut self, date: NaiveDate) {
        self.by_day.entry(date).or_insert(0);
        self.by_week.entry(Self::week_key(date)).or_insert(0);
    }

    fn below_caps(&self, date: NaiveDate, config: &SimulationConfig) -> bool {
        let day = self.by_day.get(&date).copied().unwrap_or(0);
        let week = self.by_week.get(&Self::week_key(date)).copied().unwrap_or(0);
        day < config.max_trades_per_day && week < config.max_trades_per_week
    }

    fn record_entry(&mut self, date: NaiveDate) {
        *self.by_day.entry(date).or_insert(0) += 1;
        *self.by_week.entry(Self::week_key(date)).or_insert(0) += 1;
    }

    fn max_day(&self) -> u32 {
        self.by_day.values().copied().max().unwrap_or(0)
    }

    fn max_week(&self) -> u32 {
        self.by_week.values().copied().max().unwrap_or(0)
    }
}

/// Running win/loss tallies, shared between in-loop exits and the forced
/// liquidation at the end.
#[derive(Debug, Default)]
struct TradeTally {
    total: u32,
    wins: u32,
    losses: u32,
    gross_profit: f64,
    gross_loss: f64,
}

impl TradeTally {
    fn record_close(&mut self, pnl: f64) {
        if pnl >= 0.0 {
            self.gross_profit += pnl;
            self.wins += 1;
        } else {
            self.gross_loss += pnl.abs();
            self.losses += 1;
        }
    }
}

/// Replay `signals` against `prices` and produce a performance report.
///
/// Pure function: no I/O, no randomness. An empty series yields an all-zero
/// report with an empty equity curve. Signals at timestamps absent from the
/// series are ignored (they are simply never looked up).
pub fn simulate(
    prices: &PriceSeries,
    signals: &SignalSeries,
    config: &SimulationConfig,
) -> BacktestReport {
    let mut account = Account::new(config.initial_capital);
    let mut counters = TradeCounters::default();
    let mut tally = TradeTally::default();

    let mut equity_curve: Vec<f64> = Vec::with_capacity(prices.len());
    let mut max_equity = account.cash;
    let mut min_equity = account.cash;
    let mut max_contracts = 0.0_f64;

    let leverage = config.leverage();

    for bar in prices.bars() {
        let date = bar.timestamp.date();
        counters.touch(date);

        match signals.get(bar.timestamp) {
            Signal::Enter
                if !account.has_position() && counters.below_caps(date, config) =>
            {
                let order_cash = config.order_size_pct / 100.0 * account.cash;
                let entry_price = bar.close + config.tick_adjust + config.slippage;
                let size = order_cash / entry_price * leverage;

                account.entry_price = entry_price;
                account.position_size = size;
                account.cash -= size * entry_price;

                tally.total += 1;
                counters.record_entry(date);
            }
            Signal::Exit if account.has_position() => {
                let exit_price = bar.close - config.tick_adjust - config.slippage;
                account.cash += account.position_size * exit_price;
                tally.record_close((exit_price - account.entry_price) * account.position_size);
                account.position_size = 0.0;
            }
            _ => {}
        }

        let equity = account.cash + account.position_size * bar.close;
        equity_curve.push(equity);
        max_equity = max_equity.max(equity);
        min_equity = min_equity.min(equity);
        max_contracts = max_contracts.max(account.position_size);
    }

    // Forced liquidation: close any position left open after the last bar.
    if account.has_position() {
        let last_close = prices.last_close().unwrap_or(account.entry_price);
        let exit_price = last_close - config.tick_adjust - config.slippage;
        account.cash += account.position_size * exit_price;
        tally.record_close((exit_price - account.entry_price) * account.position_size);
        account.position_size = 0.0;

        equity_curve.push(account.cash);
        max_equity = max_equity.max(account.cash);
        min_equity = min_equity.min(account.cash);
    }

    summarize(
        prices,
        config,
        account.cash,
        &tally,
        &counters,
        equity_curve,
        max_equity,
        min_equity,
        max_contracts,
    )
}

#[allow(clippy::too_many_arguments)]
fn summarize(
    prices: &PriceSeries,
    config: &SimulationConfig,
    final_cash: f64,
    tally: &TradeTally,
    counters: &TradeCounters,
    equity_curve: Vec<f64>,
    max_equity: f64,
    min_equity: f64,
    max_contracts: f64,
) -> BacktestReport {
    let capital = config.initial_capital;
    let net_profit = final_cash - capital;

    // Buy-and-hold benchmark: first vs. last close applied to starting
    // capital. Zero for an empty series rather than a division error.
    let (buy_hold_value, buy_hold_pct) =
        match (prices.first_close(), prices.last_close()) {
            (Some(first), Some(last)) if first != 0.0 => {
                let frac = (last - first) / first;
                (frac * capital, frac * 100.0)
            }
            _ => (0.0, 0.0),
        };

    let runup_value = max_equity - capital;
    let drawdown_value = capital - min_equity;

    let (win_rate, loss_rate) = if tally.total > 0 {
        let total = f64::from(tally.total);
        (
            f64::from(tally.wins) / total * 100.0,
            f64::from(tally.losses) / total * 100.0,
        )
    } else {
        (0.0, 0.0)
    };

    BacktestReport {
        net_profit,
        gross_profit: tally.gross_profit,
        gross_loss: tally.gross_loss,
        total_trades: tally.total,
        wins: tally.wins,
        losses: tally.losses,
        win_rate,
        loss_rate,
        buy_hold_value,
        buy_hold_pct,
        max_runup_value: runup_value,
        max_runup_pct: runup_value / capital * 100.0,
        max_drawdown_value: drawdown_value,
        max_drawdown_pct: drawdown_value / capital * 100.0,
        max_contracts_held: max_contracts,
        max_trades_day: counters.max_day(),
        max_trades_week: counters.max_week(),
        equity_curve,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new(i as u64))
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: None,
            })
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    fn signals_for(series: &PriceSeries, pattern: &[Signal]) -> SignalSeries {
        series
            .bars()
            .iter()
            .zip(pattern.iter())
            .map(|(bar, sig)| (bar.timestamp, *sig))
            .collect()
    }

    #[test]
    fn concrete_scenario_from_contract() {
        // capital 10000, 20% order size, no leverage, closes [100, 110, 105],
        // Enter/Hold/Exit: size = 2000/100 = 20, pnl = 20 * (105 - 100) = 100.
        let prices = series(&[100.0, 110.0, 105.0]);
        let signals = signals_for(&prices, &[Signal::Enter, Signal::Hold, Signal::Exit]);
        let config = SimulationConfig::default();

        let report = simulate(&prices, &signals, &config);

        assert!((report.net_profit - 100.0).abs() < 1e-9);
        assert_eq!(report.total_trades, 1);
        assert_eq!(report.wins, 1);
        assert_eq!(report.losses, 0);
        assert!((report.win_rate - 100.0).abs() < 1e-9);
        assert!((report.gross_profit - 100.0).abs() < 1e-9);
        assert_eq!(report.equity_curve.len(), 3);
        // Mark-to-market at bar 1: 8000 cash + 20 * 110 = 10200.
        assert!((report.equity_curve[1] - 10_200.0).abs() < 1e-9);
    }

    #[test]
    fn all_hold_is_the_no_trade_invariant() {
        let prices = series(&[100.0, 90.0, 120.0, 80.0]);
        let signals = SignalSeries::new();
        let config = SimulationConfig::default();

        let report = simulate(&prices, &signals, &config);

        assert_eq!(report.net_profit, 0.0);
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.win_rate, 0.0);
        assert_eq!(report.loss_rate, 0.0);
        assert!(report
            .equity_curve
            .iter()
            .all(|&e| e == config.initial_capital));
    }

    #[test]
    fn buy_hold_formula_independent_of_signals() {
        let prices = series(&[50.0, 60.0, 75.0]);
        let config = SimulationConfig::default();

        let idle = simulate(&prices, &SignalSeries::new(), &config);
        let traded = simulate(
            &prices,
            &signals_for(&prices, &[Signal::Enter, Signal::Exit, Signal::Hold]),
            &config,
        );

        let expected_pct = (75.0 - 50.0) / 50.0 * 100.0;
        assert!((idle.buy_hold_pct - expected_pct).abs() < 1e-9);
        assert!((traded.buy_hold_pct - expected_pct).abs() < 1e-9);
        assert!((idle.buy_hold_value - 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn empty_series_reports_all_zeros() {
        let report = simulate(
            &PriceSeries::empty(),
            &SignalSeries::new(),
            &SimulationConfig::default(),
        );
        assert_eq!(report.net_profit, 0.0);
        assert_eq!(report.buy_hold_pct, 0.0);
        assert_eq!(report.max_runup_value, 0.0);
        assert_eq!(report.max_drawdown_value, 0.0);
        assert_eq!(report.total_trades, 0);
        assert!(report.equity_curve.is_empty());
    }

    #[test]
    fn open_position_is_force_liquidated() {
        let prices = series(&[100.0, 110.0]);
        let signals = signals_for(&prices, &[Signal::Enter, Signal::Hold]);
        let config = SimulationConfig::default();

        let report = simulate(&prices, &signals, &config);

        // 20 units entered at 100, liquidated at 110: pnl = 200.
        assert_eq!(report.total_trades, 1);
        assert_eq!(report.wins, 1);
        assert!((report.net_profit - 200.0).abs() < 1e-9);
        // One extra equity point for the liquidation.
        assert_eq!(report.equity_curve.len(), 3);
        assert!((report.equity_curve[2] - 10_200.0).abs() < 1e-9);
    }

    #[test]
    fn slippage_and_tick_widen_the_spread() {
        let prices = series(&[100.0, 105.0]);
        let signals = signals_for(&prices, &[Signal::Enter, Signal::Exit]);
        let config = SimulationConfig {
            tick_adjust: 0.5,
            slippage: 0.5,
            ..SimulationConfig::default()
        };

        let report = simulate(&prices, &signals, &config);

        // Entry at 101, exit at 104: pnl = (104 - 101) * (2000 / 101).
        let size = 2_000.0 / 101.0;
        assert!((report.net_profit - 3.0 * size).abs() < 1e-9);
    }

    #[test]
    fn leverage_scales_position_size() {
        let prices = series(&[100.0, 110.0, 105.0]);
        let signals = signals_for(&prices, &[Signal::Enter, Signal::Hold, Signal::Exit]);
        let config = SimulationConfig {
            margin_pct: 200.0,
            ..SimulationConfig::default()
        };

        let report = simulate(&prices, &signals, &config);

        // Double leverage: 40 units instead of 20, pnl = 40 * 5 = 200.
        assert!((report.net_profit - 200.0).abs() < 1e-9);
        assert!((report.max_contracts_held - 40.0).abs() < 1e-9);
    }

    #[test]
    fn daily_cap_blocks_further_entries() {
        // Two Enter/Exit pairs on the same calendar day via intraday bars.
        let ts = |h: u32| {
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let bars: Vec<Bar> = (0..4)
            .map(|i| Bar {
                timestamp: ts(9 + i),
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume: None,
            })
            .collect();
        let prices = PriceSeries::new(bars).unwrap();
        let signals: SignalSeries = [
            (ts(9), Signal::Enter),
            (ts(10), Signal::Exit),
            (ts(11), Signal::Enter),
            (ts(12), Signal::Exit),
        ]
        .into_iter()
        .collect();

        let config = SimulationConfig {
            max_trades_per_day: 1,
            ..SimulationConfig::default()
        };
        let report = simulate(&prices, &signals, &config);

        assert_eq!(report.total_trades, 1);
        assert_eq!(report.max_trades_day, 1);
    }

    #[test]
    fn weekly_cap_spans_multiple_days() {
        // Mon/Tue/Wed/Thu of one ISO week, an Enter/Exit pair per two days.
        let prices = series(&[100.0, 100.0, 100.0, 100.0]);
        let signals = signals_for(
            &prices,
            &[Signal::Enter, Signal::Exit, Signal::Enter, Signal::Exit],
        );
        let config = SimulationConfig {
            max_trades_per_week: 1,
            ..SimulationConfig::default()
        };

        let report = simulate(&prices, &signals, &config);

        assert_eq!(report.total_trades, 1);
        assert_eq!(report.max_trades_week, 1);
    }

    #[test]
    fn enter_while_positioned_is_ignored() {
        let prices = series(&[100.0, 110.0, 120.0, 105.0]);
        let signals = signals_for(
            &prices,
            &[Signal::Enter, Signal::Enter, Signal::Enter, Signal::Exit],
        );
        let report = simulate(&prices, &signals, &SimulationConfig::default());
        assert_eq!(report.total_trades, 1);
    }

    #[test]
    fn losing_trade_accumulates_gross_loss() {
        let prices = series(&[100.0, 90.0]);
        let signals = signals_for(&prices, &[Signal::Enter, Signal::Exit]);
        let report = simulate(&prices, &signals, &SimulationConfig::default());

        assert_eq!(report.losses, 1);
        assert_eq!(report.wins, 0);
        assert!((report.gross_loss - 200.0).abs() < 1e-9);
        assert!((report.net_profit + 200.0).abs() < 1e-9);
        assert!((report.loss_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_tracks_equity_below_capital() {
        let prices = series(&[100.0, 80.0, 100.0]);
        let signals = signals_for(&prices, &[Signal::Enter, Signal::Hold, Signal::Exit]);
        let report = simulate(&prices, &signals, &SimulationConfig::default());

        // At bar 1 equity = 8000 + 20 * 80 = 9600, so drawdown = 400 (4%).
        assert!((report.max_drawdown_value - 400.0).abs() < 1e-9);
        assert!((report.max_drawdown_pct - 4.0).abs() < 1e-9);
        // Equity never exceeded capital, so run-up is zero.
        assert!((report.max_runup_value - 0.0).abs() < 1e-9);
    }

    #[test]
    fn identical_inputs_reproduce_identical_reports() {
        let prices = series(&[100.0, 103.0, 99.0, 108.0, 104.0]);
        let signals = signals_for(
            &prices,
            &[
                Signal::Enter,
                Signal::Hold,
                Signal::Exit,
                Signal::Enter,
                Signal::Exit,
            ],
        );
        let config = SimulationConfig::default();

        let a = simulate(&prices, &signals, &config);
        let b = simulate(&prices, &signals, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        let mut config = SimulationConfig {
            initial_capital: -5.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveCapital(_))
        ));

        config.initial_capital = 10_000.0;
        config.order_size_pct = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OrderSizeOutOfRange(_))
        ));

        config.order_size_pct = 120.0;
        assert!(config.validate().is_err());

        config.order_size_pct = 100.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn leverage_floors_at_one() {
        let config = SimulationConfig {
            margin_pct: 50.0,
            ..SimulationConfig::default()
        };
        assert_eq!(config.leverage(), 1.0);

        let levered = SimulationConfig {
            margin_pct: 300.0,
            ..SimulationConfig::default()
        };
        assert_eq!(levered.leverage(), 3.0);
    }
}
