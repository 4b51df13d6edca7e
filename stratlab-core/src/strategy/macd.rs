//! MACD crossover strategy.

use crate::domain::{PriceSeries, Signal, SignalSeries};
use crate::params::{ParamSet, ParamSpace, ParamSpec};

use super::{ewm_mean_span, param_or, SignalProvider};

pub const FAST_PERIOD: &str = "Fast EMA Period";
pub const SLOW_PERIOD: &str = "Slow EMA Period";
pub const SIGNAL_SMOOTHING: &str = "MACD Signal Smoothing";

/// Enter when the MACD line crosses above its signal line, exit when it
/// crosses back below.
#[derive(Debug, Clone)]
pub struct MacdCross {
    pub fast: i64,
    pub slow: i64,
    pub smoothing: i64,
}

impl Default for MacdCross {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            smoothing: 9,
        }
    }
}

impl SignalProvider for MacdCross {
    fn name(&self) -> &str {
        "macd_cross"
    }

    fn space(&self) -> ParamSpace {
        let mut space = ParamSpace::new();
        space.insert(FAST_PERIOD, ParamSpec::Int { low: 2, high: 50, step: None });
        space.insert(SLOW_PERIOD, ParamSpec::Int { low: 10, high: 200, step: None });
        space.insert(SIGNAL_SMOOTHING, ParamSpec::Int { low: 2, high: 50, step: None });
        space
    }

    fn signals(&self, prices: &PriceSeries, params: &ParamSet) -> SignalSeries {
        let fast = param_or(params, FAST_PERIOD, self.fast as f64).max(1.0);
        let slow = param_or(params, SLOW_PERIOD, self.slow as f64).max(1.0);
        let smoothing = param_or(params, SIGNAL_SMOOTHING, self.smoothing as f64).max(1.0);

        let closes: Vec<f64> = prices.closes().collect();
        let fast_ema = ewm_mean_span(&closes, fast.round());
        let slow_ema = ewm_mean_span(&closes, slow.round());
        let macd: Vec<f64> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();
        let signal_line = ewm_mean_span(&macd, smoothing.round());

        // Differences below rounding scale are EWM float noise, not
        // crossovers. Snap them to zero before comparing.
        let diff: Vec<f64> = macd
            .iter()
            .zip(signal_line.iter())
            .enumerate()
            .map(|(i, (m, s))| {
                let d = m - s;
                let tol = 1e-9 * closes[i].abs().max(1.0);
                if d.abs() <= tol {
                    0.0
                } else {
                    d
                }
            })
            .collect();

        let mut out = SignalSeries::new();
        // A crossover is a strict sign change of the spread; a zero spread
        // (flat prices, warm-up) never fires. The first bar has no prior
        // value to cross from.
        for i in 1..closes.len() {
            let ts = prices.bars()[i].timestamp;
            if diff[i] > 0.0 && diff[i - 1] < 0.0 {
                out.set(ts, Signal::Enter);
            } else if diff[i] < 0.0 && diff[i - 1] > 0.0 {
                out.set(ts, Signal::Exit);
            }
        }
        out
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

    #[test]
    fn flat_prices_produce_no_signals() {
        let prices = series(&[100.0; 40]);
        let signals = MacdCross::default().signals(&prices, &ParamSet::new());
        assert_eq!(signals.active_count(), 0);
    }

    #[test]
    fn flat_prices_at_large_scale_produce_no_signals() {
        // Rounding noise grows with price magnitude; the tolerance must too.
        let prices = series(&[1.0e6; 40]);
        let signals = MacdCross::default().signals(&prices, &ParamSet::new());
        assert_eq!(signals.active_count(), 0);
    }

    #[test]
    fn trend_reversal_produces_entry_then_exit() {
        // Long decline, sharp rally, then a decline again: MACD crosses up
        // during the rally and back down afterwards.
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        closes.extend((0..15).map(|i| 70.0 + 3.0 * i as f64));
        closes.extend((0..15).map(|i| 115.0 - 3.0 * i as f64));
        let prices = series(&closes);

        let signals = MacdCross::default().signals(&prices, &ParamSet::new());
        let ordered: Vec<Signal> = prices
            .bars()
            .iter()
            .map(|b| signals.get(b.timestamp))
            .filter(|s| *s != Signal::Hold)
            .collect();

        assert!(ordered.contains(&Signal::Enter));
        assert!(ordered.contains(&Signal::Exit));
        assert_eq!(ordered[0], Signal::Enter);
    }

    #[test]
    fn params_override_defaults() {
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        closes.extend((0..20).map(|i| 80.0 + 2.0 * i as f64));
        let prices = series(&closes);

        let provider = MacdCross::default();
        let defaults = provider.signals(&prices, &ParamSet::new());

        let mut params = ParamSet::new();
        params.insert(FAST_PERIOD.into(), crate::params::ParamValue::Int(3));
        params.insert(SLOW_PERIOD.into(), crate::params::ParamValue::Int(8));
        params.insert(SIGNAL_SMOOTHING.into(), crate::params::ParamValue::Int(2));
        let tuned = provider.signals(&prices, &params);

        // A much faster MACD reacts earlier; the signal sets must differ.
        let first_active = |s: &SignalSeries| {
            prices
                .bars()
                .iter()
                .position(|b| s.get(b.timestamp) != Signal::Hold)
        };
        assert_ne!(first_active(&defaults), first_active(&tuned));
    }

    #[test]
    fn declared_space_validates() {
        assert!(MacdCross::default().space().validate().is_ok());
    }
}
