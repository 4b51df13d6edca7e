//! RSI threshold strategy.

use crate::domain::{PriceSeries, Signal, SignalSeries};
use crate::params::{ParamSet, ParamSpace, ParamSpec};

use super::{ewm_mean, param_or, SignalProvider};

pub const PERIOD: &str = "RSI Period";
pub const OVERBOUGHT: &str = "RSI Overbought";
pub const OVERSOLD: &str = "RSI Oversold";

/// Enter when RSI drops below the oversold threshold, exit when it rises
/// above the overbought threshold.
#[derive(Debug, Clone)]
pub struct RsiThreshold {
    pub period: i64,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiThreshold {
    fn default() -> Self {
        Self {
            period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

impl SignalProvider for RsiThreshold {
    fn name(&self) -> &str {
        "rsi_threshold"
    }

    fn space(&self) -> ParamSpace {
        let mut space = ParamSpace::new();
        space.insert(PERIOD, ParamSpec::Int { low: 2, high: 50, step: None });
        space.insert(OVERBOUGHT, ParamSpec::Real { low: 50.0, high: 100.0, step: None });
        space.insert(OVERSOLD, ParamSpec::Real { low: 0.0, high: 50.0, step: None });
        space
    }

    fn signals(&self, prices: &PriceSeries, params: &ParamSet) -> SignalSeries {
        let period = param_or(params, PERIOD, self.period as f64).max(1.0);
        let overbought = param_or(params, OVERBOUGHT, self.overbought);
        let oversold = param_or(params, OVERSOLD, self.oversold);

        let closes: Vec<f64> = prices.closes().collect();
        let mut out = SignalSeries::new();
        if closes.len() < 2 {
            return out;
        }

        // Wilder smoothing: EWM with alpha = 1 / period over gains and losses.
        let gains: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]).max(0.0)).collect();
        let losses: Vec<f64> = closes.windows(2).map(|w| (w[0] - w[1]).max(0.0)).collect();
        let alpha = 1.0 / period.round();
        let avg_gain = ewm_mean(&gains, alpha);
        let avg_loss = ewm_mean(&losses, alpha);

        // rsi[i] pairs with bar i + 1; the first bar has no price change.
        for (i, (&gain, &loss)) in avg_gain.iter().zip(avg_loss.iter()).enumerate() {
            let rsi = if loss > 0.0 {
                100.0 - 100.0 / (1.0 + gain / loss)
            } else if gain > 0.0 {
                100.0
            } else {
                // No movement either way; neither threshold applies.
                continue;
            };

            let ts = prices.bars()[i + 1].timestamp;
            if rsi < oversold {
                out.set(ts, Signal::Enter);
            } else if rsi > overbought {
                out.set(ts, Signal::Exit);
            }
        }
        out
    }
}
