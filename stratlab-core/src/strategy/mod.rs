//! Signal providers — strategies that turn a price series into signals.
//!
//! The engine only sees the [`SignalProvider`] contract: a pure function from
//! `(prices, params)` to a signal series, plus the parameter space the
//! provider understands. Parameters missing from a set fall back to the
//! provider's built-in defaults, the same policy the scan coordinator applies
//! when a task carries no parameter set at all.

mod macd;
mod rsi;

pub use macd::MacdCross;
pub use rsi::RsiThreshold;

use crate::domain::{PriceSeries, SignalSeries};
use crate::params::{ParamSet, ParamSpace};

/// A strategy able to produce one signal per bar of a price series.
pub trait SignalProvider: Send + Sync {
    /// Stable name, used in scan rows and CLI selection.
    fn name(&self) -> &str;

    /// Parameter space this provider understands.
    fn space(&self) -> ParamSpace;

    /// Produce signals for the series. Pure: same inputs, same output.
    fn signals(&self, prices: &PriceSeries, params: &ParamSet) -> SignalSeries;
}

/// Read a numeric parameter, falling back to `default` when absent or
/// non-numeric.
pub(crate) fn param_or(params: &ParamSet, name: &str, default: f64) -> f64 {
    params.get(name).and_then(|v| v.as_f64()).unwrap_or(default)
}

/// Exponentially weighted mean with the given smoothing factor `alpha`,
/// using expanding weights (matching pandas `ewm(adjust=True)`): early
/// values are averages over the points seen so far, not biased toward the
/// seed value.
pub(crate) fn ewm_mean(values: &[f64], alpha: f64) -> Vec<f64> {
    let decay = 1.0 - alpha;
    let mut out = Vec::with_capacity(values.len());
    let mut num = 0.0;
    let mut den = 0.0;
    for &x in values {
        num = x + decay * num;
        den = 1.0 + decay * den;
        out.push(num / den);
    }
    out
}

/// Span-parameterized EWM: alpha = 2 / (span + 1).
pub(crate) fn ewm_mean_span(values: &[f64], span: f64) -> Vec<f64> {
    ewm_mean(values, 2.0 / (span + 1.0))
}
