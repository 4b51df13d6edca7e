//! Domain types: bars, price series, signals.

mod bar;
mod signal;

pub use bar::{Bar, PriceSeries};
pub use signal::{Signal, SignalSeries};
