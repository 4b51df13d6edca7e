//! Bar — the fundamental market data unit.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// OHLC observation at a single timestamp. Volume is optional: some CSV
/// sources omit it and the engine never reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// An ordered, validated sequence of bars.
///
/// Construction enforces the two structural invariants the engine relies on:
/// strictly increasing timestamps and finite closes. After construction the
/// series is read-only; the engine only ever borrows it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Validate and wrap a bar sequence.
    pub fn new(bars: Vec<Bar>) -> Result<Self, DataError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.close.is_finite() {
                return Err(DataError::BadClose { index });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(DataError::NonMonotonicTimestamps { index });
            }
        }
        Ok(Self { bars })
    }

    /// An empty series. Always valid; the engine reports all-zero metrics for it.
    pub fn empty() -> Self {
        Self { bars: Vec::new() }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_close(&self) -> Option<f64> {
        self.bars.first().map(|b| b.close)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Sub-series covering `[start, end]` by calendar date, inclusive.
    ///
    /// Validation is not re-run: a slice of a monotone series is monotone.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let bars = self
            .bars
            .iter()
            .filter(|b| {
                let d = b.timestamp.date();
                d >= start && d <= end
            })
            .cloned()
            .collect();
        Self { bars }
    }

    /// Closes in timestamp order.
    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close)
    }
}
