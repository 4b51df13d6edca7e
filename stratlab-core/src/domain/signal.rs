//! Signal — per-timestamp trade instruction.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Trade instruction attached to a timestamp.
///
/// A timestamp carries exactly one signal value, so entry and exit at the
/// same bar are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Signal {
    Enter,
    Exit,
    #[default]
    Hold,
}

/// Map from timestamp to signal, produced fresh per simulation run.
///
/// Timestamps absent from the map read as `Hold`; timestamps absent from
/// the price series are simply never looked up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalSeries {
    inner: BTreeMap<NaiveDateTime, Signal>,
}

impl SignalSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal at a timestamp, replacing any previous value.
    pub fn set(&mut self, timestamp: NaiveDateTime, signal: Signal) {
        self.inner.insert(timestamp, signal);
    }

    /// Signal at a timestamp; `Hold` if none was recorded.
    pub fn get(&self, timestamp: NaiveDateTime) -> Signal {
        self.inner.get(&timestamp).copied().unwrap_or(Signal::Hold)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of non-`Hold` entries, useful for diagnostics.
    pub fn active_count(&self) -> usize {
        self.inner.values().filter(|s| **s != Signal::Hold).count()
    }
}

impl FromIterator<(NaiveDateTime, Signal)> for SignalSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDateTime, Signal)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn missing_timestamp_reads_hold() {
        let series = SignalSeries::new();
        assert_eq!(series.get(ts(1)), Signal::Hold);
    }

    #[test]
    fn set_then_get() {
        let mut series = SignalSeries::new();
        series.set(ts(1), Signal::Enter);
        series.set(ts(2), Signal::Exit);
        assert_eq!(series.get(ts(1)), Signal::Enter);
        assert_eq!(series.get(ts(2)), Signal::Exit);
        assert_eq!(series.active_count(), 2);
    }

    #[test]
    fn one_signal_per_timestamp() {
        let mut series = SignalSeries::new();
        series.set(ts(1), Signal::Enter);
        series.set(ts(1), Signal::Exit);
        assert_eq!(series.get(ts(1)), Signal::Exit);
        assert_eq!(series.len(), 1);
    }
}
