//! Directional signal series and edge-triggered entry detection.

use crate::domain::error::SigtraderError;
use crate::domain::market::Market;
use crate::domain::position::Side;

/// Per-bar directional signal, one value in {-1, 0, 1} per market bar.
///
/// A bar is *actionable* when its value is non-zero and differs from the
/// previous bar's value. The first bar is never actionable: a series that
/// starts mid-trend carries no observable edge.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSeries {
    values: Vec<i8>,
}

impl SignalSeries {
    pub fn new(values: Vec<i8>) -> Result<Self, SigtraderError> {
        for (i, value) in values.iter().enumerate() {
            if !(-1..=1).contains(value) {
                return Err(SigtraderError::InvalidSignal {
                    reason: format!("value {value} at index {i} is outside {{-1, 0, 1}}"),
                });
            }
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> i8 {
        self.values[index]
    }

    /// Side to enter at `index`, or `None` when the bar is not actionable.
    pub fn actionable(&self, index: usize) -> Option<Side> {
        if index == 0 || index >= self.values.len() {
            return None;
        }
        let value = self.values[index];
        if value == 0 || value == self.values[index - 1] {
            return None;
        }
        Some(if value > 0 { Side::Long } else { Side::Short })
    }

    /// Signal and market must share one index space.
    pub fn ensure_matches(&self, market: &Market) -> Result<(), SigtraderError> {
        if self.values.len() != market.len() {
            return Err(SigtraderError::InvalidSignal {
                reason: format!(
                    "signal has {} values but market has {} bars",
                    self.values.len(),
                    market.len()
                ),
            });
        }
        Ok(())
    }
}
