//! Market bar representation and validation.

use crate::domain::error::SigtraderError;
use chrono::NaiveDateTime;

/// One price bar with its quoted spread.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub spread: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Validated, chronologically ordered bar series.
///
/// Construction rejects empty input, non-increasing timestamps, and
/// negative or non-finite prices/spreads.
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    bars: Vec<Bar>,
}

impl Market {
    pub fn new(bars: Vec<Bar>) -> Result<Self, SigtraderError> {
        if bars.is_empty() {
            return Err(SigtraderError::InvalidMarketData {
                reason: "market contains no bars".into(),
            });
        }

        for (i, bar) in bars.iter().enumerate() {
            let prices = [bar.open, bar.high, bar.low, bar.close, bar.spread];
            if prices.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(SigtraderError::InvalidMarketData {
                    reason: format!("bar {i} has a negative or non-finite price field"),
                });
            }
            if bar.high < bar.low {
                return Err(SigtraderError::InvalidMarketData {
                    reason: format!("bar {i} has high below low"),
                });
            }
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(SigtraderError::InvalidMarketData {
                    reason: format!(
                        "timestamps must be strictly increasing (bar {i} at {})",
                        bar.timestamp
                    ),
                });
            }
        }

        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.bars.len() - 1
    }

    pub fn bar(&self, index: usize) -> &Bar {
        &self.bars[index]
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn close(&self, index: usize) -> f64 {
        self.bars[index].close
    }

    /// Wall-clock span from the first to the last bar.
    pub fn time_span(&self) -> chrono::Duration {
        self.bars[self.last_index()].timestamp - self.bars[0].timestamp
    }

    /// Span in calendar days, for annualization.
    pub fn calendar_days(&self) -> f64 {
        self.time_span().num_seconds() as f64 / 86_400.0
    }
}
