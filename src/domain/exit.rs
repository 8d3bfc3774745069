//! Exit rules: stop-loss / take-profit level computation.
//!
//! An [`ExitStrategy`] is configured once per run; `begin` spins up an
//! [`ExitTracker`] holding the per-trade state. Static and ATR trackers are
//! inert after entry; the trailing tracker ratchets its levels from the
//! extreme price seen since entry.

use crate::domain::market::Market;
use crate::domain::position::Side;

/// How static offsets are applied to the entry price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetKind {
    /// Fraction of the entry price (0.02 = 2%).
    Percent,
    /// Absolute price distance.
    Absolute,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitStrategy {
    Static {
        stop_loss: f64,
        take_profit: f64,
        offsets: OffsetKind,
    },
    Trailing {
        trailing_stop: f64,
        trailing_profit: f64,
    },
    Atr {
        values: Vec<f64>,
        multiplier: f64,
    },
}

impl ExitStrategy {
    pub fn static_percent(stop_loss: f64, take_profit: f64) -> Self {
        ExitStrategy::Static {
            stop_loss,
            take_profit,
            offsets: OffsetKind::Percent,
        }
    }

    pub fn static_absolute(stop_loss: f64, take_profit: f64) -> Self {
        ExitStrategy::Static {
            stop_loss,
            take_profit,
            offsets: OffsetKind::Absolute,
        }
    }

    pub fn trailing(trailing_stop: f64, trailing_profit: f64) -> Self {
        ExitStrategy::Trailing {
            trailing_stop,
            trailing_profit,
        }
    }

    /// ATR-based offsets. The series is precomputed here, once, and looked
    /// up per trade; the first `period` bars have no value (warm-up).
    pub fn atr(market: &Market, period: usize, multiplier: f64) -> Self {
        ExitStrategy::Atr {
            values: average_true_range(market, period),
            multiplier,
        }
    }

    /// Start tracking a new trade. Returns `None` when the strategy cannot
    /// produce levels at this bar (ATR warm-up).
    pub fn begin(&self, side: Side, entry_price: f64, entry_index: usize) -> Option<ExitTracker> {
        match self {
            ExitStrategy::Static {
                stop_loss,
                take_profit,
                offsets,
            } => {
                let (stop_off, profit_off) = match offsets {
                    OffsetKind::Percent => (entry_price * stop_loss, entry_price * take_profit),
                    OffsetKind::Absolute => (*stop_loss, *take_profit),
                };
                Some(ExitTracker::fixed(side, entry_price, stop_off, profit_off))
            }
            ExitStrategy::Trailing {
                trailing_stop,
                trailing_profit,
            } => Some(ExitTracker::trailing(
                side,
                entry_price,
                *trailing_stop,
                *trailing_profit,
            )),
            ExitStrategy::Atr { values, multiplier } => {
                let atr = values.get(entry_index).copied()?;
                if !atr.is_finite() || atr <= 0.0 {
                    // Warm-up, or a dead market with no range to key off.
                    return None;
                }
                let offset = atr * multiplier;
                Some(ExitTracker::fixed(side, entry_price, offset, offset))
            }
        }
    }
}

/// Per-trade exit state: current levels plus optional trailing bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitTracker {
    side: Side,
    stop_loss: f64,
    take_profit: f64,
    trail: Option<TrailState>,
}

#[derive(Debug, Clone, PartialEq)]
struct TrailState {
    trailing_stop: f64,
    trailing_profit: f64,
    initial_stop: f64,
    initial_profit: f64,
    extreme: f64,
}

impl ExitTracker {
    fn fixed(side: Side, entry_price: f64, stop_offset: f64, profit_offset: f64) -> Self {
        let (stop_loss, take_profit) = match side {
            Side::Long => (entry_price - stop_offset, entry_price + profit_offset),
            Side::Short => (entry_price + stop_offset, entry_price - profit_offset),
        };
        ExitTracker {
            side,
            stop_loss,
            take_profit,
            trail: None,
        }
    }

    fn trailing(side: Side, entry_price: f64, trailing_stop: f64, trailing_profit: f64) -> Self {
        let mut tracker = Self::fixed(side, entry_price, trailing_stop, trailing_profit);
        tracker.trail = Some(TrailState {
            trailing_stop,
            trailing_profit,
            initial_stop: tracker.stop_loss,
            initial_profit: tracker.take_profit,
            extreme: entry_price,
        });
        tracker
    }

    /// Feed the current close. No-op for fixed trackers; the trailing
    /// tracker ratchets its extreme and recomputes both levels. Must be
    /// called in chronological order, before trigger evaluation for the bar.
    pub fn observe(&mut self, price: f64) {
        let Some(trail) = &mut self.trail else {
            return;
        };
        match self.side {
            Side::Long => {
                if price > trail.extreme {
                    trail.extreme = price;
                }
                self.stop_loss = trail.initial_stop.max(trail.extreme - trail.trailing_stop);
                self.take_profit = trail
                    .initial_profit
                    .max(trail.extreme + trail.trailing_profit);
            }
            Side::Short => {
                if price < trail.extreme {
                    trail.extreme = price;
                }
                self.stop_loss = trail.initial_stop.min(trail.extreme + trail.trailing_stop);
                self.take_profit = trail
                    .initial_profit
                    .min(trail.extreme - trail.trailing_profit);
            }
        }
    }

    /// Current (stop_loss_price, take_profit_price).
    pub fn levels(&self) -> (f64, f64) {
        (self.stop_loss, self.take_profit)
    }
}

/// Simple-moving-average ATR over `period` bars; NaN during warm-up.
fn average_true_range(market: &Market, period: usize) -> Vec<f64> {
    let bars = market.bars();
    let mut true_ranges = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };
        true_ranges.push(tr);
    }

    let mut atr = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() < period {
        return atr;
    }
    let mut window_sum: f64 = true_ranges[..period].iter().sum();
    atr[period - 1] = window_sum / period as f64;
    for i in period..bars.len() {
        window_sum += true_ranges[i] - true_ranges[i - period];
        atr[i] = window_sum / period as f64;
    }
    atr
}
