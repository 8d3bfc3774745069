//! Capital management: admission and sizing of new positions.
//!
//! The manager walks the bar sequence in chronological order and decides,
//! for each actionable signal, whether a position may be opened and at what
//! size. It keeps its own running ledger (cash, open-position count,
//! capital at risk) purely to gate later entries; the portfolio ledger is
//! reconstructed separately once all positions are final.

use crate::domain::error::SigtraderError;
use crate::domain::exit::ExitStrategy;
use crate::domain::market::Market;
use crate::domain::position::{Position, Side};
use crate::domain::signal::SignalSeries;

/// Allocation policy. Mirrors the admission rules variant by variant:
/// `Unlimited` never gates, the rest cap concurrency and cash, and the
/// fixed-risk variants additionally bound aggregate capital at risk.
#[derive(Debug, Clone, PartialEq)]
pub enum CapitalManagement {
    Unlimited {
        max_cap_per_trade: f64,
        spread: f64,
    },
    Limited {
        max_cap_per_trade: f64,
        spread: f64,
        limit_of_positions: Option<usize>,
    },
    FixedFractional {
        risk_per_trade: f64,
        max_capital_at_risk: f64,
        spread: f64,
        limit_of_positions: Option<usize>,
    },
    FixedLot {
        lot_size: i64,
        max_capital_at_risk: f64,
        spread: f64,
        limit_of_positions: Option<usize>,
    },
}

/// Why an actionable signal did not become a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PositionLimit,
    BelowMinimumSize,
    InsufficientCash,
    AtrWarmup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSignal {
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManageResult {
    pub positions: Vec<Position>,
    pub skipped: Vec<SkippedSignal>,
}

/// The manager's forward-pass ledger. Suffix cash updates mirror the
/// portfolio's convention: entry debited from the entry bar onward, exit
/// credited from the bar after the exit.
struct CapitalLedger {
    cash: Vec<f64>,
    open_positions: Vec<usize>,
    at_risk: Vec<f64>,
}

impl CapitalLedger {
    fn new(len: usize, initial_capital: f64) -> Self {
        CapitalLedger {
            cash: vec![initial_capital; len],
            open_positions: vec![0; len],
            at_risk: vec![0.0; len],
        }
    }

    fn record(&mut self, position: &Position) {
        let stop_index = position.stop_index.expect("position must be resolved");
        let exit_price = position.exit_price.expect("position must be resolved");
        let units = position.units as f64;

        let entry_cost = position.entry_price * units + position.spread;
        for i in position.start_index..self.cash.len() {
            self.cash[i] -= entry_cost;
        }
        let proceeds = exit_price * units;
        for i in (stop_index + 1)..self.cash.len() {
            self.cash[i] += proceeds;
        }
        for i in position.start_index..=stop_index {
            self.open_positions[i] += 1;
            self.at_risk[i] += position.entry_price * units;
        }
    }
}

impl CapitalManagement {
    fn spread(&self) -> f64 {
        match self {
            CapitalManagement::Unlimited { spread, .. }
            | CapitalManagement::Limited { spread, .. }
            | CapitalManagement::FixedFractional { spread, .. }
            | CapitalManagement::FixedLot { spread, .. } => *spread,
        }
    }

    fn limit_of_positions(&self) -> Option<usize> {
        match self {
            CapitalManagement::Unlimited { .. } => None,
            CapitalManagement::Limited {
                limit_of_positions, ..
            }
            | CapitalManagement::FixedFractional {
                limit_of_positions, ..
            }
            | CapitalManagement::FixedLot {
                limit_of_positions, ..
            } => *limit_of_positions,
        }
    }

    fn is_cash_gated(&self) -> bool {
        !matches!(self, CapitalManagement::Unlimited { .. })
    }

    /// Candidate size in whole units, before the cash gate. Zero means the
    /// signal is skipped.
    fn size_position(&self, entry_price: f64, cash_at: f64, at_risk_at: f64) -> i64 {
        match self {
            CapitalManagement::Unlimited {
                max_cap_per_trade,
                spread,
            } => floor_units(max_cap_per_trade - spread, entry_price),
            CapitalManagement::Limited {
                max_cap_per_trade,
                spread,
                ..
            } => floor_units(
                (max_cap_per_trade - spread).min(cash_at - spread),
                entry_price,
            ),
            CapitalManagement::FixedFractional {
                risk_per_trade,
                max_capital_at_risk,
                spread,
                ..
            } => {
                let equity = cash_at + at_risk_at;
                let units = floor_units(risk_per_trade * equity - spread, entry_price);
                units.min(floor_units(max_capital_at_risk - at_risk_at, entry_price))
            }
            CapitalManagement::FixedLot {
                lot_size,
                max_capital_at_risk,
                ..
            } => (*lot_size).min(floor_units(max_capital_at_risk - at_risk_at, entry_price)),
        }
    }

    /// Run the admission pass over the whole bar sequence.
    pub fn manage(
        &self,
        market: &Market,
        signal: &SignalSeries,
        exit: &ExitStrategy,
        initial_capital: f64,
    ) -> Result<ManageResult, SigtraderError> {
        signal.ensure_matches(market)?;

        let spread = self.spread();
        let limit = self.limit_of_positions();
        let mut ledger = CapitalLedger::new(market.len(), initial_capital);
        let mut positions = Vec::new();
        let mut skipped = Vec::new();

        for index in 0..market.len() {
            let Some(side) = signal.actionable(index) else {
                continue;
            };

            if let Some(limit) = limit {
                if ledger.open_positions[index] >= limit {
                    skipped.push(SkippedSignal {
                        index,
                        reason: SkipReason::PositionLimit,
                    });
                    continue;
                }
            }

            let close = market.close(index);
            let entry_price = match side {
                Side::Long => close + spread,
                Side::Short => close - spread,
            };
            if entry_price <= 0.0 {
                skipped.push(SkippedSignal {
                    index,
                    reason: SkipReason::BelowMinimumSize,
                });
                continue;
            }

            let units =
                self.size_position(entry_price, ledger.cash[index], ledger.at_risk[index]);
            if units < 1 {
                // Expected under tight budgets; skipped without a warning.
                skipped.push(SkippedSignal {
                    index,
                    reason: SkipReason::BelowMinimumSize,
                });
                continue;
            }

            if self.is_cash_gated() {
                let cost = entry_price * units as f64 + spread;
                if cost > ledger.cash[index] {
                    eprintln!(
                        "Warning: skipping {} signal at bar {index} (cost {cost:.2} exceeds available cash {:.2})",
                        side.as_str(),
                        ledger.cash[index]
                    );
                    skipped.push(SkippedSignal {
                        index,
                        reason: SkipReason::InsufficientCash,
                    });
                    continue;
                }
            }

            let Some(mut tracker) = exit.begin(side, entry_price, index) else {
                skipped.push(SkippedSignal {
                    index,
                    reason: SkipReason::AtrWarmup,
                });
                continue;
            };
            let (stop_loss_price, take_profit_price) = tracker.levels();

            let mut position = Position::new(
                index,
                side,
                entry_price,
                units,
                spread,
                stop_loss_price,
                take_profit_price,
            );
            position.resolve(market, &mut tracker)?;

            ledger.record(&position);
            positions.push(position);
        }

        Ok(ManageResult { positions, skipped })
    }
}

fn floor_units(budget: f64, entry_price: f64) -> i64 {
    if budget <= 0.0 || entry_price <= 0.0 {
        return 0;
    }
    (budget / entry_price).floor() as i64
}
