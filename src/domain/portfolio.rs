//! Portfolio ledger: per-bar cash/holdings/equity reconstruction.
//!
//! Built once, after every position has been resolved. Position updates are
//! interval-additive and commute, so application order does not matter.

use crate::domain::market::Market;
use crate::domain::position::Position;

/// Time-indexed portfolio arrays, one slot per market bar.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioLedger {
    pub initial_capital: f64,
    pub units: Vec<f64>,
    pub holdings: Vec<f64>,
    pub long_positions: Vec<u32>,
    pub short_positions: Vec<u32>,
    pub cash: Vec<f64>,
    pub total: Vec<f64>,
    pub returns: Vec<f64>,
}

impl PortfolioLedger {
    /// All arrays zeroed except `cash`, which starts at `initial_capital`
    /// on every bar.
    pub fn zeroed(len: usize, initial_capital: f64) -> Self {
        PortfolioLedger {
            initial_capital,
            units: vec![0.0; len],
            holdings: vec![0.0; len],
            long_positions: vec![0; len],
            short_positions: vec![0; len],
            cash: vec![initial_capital; len],
            total: vec![0.0; len],
            returns: vec![0.0; len],
        }
    }

    /// Aggregate all resolved positions into a finished ledger.
    pub fn build(market: &Market, positions: &[Position], initial_capital: f64) -> Self {
        let mut ledger = Self::zeroed(market.len(), initial_capital);
        for position in positions {
            position.apply_to_ledger(&mut ledger, market);
        }
        ledger.finalize();
        ledger
    }

    /// Compute `total = cash + holdings` and percentage returns. The first
    /// bar has no previous value, so `returns[0]` is NaN.
    fn finalize(&mut self) {
        for i in 0..self.len() {
            self.total[i] = self.cash[i] + self.holdings[i];
        }
        if !self.returns.is_empty() {
            self.returns[0] = f64::NAN;
        }
        for i in 1..self.len() {
            self.returns[i] = self.total[i] / self.total[i - 1] - 1.0;
        }
    }

    pub fn len(&self) -> usize {
        self.cash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cash.is_empty()
    }

    /// Equity at the final bar.
    pub fn final_total(&self) -> f64 {
        *self.total.last().unwrap_or(&self.initial_capital)
    }
}
