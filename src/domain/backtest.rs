//! Backtest orchestration: admission pass, ledger build, metric access.

use crate::domain::capital::{CapitalManagement, SkippedSignal};
use crate::domain::error::SigtraderError;
use crate::domain::exit::ExitStrategy;
use crate::domain::market::Market;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::PortfolioLedger;
use crate::domain::position::Position;
use crate::domain::signal::SignalSeries;

/// Replays a signal against a market and owns the run's results.
///
/// Results are only reachable after [`Backtester::run`]; asking earlier is
/// a `SimulationNotRun` error rather than a panic.
#[derive(Debug)]
pub struct Backtester<'a> {
    market: &'a Market,
    signal: &'a SignalSeries,
    initial_capital: f64,
    positions: Vec<Position>,
    skipped: Vec<SkippedSignal>,
    portfolio: Option<PortfolioLedger>,
}

impl<'a> Backtester<'a> {
    pub fn new(market: &'a Market, signal: &'a SignalSeries, initial_capital: f64) -> Self {
        Backtester {
            market,
            signal,
            initial_capital,
            positions: Vec::new(),
            skipped: Vec::new(),
            portfolio: None,
        }
    }

    /// Run the full pipeline: admit and resolve positions, then rebuild the
    /// portfolio ledger from scratch. Rerunning replaces earlier results.
    pub fn run(
        &mut self,
        manager: &CapitalManagement,
        exit: &ExitStrategy,
    ) -> Result<&PortfolioLedger, SigtraderError> {
        let result = manager.manage(self.market, self.signal, exit, self.initial_capital)?;
        self.positions = result.positions;
        self.skipped = result.skipped;
        self.portfolio = Some(PortfolioLedger::build(
            self.market,
            &self.positions,
            self.initial_capital,
        ));
        Ok(self.portfolio.as_ref().unwrap())
    }

    pub fn portfolio(&self) -> Result<&PortfolioLedger, SigtraderError> {
        self.portfolio.as_ref().ok_or(SigtraderError::SimulationNotRun)
    }

    /// Closed trades from the last run, in entry order.
    pub fn positions(&self) -> Result<&[Position], SigtraderError> {
        if self.portfolio.is_none() {
            return Err(SigtraderError::SimulationNotRun);
        }
        Ok(&self.positions)
    }

    /// Signals the last run declined, with their reasons.
    pub fn skipped(&self) -> &[SkippedSignal] {
        &self.skipped
    }

    pub fn metrics(&self) -> Result<Metrics, SigtraderError> {
        let portfolio = self.portfolio()?;
        Ok(Metrics::compute(portfolio, self.market.calendar_days()))
    }

    pub fn final_portfolio_value(&self) -> Result<f64, SigtraderError> {
        Ok(self.portfolio()?.final_total())
    }
}
