//! Position lifecycle: entry, forward trigger resolution, ledger
//! contribution.
//!
//! A position is created by the capital manager at an actionable signal
//! bar, has its exit resolved exactly once against the market, and is
//! immutable afterwards. Resolution is a read-only scan of the market: it
//! deliberately looks ahead to find *when* the trade would have closed, and
//! has no effect on any other position.

use crate::domain::error::SigtraderError;
use crate::domain::exit::ExitTracker;
use crate::domain::market::Market;
use crate::domain::portfolio::PortfolioLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Timeout,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::Timeout => "timeout",
        }
    }
}

/// One simulated trade.
///
/// `stop_loss_price`/`take_profit_price` are the levels fixed at entry and
/// always bracket `entry_price` by side; a trailing rule may exit at a
/// tighter level than the stored one.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub start_index: usize,
    pub side: Side,
    pub entry_price: f64,
    pub units: i64,
    pub spread: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub stop_index: Option<usize>,
    pub exit_price: Option<f64>,
    pub outcome: Option<Outcome>,
}

impl Position {
    /// Callers reject undersized trades before constructing; the levels
    /// must already bracket the entry price for the given side.
    pub fn new(
        start_index: usize,
        side: Side,
        entry_price: f64,
        units: i64,
        spread: f64,
        stop_loss_price: f64,
        take_profit_price: f64,
    ) -> Self {
        debug_assert!(units >= 1, "position sized below one unit");
        match side {
            Side::Long => debug_assert!(
                stop_loss_price < entry_price && entry_price < take_profit_price,
                "long levels must bracket entry"
            ),
            Side::Short => debug_assert!(
                take_profit_price < entry_price && entry_price < stop_loss_price,
                "short levels must bracket entry"
            ),
        }
        Position {
            start_index,
            side,
            entry_price,
            units,
            spread,
            stop_loss_price,
            take_profit_price,
            stop_index: None,
            exit_price: None,
            outcome: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.stop_index.is_some()
    }

    /// Scan forward from `start_index` to find the exit bar and price.
    ///
    /// Per bar, the tracker observes the close first (trailing levels move
    /// before triggers are checked), then breaches are tested against the
    /// bar's high/low. When stop and profit are both breached on the same
    /// bar, the stop takes priority and the position resolves to a loss.
    /// If the data ends first, the position times out at the final close.
    pub fn resolve(
        &mut self,
        market: &Market,
        tracker: &mut ExitTracker,
    ) -> Result<(), SigtraderError> {
        let last = market.last_index();
        if self.start_index > last {
            return Err(SigtraderError::InvalidMarketData {
                reason: format!(
                    "position start index {} is past the last bar {last}",
                    self.start_index
                ),
            });
        }

        // Entering on the final bar: no future to resolve against.
        if self.start_index == last {
            self.close(last, market.close(last), Outcome::Timeout);
            return Ok(());
        }

        for index in self.start_index..=last {
            let bar = market.bar(index);
            tracker.observe(bar.close);
            let (stop_level, profit_level) = tracker.levels();

            let (stop_hit, profit_hit) = match self.side {
                Side::Long => (bar.low <= stop_level, bar.high >= profit_level),
                Side::Short => (bar.high >= stop_level, bar.low <= profit_level),
            };

            if stop_hit {
                self.close(index, stop_level, Outcome::Loss);
                return Ok(());
            }
            if profit_hit {
                self.close(index, profit_level, Outcome::Win);
                return Ok(());
            }
        }

        self.close(last, market.close(last), Outcome::Timeout);
        Ok(())
    }

    fn close(&mut self, stop_index: usize, exit_price: f64, outcome: Outcome) {
        self.stop_index = Some(stop_index);
        self.exit_price = Some(exit_price);
        self.outcome = Some(outcome);
    }

    /// Write this trade into the portfolio arrays.
    ///
    /// Over `[start_index, stop_index]` the position adds its units, its
    /// mark-to-market value, and one to the side counter. Cash is debited
    /// `entry_price*units + spread` from the entry bar onward and credited
    /// `exit_price*units` from the bar *after* the exit, never at the exit
    /// bar itself, so a single bar can't carry both legs.
    pub fn apply_to_ledger(&self, ledger: &mut PortfolioLedger, market: &Market) {
        let (Some(stop_index), Some(exit_price)) = (self.stop_index, self.exit_price) else {
            debug_assert!(false, "apply_to_ledger on an unresolved position");
            return;
        };

        let units = self.units as f64;
        for i in self.start_index..=stop_index {
            ledger.units[i] += units;
            ledger.holdings[i] += units * market.close(i);
            match self.side {
                Side::Long => ledger.long_positions[i] += 1,
                Side::Short => ledger.short_positions[i] += 1,
            }
        }

        let entry_cost = self.entry_price * units + self.spread;
        for i in self.start_index..ledger.len() {
            ledger.cash[i] -= entry_cost;
        }
        let proceeds = exit_price * units;
        for i in (stop_index + 1)..ledger.len() {
            ledger.cash[i] += proceeds;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exit::ExitStrategy;
    use crate::domain::market::{Bar, Market};
    use chrono::NaiveDate;

    fn make_market(ohlc: &[(f64, f64, f64, f64)]) -> Market {
        let bars = ohlc
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap()
                    + chrono::Duration::minutes(i as i64),
                open,
                high,
                low,
                close,
                spread: 0.0,
            })
            .collect();
        Market::new(bars).unwrap()
    }

    fn flat_market(closes: &[f64]) -> Market {
        let ohlc: Vec<(f64, f64, f64, f64)> = closes.iter().map(|&c| (c, c, c, c)).collect();
        make_market(&ohlc)
    }

    fn resolve_with(
        market: &Market,
        strategy: &ExitStrategy,
        start_index: usize,
        side: Side,
        entry_price: f64,
    ) -> Position {
        let mut tracker = strategy.begin(side, entry_price, start_index).unwrap();
        let (stop, take) = tracker.levels();
        let mut position = Position::new(start_index, side, entry_price, 10, 0.0, stop, take);
        position.resolve(market, &mut tracker).unwrap();
        position
    }

    #[test]
    fn long_take_profit_win() {
        let market = flat_market(&[100.0, 101.0, 99.0, 102.0, 105.0]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let position = resolve_with(&market, &strategy, 1, Side::Long, 101.0);

        assert_eq!(position.stop_index, Some(4));
        assert_eq!(position.outcome, Some(Outcome::Win));
        assert!((position.exit_price.unwrap() - 103.02).abs() < 1e-9);
    }

    #[test]
    fn long_stop_loss_fires_on_low() {
        let market = make_market(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 100.0, 97.0, 98.0), // low breaches 2% stop
        ]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let position = resolve_with(&market, &strategy, 0, Side::Long, 100.0);

        assert_eq!(position.stop_index, Some(2));
        assert_eq!(position.outcome, Some(Outcome::Loss));
        assert!((position.exit_price.unwrap() - 98.0).abs() < 1e-9);
    }

    #[test]
    fn short_profit_fires_on_low() {
        let market = make_market(&[
            (100.0, 100.5, 99.5, 100.0),
            (99.0, 99.5, 97.5, 98.0), // low 97.5 <= 98.0 take-profit
        ]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let position = resolve_with(&market, &strategy, 0, Side::Short, 100.0);

        assert_eq!(position.stop_index, Some(1));
        assert_eq!(position.outcome, Some(Outcome::Win));
        assert!((position.exit_price.unwrap() - 98.0).abs() < 1e-9);
    }

    #[test]
    fn short_stop_fires_on_high() {
        let market = make_market(&[
            (100.0, 100.5, 99.5, 100.0),
            (101.0, 103.0, 100.5, 102.5), // high 103 >= 102.0 stop
        ]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let position = resolve_with(&market, &strategy, 0, Side::Short, 100.0);

        assert_eq!(position.stop_index, Some(1));
        assert_eq!(position.outcome, Some(Outcome::Loss));
        assert!((position.exit_price.unwrap() - 102.0).abs() < 1e-9);
    }

    #[test]
    fn same_bar_tie_resolves_to_loss() {
        // One wide bar breaches both levels at once.
        let market = make_market(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 105.0, 95.0, 100.0),
        ]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let position = resolve_with(&market, &strategy, 0, Side::Long, 100.0);

        assert_eq!(position.outcome, Some(Outcome::Loss));
        assert!((position.exit_price.unwrap() - 98.0).abs() < 1e-9);
    }

    #[test]
    fn timeout_at_data_end() {
        let market = flat_market(&[100.0, 100.2, 100.1, 100.3]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let position = resolve_with(&market, &strategy, 0, Side::Long, 100.0);

        assert_eq!(position.stop_index, Some(3));
        assert_eq!(position.outcome, Some(Outcome::Timeout));
        assert!((position.exit_price.unwrap() - 100.3).abs() < 1e-9);
    }

    #[test]
    fn entry_on_last_bar_times_out() {
        // Even a bar that would breach a level: there is no forward data.
        let market = make_market(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 120.0, 80.0, 100.0),
        ]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let position = resolve_with(&market, &strategy, 1, Side::Long, 100.0);

        assert_eq!(position.stop_index, Some(1));
        assert_eq!(position.outcome, Some(Outcome::Timeout));
        assert!((position.exit_price.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn start_past_end_is_an_error() {
        let market = flat_market(&[100.0, 101.0]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let mut tracker = strategy.begin(Side::Long, 100.0, 0).unwrap();
        let (stop, take) = tracker.levels();
        let mut position = Position::new(5, Side::Long, 100.0, 10, 0.0, stop, take);

        let result = position.resolve(&market, &mut tracker);
        assert!(matches!(
            result,
            Err(SigtraderError::InvalidMarketData { .. })
        ));
        assert!(!position.is_resolved());
    }

    #[test]
    fn trailing_exit_uses_trailed_level() {
        // Price runs up, then falls back through the trailed stop.
        let market = flat_market(&[100.0, 104.0, 108.0, 104.0, 100.0]);
        let strategy = ExitStrategy::trailing(3.0, 100.0);
        let position = resolve_with(&market, &strategy, 0, Side::Long, 100.0);

        // Extreme reached 108 → stop trailed to 105, breached at index 3.
        assert_eq!(position.stop_index, Some(3));
        assert_eq!(position.outcome, Some(Outcome::Loss));
        assert!((position.exit_price.unwrap() - 105.0).abs() < 1e-9);
        // Stored level stays the one fixed at entry.
        assert!((position.stop_loss_price - 97.0).abs() < 1e-9);
    }

    #[test]
    fn resolution_is_idempotent_input_only() {
        // Two positions resolved against the same market see the same data.
        let market = flat_market(&[100.0, 101.0, 99.0, 102.0, 105.0]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let a = resolve_with(&market, &strategy, 1, Side::Long, 101.0);
        let b = resolve_with(&market, &strategy, 1, Side::Long, 101.0);
        assert_eq!(a, b);
    }

    #[test]
    fn apply_to_ledger_interval_updates() {
        let market = flat_market(&[100.0, 101.0, 99.0, 102.0, 105.0]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let mut tracker = strategy.begin(Side::Long, 101.0, 1).unwrap();
        let (stop, take) = tracker.levels();
        let mut position = Position::new(1, Side::Long, 101.0, 5, 0.5, stop, take);
        position.resolve(&market, &mut tracker).unwrap();
        assert_eq!(position.stop_index, Some(4));

        let mut ledger = PortfolioLedger::zeroed(market.len(), 1_000.0);
        position.apply_to_ledger(&mut ledger, &market);

        assert_eq!(ledger.units, vec![0.0, 5.0, 5.0, 5.0, 5.0]);
        assert_eq!(ledger.long_positions, vec![0, 1, 1, 1, 1]);
        assert_eq!(ledger.short_positions, vec![0, 0, 0, 0, 0]);
        // holdings marked at each bar's close
        assert!((ledger.holdings[1] - 505.0).abs() < 1e-9);
        assert!((ledger.holdings[4] - 525.0).abs() < 1e-9);
        // entry leg debited from bar 1 onward; exit credited past the end,
        // so never visible inside this 5-bar window
        let entry_cost = 101.0 * 5.0 + 0.5;
        assert!((ledger.cash[0] - 1_000.0).abs() < 1e-9);
        for i in 1..5 {
            assert!((ledger.cash[i] - (1_000.0 - entry_cost)).abs() < 1e-9);
        }
    }

    #[test]
    fn apply_to_ledger_credits_after_stop_bar() {
        let market = make_market(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 100.0, 97.0, 98.0),
            (98.0, 98.5, 97.5, 98.0),
        ]);
        let strategy = ExitStrategy::static_percent(0.02, 0.02);
        let mut tracker = strategy.begin(Side::Long, 100.0, 0).unwrap();
        let (stop, take) = tracker.levels();
        let mut position = Position::new(0, Side::Long, 100.0, 2, 0.0, stop, take);
        position.resolve(&market, &mut tracker).unwrap();
        assert_eq!(position.stop_index, Some(1));

        let mut ledger = PortfolioLedger::zeroed(market.len(), 500.0);
        position.apply_to_ledger(&mut ledger, &market);

        let entry_cost = 200.0;
        let proceeds = 98.0 * 2.0;
        assert!((ledger.cash[0] - (500.0 - entry_cost)).abs() < 1e-9);
        assert!((ledger.cash[1] - (500.0 - entry_cost)).abs() < 1e-9);
        assert!((ledger.cash[2] - (500.0 - entry_cost + proceeds)).abs() < 1e-9);
        // units/holdings stop at the exit bar
        assert_eq!(ledger.units, vec![2.0, 2.0, 0.0]);
    }
}
