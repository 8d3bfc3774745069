//! Performance metrics over a finished portfolio ledger.

use crate::domain::portfolio::PortfolioLedger;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics for one simulation run.
///
/// Degenerate inputs map to defined sentinels rather than NaN: a flat
/// return series gives a Sharpe of 0, and a run with no losing bars gives
/// an infinite win/loss ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub win_loss_ratio: f64,
}

impl Metrics {
    /// `calendar_days` is the wall-clock span of the replayed data; the
    /// caller supplies it (see `Market::calendar_days`) so the ledger stays
    /// free of time arithmetic.
    pub fn compute(ledger: &PortfolioLedger, calendar_days: f64) -> Self {
        let total_return = if ledger.initial_capital > 0.0 {
            ledger.final_total() / ledger.initial_capital - 1.0
        } else {
            0.0
        };

        let annualized_return = if calendar_days > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(365.0 / calendar_days) - 1.0
        } else {
            0.0
        };

        Metrics {
            total_return,
            annualized_return,
            max_drawdown: max_drawdown(&ledger.total),
            sharpe_ratio: sharpe_ratio(&ledger.returns),
            win_loss_ratio: win_loss_ratio(&ledger.returns),
        }
    }
}

/// min(total / running_max(total) - 1); 0 for a series that never falls.
fn max_drawdown(total: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in total {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown = value / peak - 1.0;
            if drawdown < worst {
                worst = drawdown;
            }
        }
    }
    worst
}

/// mean/std * sqrt(252) over the per-bar returns, skipping the undefined
/// first entry; 0 when the deviation vanishes.
fn sharpe_ratio(returns: &[f64]) -> f64 {
    let valid: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
    if valid.len() < 2 {
        return 0.0;
    }
    let n = valid.len() as f64;
    let mean = valid.iter().sum::<f64>() / n;
    // Sample deviation (n - 1 denominator).
    let variance = valid.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if stddev > 0.0 {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// count(returns > 0) / count(returns < 0); +inf when nothing was lost.
fn win_loss_ratio(returns: &[f64]) -> f64 {
    let wins = returns.iter().filter(|r| **r > 0.0).count();
    let losses = returns.iter().filter(|r| **r < 0.0).count();
    if losses == 0 {
        f64::INFINITY
    } else {
        wins as f64 / losses as f64
    }
}
