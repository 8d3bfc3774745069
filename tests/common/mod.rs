#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use sigtrader::domain::capital::CapitalManagement;
use sigtrader::domain::exit::ExitStrategy;
use sigtrader::domain::market::{Bar, Market};
use sigtrader::domain::signal::SignalSeries;

pub fn ts(minute: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(minute as i64)
}

pub fn make_bar(minute: usize, open: f64, high: f64, low: f64, close: f64, spread: f64) -> Bar {
    Bar {
        timestamp: ts(minute),
        open,
        high,
        low,
        close,
        spread,
    }
}

/// Bars with open=high=low=close, one minute apart.
pub fn flat_market(closes: &[f64]) -> Market {
    flat_market_with_spread(closes, 0.0)
}

pub fn flat_market_with_spread(closes: &[f64], spread: f64) -> Market {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(i, close, close, close, close, spread))
        .collect();
    Market::new(bars).unwrap()
}

/// Bars with a fixed high/low band around the close.
pub fn banded_market(closes: &[f64], band: f64) -> Market {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(i, close, close + band, (close - band).max(0.0), close, 0.0))
        .collect();
    Market::new(bars).unwrap()
}

pub fn make_signal(values: &[i8]) -> SignalSeries {
    SignalSeries::new(values.to_vec()).unwrap()
}

pub fn unlimited(max_cap_per_trade: f64, spread: f64) -> CapitalManagement {
    CapitalManagement::Unlimited {
        max_cap_per_trade,
        spread,
    }
}

pub fn limited(
    max_cap_per_trade: f64,
    spread: f64,
    limit_of_positions: Option<usize>,
) -> CapitalManagement {
    CapitalManagement::Limited {
        max_cap_per_trade,
        spread,
        limit_of_positions,
    }
}

pub fn static_exit(stop_loss: f64, take_profit: f64) -> ExitStrategy {
    ExitStrategy::static_percent(stop_loss, take_profit)
}
