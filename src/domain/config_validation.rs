//! Configuration validation and settings assembly.
//!
//! Turns the raw key/value view behind [`ConfigPort`] into validated domain
//! values. Risk levels accept either a percent string (`"0.1%"`, comma
//! decimal separators tolerated) or a bare numeric fraction.

use crate::domain::capital::CapitalManagement;
use crate::domain::error::SigtraderError;
use crate::domain::exit::ExitStrategy;
use crate::domain::market::Market;
use crate::ports::config_port::ConfigPort;

/// Exit rule selection, parsed from config. ATR offsets need market data,
/// so the strategy itself is built later via [`ExitSettings::build`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExitSettings {
    Static { stop_loss: f64, take_profit: f64 },
    Trailing { trailing_stop: f64, trailing_profit: f64 },
    Atr { period: usize, multiplier: f64 },
}

impl ExitSettings {
    pub fn build(&self, market: &Market) -> ExitStrategy {
        match self {
            ExitSettings::Static {
                stop_loss,
                take_profit,
            } => ExitStrategy::static_percent(*stop_loss, *take_profit),
            ExitSettings::Trailing {
                trailing_stop,
                trailing_profit,
            } => ExitStrategy::trailing(*trailing_stop, *trailing_profit),
            ExitSettings::Atr { period, multiplier } => {
                ExitStrategy::atr(market, *period, *multiplier)
            }
        }
    }
}

/// Everything a run needs besides the data itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub initial_capital: f64,
    pub capital: CapitalManagement,
    pub exit: ExitSettings,
}

/// Percent-string or bare-numeric parsing: strip `%`, normalize `,` to
/// `.`, divide by 100; bare numerics pass through unchanged.
pub fn parse_percent(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    if let Some(body) = trimmed.strip_suffix('%') {
        body.replace(',', ".")
            .trim()
            .parse::<f64>()
            .map(|value| value / 100.0)
            .map_err(|_| format!("cannot parse percentage {raw:?}"))
    } else {
        trimmed
            .parse::<f64>()
            .map_err(|_| format!("cannot parse number {raw:?}"))
    }
}

pub fn load_run_settings(config: &dyn ConfigPort) -> Result<RunSettings, SigtraderError> {
    let initial_capital = require_double(config, "backtest", "initial_capital")?;
    if initial_capital <= 0.0 {
        return Err(invalid("backtest", "initial_capital", "must be positive"));
    }

    Ok(RunSettings {
        initial_capital,
        capital: capital_from_config(config)?,
        exit: exit_from_config(config)?,
    })
}

/// Full shape check without touching market data.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    load_run_settings(config)?;
    data_files_from_config(config)?;
    Ok(())
}

/// `[data]` section: market and signal CSV paths.
pub fn data_files_from_config(
    config: &dyn ConfigPort,
) -> Result<(String, String), SigtraderError> {
    let market = require_string(config, "data", "market")?;
    let signal = require_string(config, "data", "signal")?;
    Ok((market, signal))
}

pub fn capital_from_config(config: &dyn ConfigPort) -> Result<CapitalManagement, SigtraderError> {
    let spread = config.get_double("backtest", "spread", 0.0);
    if spread < 0.0 || !spread.is_finite() {
        return Err(invalid("backtest", "spread", "must be non-negative"));
    }

    let limit_of_positions = match config.get_opt_int("backtest", "limit_of_positions") {
        None => None,
        Some(limit) if limit >= 1 => Some(limit as usize),
        Some(_) => {
            return Err(invalid(
                "backtest",
                "limit_of_positions",
                "must be at least 1 when set",
            ));
        }
    };

    let policy = config
        .get_string("backtest", "capital")
        .unwrap_or_else(|| "unlimited".to_string());

    match policy.as_str() {
        "unlimited" => Ok(CapitalManagement::Unlimited {
            max_cap_per_trade: require_max_cap(config, spread)?,
            spread,
        }),
        "limited" => Ok(CapitalManagement::Limited {
            max_cap_per_trade: require_max_cap(config, spread)?,
            spread,
            limit_of_positions,
        }),
        "fixed_fractional" => {
            let risk_per_trade = require_double(config, "backtest", "risk_per_trade")?;
            if risk_per_trade <= 0.0 || risk_per_trade > 1.0 {
                return Err(invalid(
                    "backtest",
                    "risk_per_trade",
                    "must be in (0, 1]",
                ));
            }
            Ok(CapitalManagement::FixedFractional {
                risk_per_trade,
                max_capital_at_risk: require_max_at_risk(config)?,
                spread,
                limit_of_positions,
            })
        }
        "fixed_lot" => {
            let lot_size = config.get_int("backtest", "lot_size", 0);
            if lot_size < 1 {
                return Err(invalid("backtest", "lot_size", "must be at least 1"));
            }
            Ok(CapitalManagement::FixedLot {
                lot_size,
                max_capital_at_risk: require_max_at_risk(config)?,
                spread,
                limit_of_positions,
            })
        }
        other => Err(invalid(
            "backtest",
            "capital",
            &format!(
                "unknown policy {other:?}, expected unlimited, limited, fixed_fractional or fixed_lot"
            ),
        )),
    }
}

pub fn exit_from_config(config: &dyn ConfigPort) -> Result<ExitSettings, SigtraderError> {
    let strategy = config
        .get_string("exit", "strategy")
        .unwrap_or_else(|| "static".to_string());

    match strategy.as_str() {
        "static" => Ok(ExitSettings::Static {
            stop_loss: require_level(config, "exit", "stop_loss")?,
            take_profit: require_level(config, "exit", "take_profit")?,
        }),
        "trailing" => Ok(ExitSettings::Trailing {
            trailing_stop: require_level(config, "exit", "trailing_stop")?,
            trailing_profit: require_level(config, "exit", "trailing_profit")?,
        }),
        "atr" => {
            let period = config.get_int("exit", "atr_period", 0);
            if period < 1 {
                return Err(invalid("exit", "atr_period", "must be at least 1"));
            }
            let multiplier = require_double(config, "exit", "atr_multiplier")?;
            if multiplier <= 0.0 {
                return Err(invalid("exit", "atr_multiplier", "must be positive"));
            }
            Ok(ExitSettings::Atr {
                period: period as usize,
                multiplier,
            })
        }
        other => Err(invalid(
            "exit",
            "strategy",
            &format!("unknown strategy {other:?}, expected static, trailing or atr"),
        )),
    }
}

fn require_max_cap(config: &dyn ConfigPort, spread: f64) -> Result<f64, SigtraderError> {
    let max_cap = require_double(config, "backtest", "max_cap_per_trade")?;
    if max_cap <= spread {
        return Err(invalid(
            "backtest",
            "max_cap_per_trade",
            "must exceed the spread",
        ));
    }
    Ok(max_cap)
}

fn require_max_at_risk(config: &dyn ConfigPort) -> Result<f64, SigtraderError> {
    let max_at_risk = require_double(config, "backtest", "max_capital_at_risk")?;
    if max_at_risk <= 0.0 {
        return Err(invalid(
            "backtest",
            "max_capital_at_risk",
            "must be positive",
        ));
    }
    Ok(max_at_risk)
}

fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, SigtraderError> {
    match config.get_string(section, key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SigtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn require_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<f64, SigtraderError> {
    let raw = require_string(config, section, key)?;
    raw.trim().parse::<f64>().map_err(|_| {
        invalid(section, key, &format!("cannot parse number {raw:?}"))
    })
}

/// Required key holding a percent string or numeric fraction; must be
/// strictly positive.
fn require_level(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<f64, SigtraderError> {
    let raw = require_string(config, section, key)?;
    let level = parse_percent(&raw).map_err(|reason| invalid(section, key, &reason))?;
    if level <= 0.0 || !level.is_finite() {
        return Err(invalid(section, key, "must be positive"));
    }
    Ok(level)
}

fn invalid(section: &str, key: &str, reason: &str) -> SigtraderError {
    SigtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig {
        entries: HashMap<(String, String), String>,
    }

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            MapConfig {
                entries: entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            }
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.entries
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        }

        fn get_opt_int(&self, section: &str, key: &str) -> Option<i64> {
            self.get_string(section, key)
                .and_then(|v| v.trim().parse().ok())
        }
    }

    #[test]
    fn parse_percent_forms() {
        assert!((parse_percent("0.1%").unwrap() - 0.001).abs() < 1e-12);
        assert!((parse_percent("0,1%").unwrap() - 0.001).abs() < 1e-12);
        assert!((parse_percent("2%").unwrap() - 0.02).abs() < 1e-12);
        assert!((parse_percent("0.002").unwrap() - 0.002).abs() < 1e-12);
        assert!((parse_percent(" 1.5% ").unwrap() - 0.015).abs() < 1e-12);
        assert!(parse_percent("abc").is_err());
        assert!(parse_percent("abc%").is_err());
    }

    #[test]
    fn unlimited_policy_from_config() {
        let config = MapConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "max_cap_per_trade", "1000"),
            ("backtest", "spread", "0.5"),
            ("exit", "stop_loss", "0.1%"),
            ("exit", "take_profit", "0.1%"),
        ]);

        let settings = load_run_settings(&config).unwrap();
        assert!((settings.initial_capital - 100_000.0).abs() < f64::EPSILON);
        assert_eq!(
            settings.capital,
            CapitalManagement::Unlimited {
                max_cap_per_trade: 1_000.0,
                spread: 0.5,
            }
        );
        assert_eq!(
            settings.exit,
            ExitSettings::Static {
                stop_loss: 0.001,
                take_profit: 0.001,
            }
        );
    }

    #[test]
    fn limited_policy_with_position_cap() {
        let config = MapConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "capital", "limited"),
            ("backtest", "max_cap_per_trade", "1000"),
            ("backtest", "limit_of_positions", "4"),
            ("exit", "stop_loss", "1%"),
            ("exit", "take_profit", "2%"),
        ]);

        let settings = load_run_settings(&config).unwrap();
        assert_eq!(
            settings.capital,
            CapitalManagement::Limited {
                max_cap_per_trade: 1_000.0,
                spread: 0.0,
                limit_of_positions: Some(4),
            }
        );
    }

    #[test]
    fn missing_limit_means_unbounded() {
        let config = MapConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "capital", "limited"),
            ("backtest", "max_cap_per_trade", "1000"),
            ("exit", "stop_loss", "1%"),
            ("exit", "take_profit", "2%"),
        ]);

        let settings = load_run_settings(&config).unwrap();
        let CapitalManagement::Limited {
            limit_of_positions, ..
        } = settings.capital
        else {
            panic!("expected limited policy");
        };
        assert_eq!(limit_of_positions, None);
    }

    #[test]
    fn fixed_fractional_policy() {
        let config = MapConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "capital", "fixed_fractional"),
            ("backtest", "risk_per_trade", "0.05"),
            ("backtest", "max_capital_at_risk", "20000"),
            ("exit", "strategy", "trailing"),
            ("exit", "trailing_stop", "0.5%"),
            ("exit", "trailing_profit", "1%"),
        ]);

        let settings = load_run_settings(&config).unwrap();
        assert_eq!(
            settings.capital,
            CapitalManagement::FixedFractional {
                risk_per_trade: 0.05,
                max_capital_at_risk: 20_000.0,
                spread: 0.0,
                limit_of_positions: None,
            }
        );
        assert_eq!(
            settings.exit,
            ExitSettings::Trailing {
                trailing_stop: 0.005,
                trailing_profit: 0.01,
            }
        );
    }

    #[test]
    fn atr_exit_settings() {
        let config = MapConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "max_cap_per_trade", "1000"),
            ("exit", "strategy", "atr"),
            ("exit", "atr_period", "14"),
            ("exit", "atr_multiplier", "2.0"),
        ]);

        let settings = load_run_settings(&config).unwrap();
        assert_eq!(
            settings.exit,
            ExitSettings::Atr {
                period: 14,
                multiplier: 2.0,
            }
        );
    }

    #[test]
    fn missing_initial_capital_is_an_error() {
        let config = MapConfig::new(&[
            ("backtest", "max_cap_per_trade", "1000"),
            ("exit", "stop_loss", "1%"),
            ("exit", "take_profit", "2%"),
        ]);
        assert!(matches!(
            load_run_settings(&config),
            Err(SigtraderError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn negative_spread_rejected() {
        let config = MapConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "max_cap_per_trade", "1000"),
            ("backtest", "spread", "-0.1"),
            ("exit", "stop_loss", "1%"),
            ("exit", "take_profit", "2%"),
        ]);
        assert!(matches!(
            load_run_settings(&config),
            Err(SigtraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn zero_limit_rejected() {
        let config = MapConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "capital", "limited"),
            ("backtest", "max_cap_per_trade", "1000"),
            ("backtest", "limit_of_positions", "0"),
            ("exit", "stop_loss", "1%"),
            ("exit", "take_profit", "2%"),
        ]);
        assert!(matches!(
            load_run_settings(&config),
            Err(SigtraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn unknown_policy_rejected() {
        let config = MapConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "capital", "martingale"),
            ("exit", "stop_loss", "1%"),
            ("exit", "take_profit", "2%"),
        ]);
        assert!(matches!(
            load_run_settings(&config),
            Err(SigtraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn unknown_exit_strategy_rejected() {
        let config = MapConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "max_cap_per_trade", "1000"),
            ("exit", "strategy", "psychic"),
        ]);
        assert!(matches!(
            load_run_settings(&config),
            Err(SigtraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn data_files_required() {
        let config = MapConfig::new(&[("data", "market", "eurusd.csv")]);
        assert!(matches!(
            data_files_from_config(&config),
            Err(SigtraderError::ConfigMissing { .. })
        ));

        let config = MapConfig::new(&[
            ("data", "market", "eurusd.csv"),
            ("data", "signal", "signal.csv"),
        ]);
        let (market, signal) = data_files_from_config(&config).unwrap();
        assert_eq!(market, "eurusd.csv");
        assert_eq!(signal, "signal.csv");
    }
}
