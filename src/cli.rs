//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::Backtester;
use crate::domain::capital::SkipReason;
use crate::domain::config_validation::{
    data_files_from_config, load_run_settings, validate_config,
};
use crate::domain::error::SigtraderError;
use crate::domain::market::Market;
use crate::domain::signal::SignalSeries;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Signal-replay trade simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a signal against a market and report the results
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for ledger.csv and trades.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Load and validate everything, then stop before simulating
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range of the configured market file
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            dry_run,
        } => run_backtest(&config, output.as_deref(), dry_run),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config } => run_info(&config),
    }
}

fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = SigtraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn load_data(
    adapter: &FileConfigAdapter,
    config_path: &Path,
) -> Result<(Market, SignalSeries), SigtraderError> {
    let (market_file, signal_file) = data_files_from_config(adapter)?;
    let data = CsvAdapter::new();
    let market = data.fetch_market(&resolve(config_path, &market_file))?;
    let signal = data.fetch_signal(&resolve(config_path, &signal_file))?;
    signal.ensure_matches(&market)?;
    Ok((market, signal))
}

/// Data paths are taken relative to the config file's directory.
fn resolve(config_path: &Path, file: &str) -> PathBuf {
    let path = PathBuf::from(file);
    if path.is_absolute() {
        return path;
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn run_backtest(config_path: &Path, output: Option<&Path>, dry_run: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let settings = match load_run_settings(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let (market, signal) = match load_data(&adapter, config_path) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    eprintln!(
        "Loaded {} bars spanning {:.1} days",
        market.len(),
        market.calendar_days()
    );

    if dry_run {
        eprintln!("Dry run complete; simulation skipped.");
        return ExitCode::SUCCESS;
    }

    let exit = settings.exit.build(&market);
    let mut backtester = Backtester::new(&market, &signal, settings.initial_capital);
    if let Err(e) = backtester.run(&settings.capital, &exit) {
        eprintln!("error: {e}");
        return ExitCode::from(&e);
    }

    print_summary(&backtester);

    if let Some(output_dir) = output {
        let report = CsvReportAdapter::new();
        let (ledger, positions) = match (backtester.portfolio(), backtester.positions()) {
            (Ok(l), Ok(p)) => (l, p),
            (Err(e), _) | (_, Err(e)) => {
                eprintln!("error: {e}");
                return ExitCode::from(&e);
            }
        };
        if let Err(e) = report.write(&market, ledger, positions, output_dir) {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
        eprintln!("Report written to {}", output_dir.display());
    }

    ExitCode::SUCCESS
}

fn print_summary(backtester: &Backtester) {
    let positions = backtester.positions().unwrap_or(&[]);
    println!("Closed positions: {}", positions.len());

    let skipped = backtester.skipped();
    if !skipped.is_empty() {
        let count = |reason: SkipReason| skipped.iter().filter(|s| s.reason == reason).count();
        println!(
            "Skipped signals: {} (limit {}, sizing {}, cash {}, warm-up {})",
            skipped.len(),
            count(SkipReason::PositionLimit),
            count(SkipReason::BelowMinimumSize),
            count(SkipReason::InsufficientCash),
            count(SkipReason::AtrWarmup),
        );
    }

    match backtester.metrics() {
        Ok(metrics) => {
            println!("Total Return: {:.2}%", metrics.total_return * 100.0);
            println!(
                "Annualized Return: {:.2}%",
                metrics.annualized_return * 100.0
            );
            println!("Maximum Drawdown: {:.2}%", metrics.max_drawdown * 100.0);
            println!("Sharpe Ratio: {:.2}", metrics.sharpe_ratio);
            println!("Win-Loss Ratio: {:.2}", metrics.win_loss_ratio);
        }
        Err(e) => eprintln!("error: {e}"),
    }

    if let Ok(final_value) = backtester.final_portfolio_value() {
        println!("Final Portfolio Value: ${final_value:.2}");
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match validate_config(&adapter) {
        Ok(()) => {
            println!("Config OK: {}", config_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn run_info(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match load_data(&adapter, config_path) {
        Ok((market, signal)) => {
            let first = market.bar(0).timestamp;
            let last = market.bar(market.last_index()).timestamp;
            println!("Market: {} bars, {first} .. {last}", market.len());
            println!("Signal: {} values", signal.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}
