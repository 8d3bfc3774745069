//! CSV report adapter implementing ReportPort.
//!
//! Writes two files into the output directory: `ledger.csv` (one row per
//! bar) and `trades.csv` (one row per closed position).

use crate::domain::error::SigtraderError;
use crate::domain::market::Market;
use crate::domain::portfolio::PortfolioLedger;
use crate::domain::position::Position;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }

    fn write_ledger(
        &self,
        market: &Market,
        ledger: &PortfolioLedger,
        path: &Path,
    ) -> Result<(), SigtraderError> {
        let mut writer = csv::Writer::from_path(path).map_err(csv_io_error)?;
        writer
            .write_record([
                "timestamp",
                "units",
                "holdings",
                "long_positions",
                "short_positions",
                "cash",
                "total",
                "returns",
            ])
            .map_err(csv_io_error)?;

        for i in 0..ledger.len() {
            writer
                .write_record([
                    market.bar(i).timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    ledger.units[i].to_string(),
                    ledger.holdings[i].to_string(),
                    ledger.long_positions[i].to_string(),
                    ledger.short_positions[i].to_string(),
                    ledger.cash[i].to_string(),
                    ledger.total[i].to_string(),
                    ledger.returns[i].to_string(),
                ])
                .map_err(csv_io_error)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn write_trades(
        &self,
        market: &Market,
        positions: &[Position],
        path: &Path,
    ) -> Result<(), SigtraderError> {
        let mut writer = csv::Writer::from_path(path).map_err(csv_io_error)?;
        writer
            .write_record([
                "start_index",
                "start_timestamp",
                "stop_index",
                "stop_timestamp",
                "side",
                "units",
                "entry_price",
                "exit_price",
                "outcome",
            ])
            .map_err(csv_io_error)?;

        for position in positions {
            let stop_index = position.stop_index.ok_or(SigtraderError::SimulationNotRun)?;
            let exit_price = position.exit_price.ok_or(SigtraderError::SimulationNotRun)?;
            let outcome = position.outcome.ok_or(SigtraderError::SimulationNotRun)?;

            writer
                .write_record([
                    position.start_index.to_string(),
                    market
                        .bar(position.start_index)
                        .timestamp
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                    stop_index.to_string(),
                    market
                        .bar(stop_index)
                        .timestamp
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                    position.side.as_str().to_string(),
                    position.units.to_string(),
                    position.entry_price.to_string(),
                    exit_price.to_string(),
                    outcome.as_str().to_string(),
                ])
                .map_err(csv_io_error)?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        market: &Market,
        ledger: &PortfolioLedger,
        positions: &[Position],
        output_dir: &Path,
    ) -> Result<(), SigtraderError> {
        fs::create_dir_all(output_dir)?;
        self.write_ledger(market, ledger, &output_dir.join("ledger.csv"))?;
        self.write_trades(market, positions, &output_dir.join("trades.csv"))?;
        Ok(())
    }
}

fn csv_io_error(err: csv::Error) -> SigtraderError {
    SigtraderError::Io(std::io::Error::other(err))
}
