//! CSV file data adapter.
//!
//! Market files carry a `timestamp,open,high,low,close,spread` header with
//! `%Y-%m-%d %H:%M:%S` timestamps. Signal files are one integer per line.

use crate::domain::error::SigtraderError;
use crate::domain::market::{Bar, Market};
use crate::domain::signal::SignalSeries;
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MARKET_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "spread"];

pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        CsvAdapter
    }
}

impl Default for CsvAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPort for CsvAdapter {
    fn fetch_market(&self, path: &Path) -> Result<Market, SigtraderError> {
        let content =
            fs::read_to_string(path).map_err(|e| SigtraderError::InvalidMarketData {
                reason: format!("failed to read {}: {e}", path.display()),
            })?;

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| SigtraderError::InvalidMarketData {
                reason: format!("cannot read header of {}: {e}", path.display()),
            })?
            .clone();

        // Column order in the file is free; names are not.
        let mut column_indices = [0usize; MARKET_COLUMNS.len()];
        for (slot, name) in MARKET_COLUMNS.iter().enumerate() {
            column_indices[slot] = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| SigtraderError::InvalidMarketData {
                    reason: format!("missing required market column {name:?}"),
                })?;
        }

        let mut bars = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| SigtraderError::InvalidMarketData {
                reason: format!("CSV parse error at row {row}: {e}"),
            })?;

            let timestamp_raw = field(&record, column_indices[0], row)?;
            let timestamp = NaiveDateTime::parse_from_str(timestamp_raw.trim(), TIMESTAMP_FORMAT)
                .map_err(|e| SigtraderError::InvalidMarketData {
                    reason: format!("row {row} has an invalid timestamp: {e}"),
                })?;

            let mut prices = [0.0_f64; 5];
            for (i, value) in prices.iter_mut().enumerate() {
                let raw = field(&record, column_indices[i + 1], row)?;
                *value = raw.trim().parse().map_err(|_| {
                    SigtraderError::InvalidMarketData {
                        reason: format!(
                            "row {row} has an invalid {} value",
                            MARKET_COLUMNS[i + 1]
                        ),
                    }
                })?;
            }

            bars.push(Bar {
                timestamp,
                open: prices[0],
                high: prices[1],
                low: prices[2],
                close: prices[3],
                spread: prices[4],
            });
        }

        Market::new(bars)
    }

    fn fetch_signal(&self, path: &Path) -> Result<SignalSeries, SigtraderError> {
        let content = fs::read_to_string(path).map_err(|e| SigtraderError::InvalidSignal {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut values = Vec::new();
        for (row, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: i8 = trimmed.parse().map_err(|_| SigtraderError::InvalidSignal {
                reason: format!("line {row} is not an integer: {trimmed:?}"),
            })?;
            values.push(value);
        }

        SignalSeries::new(values)
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    row: usize,
) -> Result<&'r str, SigtraderError> {
    record
        .get(index)
        .ok_or_else(|| SigtraderError::InvalidMarketData {
            reason: format!("row {row} is missing a field"),
        })
}
