//! Report generation port trait.

use crate::domain::error::SigtraderError;
use crate::domain::market::Market;
use crate::domain::portfolio::PortfolioLedger;
use crate::domain::position::Position;
use std::path::Path;

/// Port for writing run results: the per-bar ledger and the closed trades.
pub trait ReportPort {
    fn write(
        &self,
        market: &Market,
        ledger: &PortfolioLedger,
        positions: &[Position],
        output_dir: &Path,
    ) -> Result<(), SigtraderError>;
}
