//! Data access port trait.

use crate::domain::error::SigtraderError;
use crate::domain::market::Market;
use crate::domain::signal::SignalSeries;
use std::path::Path;

pub trait DataPort {
    /// Load and validate a bar series.
    fn fetch_market(&self, path: &Path) -> Result<Market, SigtraderError>;

    /// Load and validate a signal series. Length is checked against the
    /// market at run time, not here.
    fn fetch_signal(&self, path: &Path) -> Result<SignalSeries, SigtraderError>;
}
