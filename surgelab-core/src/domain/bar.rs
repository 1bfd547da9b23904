//! One trading day of OHLCV data for one instrument.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar produced by the normalizer.
///
/// Prices are `f64` with `NaN` standing in for a value that could not be
/// filled (a whole column was empty). Volume is kept as `f64` because some
/// sources report fractional or adjusted volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub instrument_id: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// OHLC consistency: `low <= {open, close} <= high`, prices non-negative.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low >= 0.0
    }

    /// Close usable as a base price for a percentage gain.
    pub fn base_price(&self) -> Option<f64> {
        if self.close.is_nan() || self.close <= 0.0 {
            None
        } else {
            Some(self.close)
        }
    }
}
