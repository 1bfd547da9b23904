//! Normalizer: raw provider records in, a clean [`Series`] out.
//!
//! Steps, in order: stable sort by date, drop repeated dates (first wins),
//! fill gaps per [`FillMethod`], widen high/low to cover open and close,
//! clamp volume at zero, stamp the instrument id. The result goes through
//! [`Series::new`], so anything that slips past these steps still fails loudly.

use super::provider::RawBar;
use crate::domain::{Bar, Series, SeriesError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Instrument id used when neither the caller nor the data supplies one.
pub const UNKNOWN_INSTRUMENT: &str = "UNKNOWN";

/// How missing numeric values are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMethod {
    /// Carry the last seen value forward.
    Forward,
    /// Pull the next seen value backward.
    Backward,
    /// Forward, then backward for a leading gap.
    #[default]
    Both,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub fill: FillMethod,
    pub drop_duplicates: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            fill: FillMethod::Both,
            drop_duplicates: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("no records to normalize")]
    Empty,

    #[error(transparent)]
    Series(#[from] SeriesError),
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    /// Turn raw records into a validated series.
    ///
    /// `instrument_id` wins over any id carried by the records.
    pub fn normalize(
        &self,
        raw: Vec<RawBar>,
        instrument_id: Option<&str>,
    ) -> Result<Series, NormalizeError> {
        if raw.is_empty() {
            return Err(NormalizeError::Empty);
        }

        let id = instrument_id
            .map(str::to_string)
            .or_else(|| raw.iter().find_map(|r| r.instrument_id.clone()))
            .unwrap_or_else(|| UNKNOWN_INSTRUMENT.to_string());

        let input_len = raw.len();
        let mut rows = raw;
        // sort_by_key is stable: among equal dates the provider's order survives
        rows.sort_by_key(|r| r.date);
        if self.options.drop_duplicates {
            rows.dedup_by_key(|r| r.date);
        }
        let dropped = input_len - rows.len();

        let mut columns = [
            rows.iter().map(|r| r.open).collect::<Vec<_>>(),
            rows.iter().map(|r| r.high).collect::<Vec<_>>(),
            rows.iter().map(|r| r.low).collect::<Vec<_>>(),
            rows.iter().map(|r| r.close).collect::<Vec<_>>(),
            rows.iter().map(|r| r.volume).collect::<Vec<_>>(),
        ];
        let mut filled = 0;
        for column in columns.iter_mut() {
            filled += fill_gaps(column, self.options.fill);
        }
        let [open, high, low, close, volume] = columns;

        let bars: Vec<Bar> = rows
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let prices = [open[i], high[i], low[i], close[i]];
                Bar {
                    date: r.date,
                    instrument_id: id.clone(),
                    open: open[i],
                    high: nan_max(&prices),
                    low: nan_min(&prices),
                    close: close[i],
                    volume: if volume[i] < 0.0 { 0.0 } else { volume[i] },
                }
            })
            .collect();

        tracing::debug!(
            instrument = %id,
            input = input_len,
            output = bars.len(),
            duplicates_dropped = dropped,
            cells_filled = filled,
            "normalized bars"
        );

        Ok(Series::new(bars)?)
    }
}

/// Fill NaN cells in place. Returns how many cells were filled.
fn fill_gaps(values: &mut [f64], method: FillMethod) -> usize {
    let before = values.iter().filter(|v| v.is_nan()).count();
    if matches!(method, FillMethod::Forward | FillMethod::Both) {
        let mut last = f64::NAN;
        for v in values.iter_mut() {
            if v.is_nan() {
                *v = last;
            } else {
                last = *v;
            }
        }
    }
    if matches!(method, FillMethod::Backward | FillMethod::Both) {
        let mut next = f64::NAN;
        for v in values.iter_mut().rev() {
            if v.is_nan() {
                *v = next;
            } else {
                next = *v;
            }
        }
    }
    before - values.iter().filter(|v| v.is_nan()).count()
}

/// Max ignoring NaN; NaN only when every value is NaN.
fn nan_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NAN, f64::max)
}

fn nan_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NAN, f64::min)
}
