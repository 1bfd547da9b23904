//! Ordered, duplicate-free run of bars for a single instrument.
//!
//! The only way to build a `Series` is through [`Series::new`], which checks
//! the ordering contract the label engine relies on. Positions in the series
//! are the unit of "trading days": weekends and holidays simply have no bar.

use super::bar::Bar;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Contract violations rejected before a series reaches the label engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,

    #[error("series is not sorted by date: bar {index} ({date}) precedes its predecessor")]
    Unsorted { index: usize, date: NaiveDate },

    #[error("duplicate trading date {date} at bar {index}")]
    DuplicateDate { index: usize, date: NaiveDate },

    #[error("bar {index} belongs to '{found}', expected '{expected}'")]
    MixedInstrument {
        index: usize,
        expected: String,
        found: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    instrument_id: String,
    bars: Vec<Bar>,
}

impl Series {
    /// Build a series, failing fast on empty input, unsorted or duplicate
    /// dates, and bars from more than one instrument.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        let first = bars.first().ok_or(SeriesError::Empty)?;
        let instrument_id = first.instrument_id.clone();

        for (index, pair) in bars.windows(2).enumerate() {
            let (prev, cur) = (&pair[0], &pair[1]);
            let index = index + 1;
            if cur.date == prev.date {
                return Err(SeriesError::DuplicateDate {
                    index,
                    date: cur.date,
                });
            }
            if cur.date < prev.date {
                return Err(SeriesError::Unsorted {
                    index,
                    date: cur.date,
                });
            }
        }

        if let Some((index, bar)) = bars
            .iter()
            .enumerate()
            .find(|(_, b)| b.instrument_id != instrument_id)
        {
            return Err(SeriesError::MixedInstrument {
                index,
                expected: instrument_id,
                found: bar.instrument_id.clone(),
            });
        }

        Ok(Self {
            instrument_id,
            bars,
        })
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    /// Highs as a flat column, in series order.
    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}
