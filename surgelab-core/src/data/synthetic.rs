//! Deterministic synthetic bars for demos and tests.
//!
//! A weekday random walk seeded from the BLAKE3 hash of the instrument id, so
//! the same id and range always produce the same bars. Occasional gap-up days
//! make sure the default labels see some positives.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Probability that a day is a gap-up day.
const SURGE_PROBABILITY: f64 = 0.03;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    start_price: f64,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self { start_price: 1_000.0 }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars = generate_bars(instrument_id, start, end, self.start_price);
        if bars.is_empty() {
            return Err(DataError::NoData {
                instrument_id: instrument_id.to_string(),
                start,
                end,
            });
        }
        Ok(FetchResult {
            instrument_id: instrument_id.to_string(),
            bars,
            source: DataSource::Synthetic,
        })
    }
}

/// Weekday random walk over `[start, end]`.
pub fn generate_bars(
    instrument_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    start_price: f64,
) -> Vec<RawBar> {
    let seed: [u8; 32] = *blake3::hash(instrument_id.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = start_price;
    let mut current = start;

    while current <= end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = if rng.gen_bool(SURGE_PROBABILITY) {
            rng.gen_range(0.08..0.20)
        } else {
            rng.gen_range(-0.03..0.03)
        };
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(100_000..2_000_000u64) as f64;

        bars.push(RawBar {
            date: current,
            instrument_id: Some(instrument_id.to_string()),
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}
