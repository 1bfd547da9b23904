//! Forward-looking gain labels for daily bar series.
//!
//! A label answers one question per trading day: does any high within the
//! next `window` bars reach `threshold` fractional gain over today's close?
//!
//! ```text
//! max_h(i)  = max { high[j] : i < j <= min(i + window, n - 1), high[j] not NaN }
//! label(i)  = 1  if close[i] > 0 and (max_h(i) - close[i]) / close[i] >= threshold
//!           = 0  otherwise
//! ```
//!
//! The window counts positions in the series, not calendar days. Today's own
//! high never counts. Days too close to the end of the series to see a full
//! window are still labeled from whatever rows remain; see [`TailPolicy`].
//!
//! The default configuration carries the two labels the screening pipeline
//! trains on: `strong` (+25% within 10 days) and `buy` (+18% within 15 days).
//! Any number of additional `(name, threshold, window)` specs can be added
//! without touching the engine loop.

pub mod engine;
pub mod stats;
pub mod window_max;

pub use engine::{label, LabelEngine, LabeledBar, LabeledSeries};
pub use stats::LabelStats;
pub use window_max::{forward_max, forward_max_naive};

use crate::domain::SeriesError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub const DEFAULT_STRONG_THRESHOLD: f64 = 0.25;
pub const DEFAULT_BUY_THRESHOLD: f64 = 0.18;
pub const DEFAULT_STRONG_WINDOW: usize = 10;
pub const DEFAULT_BUY_WINDOW: usize = 15;

/// Outcome of one label on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Negative,
    Positive,
    /// Forward window truncated by the series end with no hit found.
    /// Only produced under [`TailPolicy::Unknown`].
    Unknown,
}

impl Label {
    /// Integer form for export: 0, 1, or `None` for unknown.
    #[inline]
    pub fn as_int(&self) -> Option<u8> {
        match self {
            Label::Negative => Some(0),
            Label::Positive => Some(1),
            Label::Unknown => None,
        }
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        matches!(self, Label::Positive)
    }
}

/// How to label a day whose forward window runs past the series end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// Evaluate the truncated window; no hit means `Negative`.
    #[default]
    Negative,
    /// Evaluate the truncated window; no hit means `Unknown`.
    /// A hit inside the truncated window is still `Positive`.
    Unknown,
}

/// One label column: a fractional gain threshold over a forward window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub name: String,
    pub threshold: f64,
    pub window: usize,
}

impl LabelSpec {
    pub fn new(name: impl Into<String>, threshold: f64, window: usize) -> Self {
        Self {
            name: name.into(),
            threshold,
            window,
        }
    }

    pub fn strong(threshold: f64, window: usize) -> Self {
        Self::new("strong", threshold, window)
    }

    pub fn buy(threshold: f64, window: usize) -> Self {
        Self::new("buy", threshold, window)
    }

    /// Output column name, e.g. `strong_label`.
    pub fn column_name(&self) -> String {
        format!("{}_label", self.name)
    }

    pub fn validate(&self) -> Result<(), LabelError> {
        if self.name.trim().is_empty() {
            return Err(LabelError::InvalidSpec("label name must not be empty".into()));
        }
        if self.window == 0 {
            return Err(LabelError::InvalidSpec(format!(
                "label '{}': window must be positive",
                self.name
            )));
        }
        if !self.threshold.is_finite() {
            return Err(LabelError::InvalidSpec(format!(
                "label '{}': threshold must be finite, got {}",
                self.name, self.threshold
            )));
        }
        Ok(())
    }
}

/// Ordered list of label specs plus the tail policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    pub specs: Vec<LabelSpec>,
    #[serde(default)]
    pub tail_policy: TailPolicy,
}

impl LabelConfig {
    pub fn new(specs: Vec<LabelSpec>) -> Self {
        Self {
            specs,
            tail_policy: TailPolicy::default(),
        }
    }

    /// The two-label layout: `strong` then `buy`.
    pub fn strong_buy(
        strong_threshold: f64,
        buy_threshold: f64,
        strong_window: usize,
        buy_window: usize,
    ) -> Self {
        Self::new(vec![
            LabelSpec::strong(strong_threshold, strong_window),
            LabelSpec::buy(buy_threshold, buy_window),
        ])
    }

    pub fn with_tail_policy(mut self, tail_policy: TailPolicy) -> Self {
        self.tail_policy = tail_policy;
        self
    }

    pub fn with_spec(mut self, spec: LabelSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Largest forward window across all specs.
    pub fn max_window(&self) -> usize {
        self.specs.iter().map(|s| s.window).max().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), LabelError> {
        if self.specs.is_empty() {
            return Err(LabelError::InvalidSpec("at least one label spec is required".into()));
        }
        let mut seen = HashSet::new();
        for spec in &self.specs {
            spec.validate()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(LabelError::InvalidSpec(format!(
                    "duplicate label name '{}'",
                    spec.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self::strong_buy(
            DEFAULT_STRONG_THRESHOLD,
            DEFAULT_BUY_THRESHOLD,
            DEFAULT_STRONG_WINDOW,
            DEFAULT_BUY_WINDOW,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LabelError {
    #[error("invalid label spec: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Build a consecutive-day series from `(close, high)` pairs for testing.
///
/// open = close, low = min(close, high), volume = 1000.
#[cfg(test)]
pub fn make_series(pairs: &[(f64, f64)]) -> crate::domain::Series {
    use crate::domain::{Bar, Series};
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let bars = pairs
        .iter()
        .enumerate()
        .map(|(i, &(close, high))| Bar {
            date: base_date + chrono::Duration::days(i as i64),
            instrument_id: "TEST".to_string(),
            open: close,
            high,
            low: close.min(high),
            close,
            volume: 1000.0,
        })
        .collect();
    Series::new(bars).unwrap()
}
