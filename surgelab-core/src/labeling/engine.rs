//! Label engine: a validated [`LabelConfig`] applied to a [`Series`].
//!
//! The engine is stateless and pure. Each day's labels depend only on its own
//! close and the highs of a fixed forward slice, so a series can be split by
//! index range and labeled in parallel with identical output.

use super::stats::LabelStats;
use super::window_max::{forward_max, visible_ahead};
use super::{Label, LabelConfig, LabelError, LabelSpec, TailPolicy};
use crate::domain::{Bar, Series};
use rayon::prelude::*;
use serde::Serialize;

/// A bar plus one label per configured spec, in config order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledBar {
    pub bar: Bar,
    pub labels: Vec<Label>,
}

impl LabeledBar {
    /// Label for the spec at `spec_index`, `None` past the last spec.
    pub fn label(&self, spec_index: usize) -> Option<Label> {
        self.labels.get(spec_index).copied()
    }
}

/// Output of the engine: the input rows, in input order, with label columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledSeries {
    instrument_id: String,
    specs: Vec<LabelSpec>,
    rows: Vec<LabeledBar>,
}

impl LabeledSeries {
    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn specs(&self) -> &[LabelSpec] {
        &self.specs
    }

    pub fn rows(&self) -> &[LabeledBar] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the spec named `name`.
    pub fn spec_index(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    /// Full label column for the spec named `name`.
    pub fn column(&self, name: &str) -> Option<Vec<Label>> {
        let idx = self.spec_index(name)?;
        Some(self.rows.iter().map(|r| r.labels[idx]).collect())
    }

    /// Per-spec label counts.
    pub fn stats(&self) -> Vec<LabelStats> {
        self.specs
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                LabelStats::from_labels(&spec.name, self.rows.iter().map(|r| r.labels[idx]))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct LabelEngine {
    config: LabelConfig,
}

impl LabelEngine {
    /// Build an engine, rejecting invalid specs up front.
    pub fn new(config: LabelConfig) -> Result<Self, LabelError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    /// Label every day of `series`.
    pub fn label(&self, series: &Series) -> LabeledSeries {
        let labels = self.label_range(series.bars(), 0, series.len());
        tracing::debug!(
            instrument = series.instrument_id(),
            bars = series.len(),
            specs = self.config.specs.len(),
            "labeled series"
        );
        self.assemble(series, labels)
    }

    /// Check the series contract on raw bars, then label them.
    pub fn label_bars(&self, bars: Vec<Bar>) -> Result<LabeledSeries, LabelError> {
        let series = Series::new(bars)?;
        Ok(self.label(&series))
    }

    /// Same output as [`label`](Self::label), computed over index chunks on
    /// the rayon pool.
    pub fn label_par(&self, series: &Series, chunk_size: usize) -> LabeledSeries {
        let n = series.len();
        let chunk = chunk_size.max(1);
        let bars = series.bars();

        let starts: Vec<usize> = (0..n).step_by(chunk).collect();
        let parts: Vec<Vec<Vec<Label>>> = starts
            .par_iter()
            .map(|&start| self.label_range(bars, start, (start + chunk).min(n)))
            .collect();

        let labels = parts.into_iter().flatten().collect();
        self.assemble(series, labels)
    }

    /// Labels for rows `[start, end)` of `bars`.
    ///
    /// Only highs in `[start, end + max_window)` are read, which is exactly
    /// the slice any row in the range can see.
    fn label_range(&self, bars: &[Bar], start: usize, end: usize) -> Vec<Vec<Label>> {
        let n = bars.len();
        let stop = end.saturating_add(self.config.max_window()).min(n);
        let highs: Vec<f64> = bars[start..stop].iter().map(|b| b.high).collect();

        // One pass per distinct window length.
        let mut maxima: Vec<(usize, Vec<Option<f64>>)> = Vec::new();
        for spec in &self.config.specs {
            if !maxima.iter().any(|(w, _)| *w == spec.window) {
                maxima.push((spec.window, forward_max(&highs, spec.window)));
            }
        }
        let spec_maxima: Vec<&[Option<f64>]> = self
            .config
            .specs
            .iter()
            .map(|spec| {
                maxima
                    .iter()
                    .find(|(w, _)| *w == spec.window)
                    .map(|(_, m)| m.as_slice())
                    .unwrap_or(&[])
            })
            .collect();

        (start..end)
            .map(|i| {
                let local = i - start;
                let base = bars[i].base_price();
                self.config
                    .specs
                    .iter()
                    .zip(&spec_maxima)
                    .map(|(spec, row_max)| {
                        let truncated = visible_ahead(i, n, spec.window) < spec.window;
                        decide(
                            base,
                            row_max.get(local).copied().flatten(),
                            spec.threshold,
                            truncated,
                            self.config.tail_policy,
                        )
                    })
                    .collect()
            })
            .collect()
    }

    fn assemble(&self, series: &Series, labels: Vec<Vec<Label>>) -> LabeledSeries {
        let rows = series
            .bars()
            .iter()
            .cloned()
            .zip(labels)
            .map(|(bar, labels)| LabeledBar { bar, labels })
            .collect();
        LabeledSeries {
            instrument_id: series.instrument_id().to_string(),
            specs: self.config.specs.clone(),
            rows,
        }
    }
}

/// Label one day from its base price and forward maximum high.
fn decide(
    base: Option<f64>,
    max_high: Option<f64>,
    threshold: f64,
    truncated: bool,
    tail_policy: TailPolicy,
) -> Label {
    let Some(base) = base else {
        return Label::Negative;
    };
    if let Some(high) = max_high {
        if (high - base) / base >= threshold {
            return Label::Positive;
        }
    }
    if truncated && tail_policy == TailPolicy::Unknown {
        Label::Unknown
    } else {
        Label::Negative
    }
}

/// Two-label entry point: `strong` and `buy` with explicit thresholds and windows.
pub fn label(
    series: &Series,
    strong_threshold: f64,
    buy_threshold: f64,
    strong_window: usize,
    buy_window: usize,
) -> Result<LabeledSeries, LabelError> {
    let config =
        LabelConfig::strong_buy(strong_threshold, buy_threshold, strong_window, buy_window);
    Ok(LabelEngine::new(config)?.label(series))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::make_series;

    #[test]
    fn labeled_bar_lookup_is_bounds_checked() {
        let engine = LabelEngine::new(LabelConfig::default()).unwrap();
        let out = engine.label(&make_series(&[(100.0, 100.0), (100.0, 130.0)]));
        let row = &out.rows()[0];
        assert_eq!(row.label(0), Some(Label::Positive));
        assert_eq!(row.label(1), Some(Label::Positive));
        assert_eq!(row.label(2), None);
    }

    #[test]
    fn decide_is_inclusive_at_threshold() {
        let label = decide(Some(100.0), Some(125.0), 0.25, false, TailPolicy::Negative);
        assert_eq!(label, Label::Positive);
        let label = decide(Some(100.0), Some(124.99), 0.25, false, TailPolicy::Negative);
        assert_eq!(label, Label::Negative);
    }

    #[test]
    fn decide_without_base_is_negative_under_any_policy() {
        assert_eq!(
            decide(None, Some(1_000.0), 0.25, true, TailPolicy::Unknown),
            Label::Negative
        );
    }

    #[test]
    fn decide_tail_policy_only_applies_when_truncated() {
        assert_eq!(decide(Some(100.0), None, 0.25, true, TailPolicy::Unknown), Label::Unknown);
        assert_eq!(decide(Some(100.0), None, 0.25, false, TailPolicy::Unknown), Label::Negative);
        assert_eq!(decide(Some(100.0), None, 0.25, true, TailPolicy::Negative), Label::Negative);
        assert_eq!(
            decide(Some(100.0), Some(130.0), 0.25, true, TailPolicy::Unknown),
            Label::Positive
        );
    }

    #[test]
    fn label_keeps_row_order_and_bars() {
        let series = make_series(&[(100.0, 101.0), (100.0, 130.0), (100.0, 100.0)]);
        let out = label(&series, 0.25, 0.18, 10, 15).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.instrument_id(), "TEST");
        for (row, bar) in out.rows().iter().zip(series.bars()) {
            assert_eq!(&row.bar, bar);
        }
        assert_eq!(
            out.column("strong").unwrap(),
            vec![Label::Positive, Label::Negative, Label::Negative]
        );
    }

    #[test]
    fn label_rejects_invalid_config() {
        let series = make_series(&[(100.0, 101.0)]);
        assert!(matches!(
            label(&series, 0.25, 0.18, 0, 15),
            Err(LabelError::InvalidSpec(_))
        ));
    }

    #[test]
    fn label_bars_fails_fast_on_unsorted_input() {
        let series = make_series(&[(100.0, 101.0), (100.0, 102.0)]);
        let mut bars = series.into_bars();
        bars.reverse();
        let engine = LabelEngine::new(LabelConfig::default()).unwrap();
        assert!(matches!(engine.label_bars(bars), Err(LabelError::Series(_))));
    }

    #[test]
    fn shared_window_lengths_are_computed_once_and_reused() {
        let series = make_series(&[(100.0, 100.0), (100.0, 120.0), (100.0, 100.0)]);
        let config = LabelConfig::new(vec![
            LabelSpec::new("a", 0.10, 2),
            LabelSpec::new("b", 0.30, 2),
        ]);
        let out = LabelEngine::new(config).unwrap().label(&series);
        assert_eq!(out.rows()[0].labels, vec![Label::Positive, Label::Negative]);
    }

    #[test]
    fn label_par_matches_label_for_every_chunk_size() {
        let pairs: Vec<(f64, f64)> = (0..97)
            .map(|i| {
                let close = 100.0 + ((i * 13) % 17) as f64;
                (close, close * (1.0 + ((i * 7) % 31) as f64 / 100.0))
            })
            .collect();
        let series = make_series(&pairs);
        let engine =
            LabelEngine::new(LabelConfig::default().with_tail_policy(TailPolicy::Unknown)).unwrap();
        let expected = engine.label(&series);
        for chunk in [1, 2, 5, 16, 96, 97, 500] {
            assert_eq!(engine.label_par(&series, chunk), expected, "chunk={chunk}");
        }
    }

    #[test]
    fn stats_count_each_column() {
        let series = make_series(&[(100.0, 100.0), (100.0, 130.0), (100.0, 100.0)]);
        let out = label(&series, 0.25, 0.18, 10, 15).unwrap();
        let stats = out.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "strong");
        assert_eq!(stats[0].positive, 1);
        assert_eq!(stats[0].negative, 2);
    }
}
