//! Pipeline: fetch → normalize → validate → label.
//!
//! Two entry points:
//! - `run_pipeline()`: one instrument from one provider. Used by `surgelab label`.
//! - `run_batch()`: many instruments on the rayon pool. Used by `surgelab batch`.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use surgelab_core::data::{
    validate, DataError, DataProvider, DataSource, NormalizeError, Normalizer, ValidationReport,
};
use surgelab_core::domain::Series;
use surgelab_core::labeling::{LabelEngine, LabelError, LabelStats, LabeledSeries};

use crate::config::{ConfigError, PipelineConfig};
use crate::export::ExportError;

/// Series at least this long are labeled in index chunks on the rayon pool.
pub const PARALLEL_MIN_BARS: usize = 20_000;

const PARALLEL_CHUNK: usize = 4_096;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("normalize error: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("label error: {0}")]
    Label(#[from] LabelError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub instrument_id: String,
    pub source: DataSource,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub raw_rows: usize,
    pub labeled: LabeledSeries,
    pub report: ValidationReport,
    pub stats: Vec<LabelStats>,
    /// BLAKE3 over the normalized bars, for reproducibility checks.
    pub dataset_hash: String,
    pub config_hash: String,
}

/// Run the full pipeline for one instrument.
pub fn run_pipeline(
    provider: &dyn DataProvider,
    instrument_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    config: &PipelineConfig,
) -> Result<PipelineResult, PipelineError> {
    if start > end {
        return Err(PipelineError::InvalidRange { start, end });
    }
    let engine = LabelEngine::new(config.label_config())?;

    let fetched = provider.fetch(instrument_id, start, end)?;
    let raw_rows = fetched.bars.len();
    let series = Normalizer::new(config.normalize).normalize(fetched.bars, Some(instrument_id))?;
    let report = validate(&series);
    if !report.is_valid() {
        tracing::warn!(instrument = instrument_id, "data quality issues:\n{report}");
    }

    let labeled = if series.len() >= PARALLEL_MIN_BARS {
        engine.label_par(&series, PARALLEL_CHUNK)
    } else {
        engine.label(&series)
    };
    let stats = labeled.stats();

    tracing::info!(
        instrument = instrument_id,
        provider = provider.name(),
        raw = raw_rows,
        bars = series.len(),
        "labeled"
    );

    Ok(PipelineResult {
        instrument_id: instrument_id.to_string(),
        source: fetched.source,
        start,
        end,
        raw_rows,
        dataset_hash: dataset_hash(&series),
        config_hash: config.config_hash(),
        labeled,
        report,
        stats,
    })
}

/// Outcome for one instrument of a batch run.
#[derive(Debug)]
pub struct BatchItem {
    pub instrument_id: String,
    pub result: Result<PipelineResult, PipelineError>,
}

/// Run the pipeline for every instrument in parallel.
///
/// `provider_for` builds the provider for one instrument. A failure on one
/// instrument is recorded in its [`BatchItem`] and does not stop the others.
/// Output order matches `instruments`.
pub fn run_batch<F>(
    instruments: &[String],
    start: NaiveDate,
    end: NaiveDate,
    config: &PipelineConfig,
    provider_for: F,
) -> Vec<BatchItem>
where
    F: Fn(&str) -> Result<Box<dyn DataProvider>, DataError> + Sync,
{
    instruments
        .par_iter()
        .map(|id| {
            let result = provider_for(id)
                .map_err(PipelineError::from)
                .and_then(|provider| run_pipeline(provider.as_ref(), id, start, end, config));
            if let Err(e) = &result {
                tracing::warn!(instrument = %id, error = %e, "batch item failed");
            }
            BatchItem {
                instrument_id: id.clone(),
                result,
            }
        })
        .collect()
}

/// Deterministic BLAKE3 hash over dates and OHLCV values of a series.
pub fn dataset_hash(series: &Series) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(series.instrument_id().as_bytes());
    for bar in series.bars() {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
