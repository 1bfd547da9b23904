//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over data sources (CSV files, the J-Quants
//! API, the Parquet cache, synthetic bars) so the pipeline can swap them and
//! tests can mock them. Providers return raw, unordered bars; cleaning is the
//! normalizer's job.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily OHLCV record from a provider (before normalization).
///
/// Missing numeric fields are `NaN`. Records may arrive unsorted and may
/// repeat a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub instrument_id: Option<String>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl RawBar {
    /// A record with every numeric field missing.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            instrument_id: None,
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
            volume: f64::NAN,
        }
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {provider}")]
    Http { provider: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("no data returned for '{instrument_id}' from {start} to {end}")]
    NoData {
        instrument_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for '{instrument_id}'")]
    NoCachedData { instrument_id: String },
}

/// Result of a successful fetch for a single instrument.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub instrument_id: String,
    pub bars: Vec<RawBar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    CsvImport,
    JQuants,
    Cache,
    Synthetic,
}

/// Trait for data providers.
///
/// Implementations handle the specifics of one source. The cache and the
/// normalizer sit above this trait; providers know about neither.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily OHLCV records for an instrument over an inclusive date range.
    fn fetch(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;

    /// Whether the provider can currently serve requests.
    fn is_available(&self) -> bool {
        true
    }
}

impl DataProvider for Box<dyn DataProvider> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn fetch(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        self.as_ref().fetch(instrument_id, start, end)
    }

    fn is_available(&self) -> bool {
        self.as_ref().is_available()
    }
}
