//! Provider resolution for the runner.
//!
//! A [`DataSourceSpec`] says where bars come from; [`DataSourceSpec::provider_for`]
//! turns it into a concrete provider for one instrument. Wrapping it in a
//! [`CachedProvider`] adds the read-through Parquet cache:
//! 1. If one previously fetched range contains the request → serve from the cache
//! 2. Otherwise → fetch from the source and merge the result into the cache,
//!    recording the requested range as covered
//!
//! A cache write failure is logged and does not fail the fetch.

use chrono::NaiveDate;
use std::path::PathBuf;

use surgelab_core::data::{
    CoverageResult, CoveredRange, CsvProvider, DataError, DataProvider, FetchResult,
    JQuantsProvider, ParquetCache, SyntheticProvider,
};

/// Where the raw bars for a run come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSourceSpec {
    /// One CSV file, used for every instrument.
    CsvFile(PathBuf),
    /// A directory of `{code}.csv` files.
    CsvDir(PathBuf),
    /// The J-Quants API, token from `JQUANTS_API_KEY`.
    JQuants,
    /// Deterministic synthetic bars.
    Synthetic,
}

impl DataSourceSpec {
    pub fn provider_for(&self, instrument_id: &str) -> Result<Box<dyn DataProvider>, DataError> {
        Ok(match self {
            DataSourceSpec::CsvFile(path) => Box::new(CsvProvider::new(path.clone())),
            DataSourceSpec::CsvDir(dir) => {
                Box::new(CsvProvider::new(dir.join(format!("{instrument_id}.csv"))))
            }
            DataSourceSpec::JQuants => Box::new(JQuantsProvider::from_env()?),
            DataSourceSpec::Synthetic => Box::new(SyntheticProvider::new()),
        })
    }
}

/// Read-through cache in front of another provider.
pub struct CachedProvider<P> {
    inner: P,
    cache: ParquetCache,
}

impl<P: DataProvider> CachedProvider<P> {
    pub fn new(inner: P, cache: ParquetCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ParquetCache {
        &self.cache
    }
}

impl<P: DataProvider> DataProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        if self.cache.covers_range(instrument_id, start, end) == CoverageResult::FullyCovered {
            match self.cache.fetch(instrument_id, start, end) {
                Ok(result) => {
                    tracing::debug!(instrument = instrument_id, "served from cache");
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(instrument = instrument_id, error = %e, "cache read failed, refetching");
                }
            }
        }

        let result = self.inner.fetch(instrument_id, start, end)?;
        let range = CoveredRange::new(start, end);
        if let Err(e) = self
            .cache
            .write_range(instrument_id, range, &result.bars, result.source)
        {
            tracing::warn!(instrument = instrument_id, error = %e, "cache write failed");
        }
        Ok(result)
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}
