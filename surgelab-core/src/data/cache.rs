//! Parquet cache for raw provider records, Hive-style partitioned.
//!
//! Layout: `{cache_dir}/code={ID}/{year}.parquet` plus `meta.json`.
//!
//! - Writes go to `.tmp` and are renamed into place.
//! - A file that fails to load is renamed to `{file}.quarantined` and skipped.
//! - Writes merge into the existing year files; a date already cached is
//!   replaced by the newer record.
//! - The sidecar records the requested ranges that have been fetched, the row
//!   count, and a BLAKE3 hash of the cached records. Coverage is answered from
//!   those ranges, never from the first and last cached dates.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const EXPECTED_COLUMNS: [&str; 7] = ["date", "code", "open", "high", "low", "close", "volume"];

/// Inclusive date range that a provider has been asked for and answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoveredRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CoveredRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= start && end <= self.end
    }
}

/// Add `range` to `ranges`, coalescing overlapping and touching ranges.
///
/// The result is sorted and disjoint.
pub fn merge_ranges(ranges: &[CoveredRange], range: CoveredRange) -> Vec<CoveredRange> {
    let mut all: Vec<CoveredRange> = ranges.to_vec();
    all.push(range);
    all.sort_by_key(|r| r.start);

    let mut merged: Vec<CoveredRange> = Vec::with_capacity(all.len());
    for r in all {
        match merged.last_mut() {
            Some(last) if r.start <= last.end.succ_opt().unwrap_or(last.end) => {
                last.end = last.end.max(r.end);
            }
            _ => merged.push(r),
        }
    }
    merged
}

/// Metadata sidecar for one cached instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub instrument_id: String,
    /// First and last cached bar dates. Not a coverage claim; see `covered`.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Requested ranges written so far, sorted and disjoint.
    #[serde(default)]
    pub covered: Vec<CoveredRange>,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: chrono::NaiveDateTime,
}

/// How well the cache covers a requested date range.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

#[derive(Debug, Clone)]
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn instrument_dir(&self, instrument_id: &str) -> PathBuf {
        self.cache_dir.join(format!("code={instrument_id}"))
    }

    fn year_path(&self, instrument_id: &str, year: i32) -> PathBuf {
        self.instrument_dir(instrument_id)
            .join(format!("{year}.parquet"))
    }

    fn meta_path(&self, instrument_id: &str) -> PathBuf {
        self.instrument_dir(instrument_id).join("meta.json")
    }

    /// Store records covering their own first..last dates.
    pub fn write(
        &self,
        instrument_id: &str,
        bars: &[RawBar],
        source: DataSource,
    ) -> Result<CacheMeta, DataError> {
        let (Some(start), Some(end)) = (
            bars.iter().map(|b| b.date).min(),
            bars.iter().map(|b| b.date).max(),
        ) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };
        self.write_range(instrument_id, CoveredRange::new(start, end), bars, source)
    }

    /// Store the answer to a fetch of `range`, one Parquet file per calendar
    /// year.
    ///
    /// Bars are merged into the existing year files by date, so earlier fetches
    /// are kept. `range` is added to the covered ranges in the sidecar.
    pub fn write_range(
        &self,
        instrument_id: &str,
        range: CoveredRange,
        bars: &[RawBar],
        source: DataSource,
    ) -> Result<CacheMeta, DataError> {
        if bars.is_empty() {
            return Err(DataError::CacheError("no bars to cache".into()));
        }
        if range.start > range.end {
            return Err(DataError::CacheError(format!(
                "invalid range {} to {}",
                range.start, range.end
            )));
        }
        let previous = self
            .get_meta(instrument_id)
            .map(|m| m.covered)
            .unwrap_or_default();

        let dir = self.instrument_dir(instrument_id);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut by_year: BTreeMap<i32, Vec<&RawBar>> = BTreeMap::new();
        for bar in bars {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for (year, year_bars) in &by_year {
            let path = self.year_path(instrument_id, *year);

            let mut merged: BTreeMap<NaiveDate, RawBar> = BTreeMap::new();
            if path.exists() {
                match load_and_validate_parquet(&path) {
                    Ok(existing) => merged.extend(existing.into_iter().map(|b| (b.date, b))),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "replacing unreadable cache file"
                    ),
                }
            }
            merged.extend(year_bars.iter().map(|b| (b.date, (*b).clone())));
            let merged: Vec<&RawBar> = merged.values().collect();

            let df = bars_to_dataframe(instrument_id, &merged)?;
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;
            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }

        let cached = self.load(instrument_id)?;
        let covered = merge_ranges(&previous, range);
        let meta = build_meta(instrument_id, &cached, covered, source)?;
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(instrument_id), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        tracing::debug!(
            instrument = instrument_id,
            years = by_year.len(),
            bars = meta.bar_count,
            "cache updated"
        );
        Ok(meta)
    }

    /// All cached records for an instrument, sorted by date.
    pub fn load(&self, instrument_id: &str) -> Result<Vec<RawBar>, DataError> {
        let dir = self.instrument_dir(instrument_id);
        if !dir.exists() {
            return Err(DataError::NoCachedData {
                instrument_id: instrument_id.to_string(),
            });
        }

        let entries =
            fs::read_dir(&dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut all_bars = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "quarantining corrupt cache file"
                    );
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }

        if all_bars.is_empty() {
            return Err(DataError::NoCachedData {
                instrument_id: instrument_id.to_string(),
            });
        }

        all_bars.sort_by_key(|b| b.date);
        Ok(all_bars)
    }

    /// Cached records within an inclusive date range.
    pub fn load_range(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let mut bars = self.load(instrument_id)?;
        bars.retain(|b| b.date >= start && b.date <= end);
        Ok(bars)
    }

    pub fn get_meta(&self, instrument_id: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(instrument_id)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Whether `[start, end]` lies inside a single covered range.
    pub fn covers_range(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoverageResult {
        match self.get_meta(instrument_id) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.covered.iter().any(|r| r.contains(start, end)) => {
                CoverageResult::FullyCovered
            }
            Some(meta) => CoverageResult::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        }
    }
}

impl DataProvider for ParquetCache {
    fn name(&self) -> &str {
        "cache"
    }

    fn fetch(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars = self.load_range(instrument_id, start, end)?;
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
            source: DataSource::Cache,
        })
    }

    fn is_available(&self) -> bool {
        self.cache_dir.is_dir()
    }
}

fn build_meta(
    instrument_id: &str,
    bars: &[RawBar],
    covered: Vec<CoveredRange>,
    source: DataSource,
) -> Result<CacheMeta, DataError> {
    let (first, last) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(DataError::CacheError("no bars to describe".into())),
    };
    let encoded = serde_json::to_vec(bars)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(CacheMeta {
        instrument_id: instrument_id.to_string(),
        start_date: first.date,
        end_date: last.date,
        covered,
        bar_count: bars.len(),
        data_hash: blake3::hash(&encoded).to_hex().to_string(),
        source,
        cached_at: chrono::Local::now().naive_local(),
    })
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn bars_to_dataframe(instrument_id: &str, bars: &[&RawBar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let codes: Vec<String> = bars
        .iter()
        .map(|b| {
            b.instrument_id
                .clone()
                .unwrap_or_else(|| instrument_id.to_string())
        })
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("code".into(), codes),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<RawBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }
    for name in EXPECTED_COLUMNS {
        if df.column(name).is_err() {
            return Err(DataError::CacheError(format!("missing column '{name}'")));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<RawBar>, DataError> {
    let column_err = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("{name} column: {e}"))
    };
    let f64_column = |name: &str| -> Result<Float64Chunked, DataError> {
        df.column(name)
            .and_then(|c| c.f64().cloned())
            .map_err(|e| column_err(name, e))
    };

    let dates = df
        .column("date")
        .and_then(|c| c.date().cloned())
        .map_err(|e| column_err("date", e))?;
    let codes = df
        .column("code")
        .and_then(|c| c.str().cloned())
        .map_err(|e| column_err("code", e))?;
    let opens = f64_column("open")?;
    let highs = f64_column("high")?;
    let lows = f64_column("low")?;
    let closes = f64_column("close")?;
    let volumes = f64_column("volume")?;

    (0..df.height())
        .map(|i| -> Result<RawBar, DataError> {
            let days = dates
                .get(i)
                .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
            Ok(RawBar {
                date: epoch() + chrono::Duration::days(days as i64),
                instrument_id: codes.get(i).map(str::to_string),
                open: opens.get(i).unwrap_or(f64::NAN),
                high: highs.get(i).unwrap_or(f64::NAN),
                low: lows.get(i).unwrap_or(f64::NAN),
                close: closes.get(i).unwrap_or(f64::NAN),
                volume: volumes.get(i).unwrap_or(f64::NAN),
            })
        })
        .collect()
}
