//! CSV file provider.
//!
//! Reads any daily OHLCV CSV whose headers match the alias table in
//! [`columns`](super::columns). Extra columns are ignored. Numeric cells that
//! fail to parse become `NaN` and are left for the normalizer to fill; rows
//! whose date fails to parse are dropped.

use super::columns::{canonical_column, parse_date, parse_number, Column};
use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Provider backed by a single CSV file.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let file = File::open(&self.path)?;
        let bars = read_csv(file, Some(instrument_id), Some((start, end)))?;
        tracing::info!(
            path = %self.path.display(),
            instrument = instrument_id,
            rows = bars.len(),
            "loaded CSV"
        );
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
            source: DataSource::CsvImport,
        })
    }

    fn is_available(&self) -> bool {
        self.path.is_file()
    }
}

/// Parse CSV text into raw bars.
///
/// `fallback_id` is used for rows without a code cell. When `range` is given,
/// rows outside the inclusive range are skipped.
pub fn read_csv<R: Read>(
    reader: R,
    fallback_id: Option<&str>,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<Vec<RawBar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut index: HashMap<Column, usize> = HashMap::new();
    for (i, header) in rdr.headers()?.iter().enumerate() {
        if let Some(column) = canonical_column(header) {
            // first matching header wins
            index.entry(column).or_insert(i);
        }
    }
    let missing: Vec<String> = Column::REQUIRED
        .iter()
        .filter(|c| !index.contains_key(*c))
        .map(|c| c.as_str().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DataError::MissingColumns(missing));
    }

    let cell = |record: &csv::StringRecord, column: Column| -> Option<String> {
        index
            .get(&column)
            .and_then(|&i| record.get(i))
            .map(str::to_string)
    };
    let number = |record: &csv::StringRecord, column: Column| -> f64 {
        cell(record, column).map_or(f64::NAN, |s| parse_number(&s))
    };

    let mut bars = Vec::new();
    let mut bad_dates = 0usize;
    for record in rdr.records() {
        let record = record?;
        let Some(date) = cell(&record, Column::Date).and_then(|s| parse_date(&s)) else {
            bad_dates += 1;
            continue;
        };
        if let Some((start, end)) = range {
            if date < start || date > end {
                continue;
            }
        }
        let instrument_id = cell(&record, Column::Code)
            .filter(|s| !s.is_empty())
            .or_else(|| fallback_id.map(str::to_string));
        bars.push(RawBar {
            date,
            instrument_id,
            open: number(&record, Column::Open),
            high: number(&record, Column::High),
            low: number(&record, Column::Low),
            close: number(&record, Column::Close),
            volume: number(&record, Column::Volume),
        });
    }

    if bad_dates > 0 {
        tracing::warn!(rows = bad_dates, "dropped CSV rows with unparseable dates");
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn reads_aliased_headers() {
        let text = "Date,open_price,High,LOW,close_price,trading_volume,Turnover\n\
                    2024-01-04,100,110,95,105,1000,1\n\
                    2024-01-05,105,111,101,110,1200,1\n";
        let bars = read_csv(text.as_bytes(), Some("7203"), None).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(1, 4));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[1].close, 110.0);
        assert_eq!(bars[1].volume, 1200.0);
        assert_eq!(bars[0].instrument_id.as_deref(), Some("7203"));
    }

    #[test]
    fn code_column_overrides_fallback() {
        let text = "date,code,open,high,low,close,volume\n\
                    2024-01-04,6758,1,2,1,2,10\n\
                    2024-01-05,,1,2,1,2,10\n";
        let bars = read_csv(text.as_bytes(), Some("7203"), None).unwrap();
        assert_eq!(bars[0].instrument_id.as_deref(), Some("6758"));
        assert_eq!(bars[1].instrument_id.as_deref(), Some("7203"));
    }

    #[test]
    fn missing_columns_are_reported() {
        let text = "date,open,close\n2024-01-04,1,2\n";
        match read_csv(text.as_bytes(), None, None) {
            Err(DataError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["high", "low", "volume"]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn bad_dates_dropped_and_bad_numbers_become_nan() {
        let text = "date,open,high,low,close,volume\n\
                    not-a-date,1,2,1,2,10\n\
                    2024-01-05,,2,1,abc,10\n";
        let bars = read_csv(text.as_bytes(), None, None).unwrap();
        assert_eq!(bars.len(), 1);
        assert!(bars[0].open.is_nan());
        assert!(bars[0].close.is_nan());
        assert_eq!(bars[0].high, 2.0);
    }

    #[test]
    fn range_filter_is_inclusive() {
        let text = "date,open,high,low,close,volume\n\
                    2024-01-03,1,1,1,1,1\n\
                    2024-01-04,1,1,1,1,1\n\
                    2024-01-05,1,1,1,1,1\n\
                    2024-01-08,1,1,1,1,1\n";
        let bars = read_csv(text.as_bytes(), None, Some((d(1, 4), d(1, 5)))).unwrap();
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![d(1, 4), d(1, 5)]);
    }

    #[test]
    fn provider_reports_no_data_outside_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("7203.csv");
        std::fs::write(&path, "date,open,high,low,close,volume\n2024-01-04,1,1,1,1,1\n").unwrap();
        let provider = CsvProvider::new(&path);
        assert!(provider.is_available());

        let fetched = provider.fetch("7203", d(1, 1), d(1, 31)).unwrap();
        assert_eq!(fetched.bars.len(), 1);
        assert_eq!(fetched.source, DataSource::CsvImport);

        assert!(matches!(
            provider.fetch("7203", d(2, 1), d(2, 28)),
            Err(DataError::NoData { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let provider = CsvProvider::new("/nonexistent/surgelab/7203.csv");
        assert!(!provider.is_available());
        assert!(matches!(
            provider.fetch("7203", d(1, 1), d(1, 31)),
            Err(DataError::Io(_))
        ));
    }
}
