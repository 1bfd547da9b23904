//! Labeled-series export: CSV, JSON, and Parquet.
//!
//! Column order is fixed: `date, code, open, high, low, close, volume`, then
//! one `{name}_label` column per spec in configuration order. Labels are
//! written as 0/1; an unknown label is an empty CSV field and null in JSON
//! and Parquet. Missing prices follow the same rule.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use polars::prelude::*;
use serde_json::{Map, Value};
use thiserror::Error;

use surgelab_core::labeling::LabeledSeries;

/// Fixed leading columns.
pub const BASE_COLUMNS: [&str; 7] = ["date", "code", "open", "high", "low", "close", "volume"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parquet error: {0}")]
    Parquet(String),
    #[error("unknown export format '{0}' (expected csv, json or parquet)")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Parquet => "parquet",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "parquet" | "pq" => Ok(ExportFormat::Parquet),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Full header row: base columns then one label column per spec.
pub fn header(labeled: &LabeledSeries) -> Vec<String> {
    BASE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(labeled.specs().iter().map(|s| s.column_name()))
        .collect()
}

fn csv_number(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

// ─── CSV ────────────────────────────────────────────────────────────

pub fn export_csv(labeled: &LabeledSeries) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(header(labeled))?;

    for row in labeled.rows() {
        let bar = &row.bar;
        let mut record = vec![
            bar.date.format("%Y-%m-%d").to_string(),
            bar.instrument_id.clone(),
            csv_number(bar.open),
            csv_number(bar.high),
            csv_number(bar.low),
            csv_number(bar.close),
            csv_number(bar.volume),
        ];
        record.extend(
            row.labels
                .iter()
                .map(|l| l.as_int().map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    String::from_utf8(data)
        .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

// ─── JSON ───────────────────────────────────────────────────────────

/// One object per row, keys in column order.
pub fn export_json(labeled: &LabeledSeries) -> Result<String, ExportError> {
    let names = header(labeled);
    let records: Vec<Value> = labeled
        .rows()
        .iter()
        .map(|row| {
            let bar = &row.bar;
            let mut values = vec![
                Value::from(bar.date.format("%Y-%m-%d").to_string()),
                Value::from(bar.instrument_id.clone()),
                Value::from(bar.open),
                Value::from(bar.high),
                Value::from(bar.low),
                Value::from(bar.close),
                Value::from(bar.volume),
            ];
            values.extend(row.labels.iter().map(|l| Value::from(l.as_int())));
            let object: Map<String, Value> = names.iter().cloned().zip(values).collect();
            Value::Object(object)
        })
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

// ─── Parquet ────────────────────────────────────────────────────────

pub fn to_dataframe(labeled: &LabeledSeries) -> Result<DataFrame, ExportError> {
    let epoch = chrono::NaiveDate::default();
    let rows = labeled.rows();
    let dates: Vec<i32> = rows
        .iter()
        .map(|r| (r.bar.date - epoch).num_days() as i32)
        .collect();
    let codes: Vec<&str> = rows.iter().map(|r| r.bar.instrument_id.as_str()).collect();
    let price = |get: fn(&surgelab_core::Bar) -> f64| -> Vec<Option<f64>> {
        rows.iter()
            .map(|r| Some(get(&r.bar)).filter(|v| !v.is_nan()))
            .collect()
    };

    let mut columns = vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| ExportError::Parquet(format!("date cast: {e}")))?,
        Column::new("code".into(), codes),
        Column::new("open".into(), price(|b| b.open)),
        Column::new("high".into(), price(|b| b.high)),
        Column::new("low".into(), price(|b| b.low)),
        Column::new("close".into(), price(|b| b.close)),
        Column::new("volume".into(), price(|b| b.volume)),
    ];
    for (idx, spec) in labeled.specs().iter().enumerate() {
        let values: Vec<Option<i32>> = rows
            .iter()
            .map(|r| r.labels[idx].as_int().map(i32::from))
            .collect();
        columns.push(Column::new(spec.column_name().into(), values));
    }

    DataFrame::new(columns).map_err(|e| ExportError::Parquet(format!("dataframe creation: {e}")))
}

pub fn write_parquet(labeled: &LabeledSeries, path: &Path) -> Result<(), ExportError> {
    let mut df = to_dataframe(labeled)?;
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| ExportError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

/// Write `labeled` to `path` in `format`.
pub fn export_to_file(
    labeled: &LabeledSeries,
    format: ExportFormat,
    path: &Path,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    match format {
        ExportFormat::Csv => fs::write(path, export_csv(labeled)?)?,
        ExportFormat::Json => fs::write(path, export_json(labeled)?)?,
        ExportFormat::Parquet => write_parquet(labeled, path)?,
    }
    tracing::info!(path = %path.display(), format = %format, rows = labeled.len(), "exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use surgelab_core::labeling::{LabelConfig, LabelEngine, TailPolicy};
    use surgelab_core::{Bar, Series};

    fn sample() -> LabeledSeries {
        let base = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let rows = [(100.0, 100.0), (100.0, 130.0), (f64::NAN, 100.0)];
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(close, high))| Bar {
                date: base + chrono::Duration::days(i as i64),
                instrument_id: "7203".into(),
                open: 100.0,
                high,
                low: 99.0,
                close,
                volume: 1_000.0,
            })
            .collect();
        let series = Series::new(bars).unwrap();
        LabelEngine::new(LabelConfig::default().with_tail_policy(TailPolicy::Unknown))
            .unwrap()
            .label(&series)
    }

    #[test]
    fn csv_columns_and_values() {
        let text = export_csv(&sample()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "date,code,open,high,low,close,volume,strong_label,buy_label"
        );
        assert_eq!(lines[1], "2024-01-04,7203,100,100,99,100,1000,1,1");
        // truncated window, no hit: unknown under this policy
        assert_eq!(lines[2], "2024-01-05,7203,100,130,99,100,1000,,");
        // missing close is always negative, and the price cell is empty
        assert_eq!(lines[3], "2024-01-06,7203,100,100,99,,1000,0,0");
    }

    #[test]
    fn json_uses_nulls() {
        let text = export_json(&sample()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["strong_label"], Value::from(1));
        assert_eq!(rows[0]["code"], Value::from("7203"));
        assert!(rows[1]["buy_label"].is_null());
        assert!(rows[2]["close"].is_null());
        assert_eq!(rows[2]["strong_label"], Value::from(0));
    }

    #[test]
    fn json_keys_follow_column_order() {
        let labeled = sample();
        let text = export_json(&labeled).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        for row in value.as_array().unwrap() {
            let keys: Vec<String> = row.as_object().unwrap().keys().cloned().collect();
            assert_eq!(keys, header(&labeled));
        }
        let first_object = &text[..text.find('}').unwrap()];
        let pos = |key: &str| first_object.find(&format!("\"{key}\"")).unwrap();
        assert!(pos("date") < pos("code"));
        assert!(pos("volume") < pos("strong_label"));
        assert!(pos("strong_label") < pos("buy_label"));
    }

    #[test]
    fn parquet_roundtrip_keeps_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/7203.parquet");
        export_to_file(&sample(), ExportFormat::Parquet, &path).unwrap();

        let df = ParquetReader::new(fs::File::open(&path).unwrap())
            .finish()
            .unwrap();
        assert_eq!(df.height(), 3);
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, header(&sample()));
        let strong = df.column("strong_label").unwrap().i32().unwrap();
        assert_eq!(strong.get(0), Some(1));
        assert_eq!(strong.get(1), None);
        assert_eq!(strong.get(2), Some(0));
    }

    #[test]
    fn format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("parquet".parse::<ExportFormat>().unwrap(), ExportFormat::Parquet);
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(
            ExportFormat::from_path(Path::new("out/labels.json")),
            Some(ExportFormat::Json)
        );
        assert_eq!(ExportFormat::from_path(Path::new("labels")), None);
    }
}
