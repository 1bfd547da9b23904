//! End-to-end runner tests: CSV directory → pipeline → export.

use chrono::NaiveDate;
use proptest::prelude::*;
use std::path::{Path, PathBuf};

use surgelab_core::data::{DataError, DataSource, ParquetCache};
use surgelab_runner::{
    export_csv, export_to_file, run_batch, run_pipeline, CachedProvider, DataSourceSpec,
    ExportFormat, LabelOverrides, PipelineConfig, PipelineError,
};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("surgelab-core/tests/fixtures/7203_messy.csv")
}

/// Temp directory holding `7203.csv`.
fn csv_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(fixture(), dir.path().join("7203.csv")).unwrap();
    dir
}

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

fn label_column(csv_text: &str, column: &str) -> Vec<String> {
    let mut rdr = csv::Reader::from_reader(csv_text.as_bytes());
    let idx = rdr
        .headers()
        .unwrap()
        .iter()
        .position(|h| h == column)
        .unwrap();
    rdr.records()
        .map(|r| r.unwrap().get(idx).unwrap().to_string())
        .collect()
}

#[test]
fn csv_dir_to_labeled_csv() {
    let dir = csv_dir();
    let spec = DataSourceSpec::CsvDir(dir.path().to_path_buf());
    let provider = spec.provider_for("7203").unwrap();

    let result = run_pipeline(
        provider.as_ref(),
        "7203",
        d(1, 1),
        d(12, 31),
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(result.source, DataSource::CsvImport);
    assert_eq!(result.raw_rows, 8);
    assert_eq!(result.labeled.len(), 7);

    let text = export_csv(&result.labeled).unwrap();
    let expected: Vec<String> = ["1", "1", "1", "1", "0", "0", "0"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(label_column(&text, "strong_label"), expected);
    assert_eq!(label_column(&text, "buy_label"), expected);
    assert_eq!(
        label_column(&text, "date").first().map(String::as_str),
        Some("2024-01-04")
    );
}

#[test]
fn overrides_change_labels() {
    let dir = csv_dir();
    let provider = DataSourceSpec::CsvDir(dir.path().to_path_buf())
        .provider_for("7203")
        .unwrap();
    let mut config = PipelineConfig::default();
    config.apply(&LabelOverrides {
        strong_threshold: Some(0.50),
        ..LabelOverrides::default()
    });

    let result = run_pipeline(provider.as_ref(), "7203", d(1, 1), d(12, 31), &config).unwrap();
    let strong = result.labeled.column("strong").unwrap();
    assert!(strong.iter().all(|l| !l.is_positive()));
    // buy is untouched by the override
    let buy = result.labeled.column("buy").unwrap();
    assert_eq!(buy.iter().filter(|l| l.is_positive()).count(), 4);
    assert_ne!(result.config_hash, PipelineConfig::default().config_hash());
}

#[test]
fn batch_over_csv_dir_reports_missing_file() {
    let dir = csv_dir();
    let spec = DataSourceSpec::CsvDir(dir.path().to_path_buf());
    let ids = vec!["7203".to_string(), "1111".to_string()];

    let items = run_batch(&ids, d(1, 1), d(12, 31), &PipelineConfig::default(), |id| {
        spec.provider_for(id)
    });
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].instrument_id, "7203");
    assert!(items[0].result.is_ok());
    assert!(matches!(
        items[1].result,
        Err(PipelineError::Data(DataError::Io(_)))
    ));
}

#[test]
fn cached_pipeline_matches_direct_run() {
    let cache_dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();
    let direct = run_pipeline(
        DataSourceSpec::Synthetic.provider_for("9984").unwrap().as_ref(),
        "9984",
        d(1, 1),
        d(6, 28),
        &config,
    )
    .unwrap();

    let cached = CachedProvider::new(
        surgelab_core::data::SyntheticProvider::new(),
        ParquetCache::new(cache_dir.path()),
    );
    let first = run_pipeline(&cached, "9984", d(1, 1), d(6, 28), &config).unwrap();
    let second = run_pipeline(&cached, "9984", d(1, 1), d(6, 28), &config).unwrap();

    assert_eq!(second.source, DataSource::Cache);
    assert_eq!(direct.dataset_hash, first.dataset_hash);
    assert_eq!(first.dataset_hash, second.dataset_hash);
    assert_eq!(first.labeled, second.labeled);
}

fn export_all(result_dir: &Path, labeled: &surgelab_core::LabeledSeries) {
    for format in [ExportFormat::Csv, ExportFormat::Json, ExportFormat::Parquet] {
        let path = result_dir.join(format!("7203.{}", format.extension()));
        export_to_file(labeled, format, &path).unwrap();
        assert!(path.is_file(), "{format} export missing");
    }
}

#[test]
fn every_format_writes_a_file() {
    let dir = csv_dir();
    let provider = DataSourceSpec::CsvDir(dir.path().to_path_buf())
        .provider_for("7203")
        .unwrap();
    let result = run_pipeline(
        provider.as_ref(),
        "7203",
        d(1, 1),
        d(12, 31),
        &PipelineConfig::default(),
    )
    .unwrap();
    export_all(&dir.path().join("out"), &result.labeled);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Exported CSV has one data row per labeled bar and one column per label.
    #[test]
    fn csv_export_shape(months in 1u32..12, extra in 0usize..3) {
        let mut config = PipelineConfig::default();
        for i in 0..extra {
            config.labels.extra.push(surgelab_core::LabelSpec::new(format!("x{i}"), 0.05, 3));
        }
        let provider = DataSourceSpec::Synthetic.provider_for("4063").unwrap();
        let result = run_pipeline(provider.as_ref(), "4063", d(1, 1), d(months, 28), &config)
            .unwrap();
        let text = export_csv(&result.labeled).unwrap();

        let mut rdr = csv::Reader::from_reader(text.as_bytes());
        let width = rdr.headers().unwrap().len();
        prop_assert_eq!(width, 7 + 2 + extra);
        let rows = rdr.records().count();
        prop_assert_eq!(rows, result.labeled.len());
    }
}
