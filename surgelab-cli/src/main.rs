//! SurgeLab CLI: forward-window surge labels for daily stock bars.
//!
//! Commands:
//! - `label` labels one instrument and writes CSV, JSON or Parquet
//! - `batch` labels many instruments in parallel into an output directory
//! - `validate` prints the data quality report for one instrument

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{prelude::*, EnvFilter};

use surgelab_core::data::{
    validate, DataError, DataProvider, Normalizer, ParquetCache, RawBar, ValidationReport,
};
use surgelab_core::labeling::TailPolicy;
use surgelab_runner::{
    export_to_file, run_batch, run_pipeline, BatchItem, CachedProvider, DataSourceSpec,
    ExportFormat, LabelOverrides, PipelineConfig, PipelineResult,
};

#[derive(Parser)]
#[command(
    name = "surgelab",
    about = "SurgeLab: forward-window surge labels for daily stock data"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Label one instrument.
    Label {
        /// Instrument code (e.g., 7203).
        code: String,

        /// Start date (YYYY-MM-DD).
        start: String,

        /// End date (YYYY-MM-DD).
        end: String,

        /// Read bars from this CSV file instead of the J-Quants API.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Path to a TOML pipeline config.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        labels: LabelArgs,

        /// Output file. Without it only the summary is printed.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format. Defaults to the output file extension, then csv.
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Use deterministic synthetic data.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Read-through Parquet cache directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Label many instruments in parallel.
    Batch {
        /// Instrument codes.
        #[arg(required = true)]
        codes: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Directory of `{code}.csv` files.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Output directory for labeled files and summary.json.
        #[arg(long, default_value = "labels")]
        output_dir: PathBuf,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Path to a TOML pipeline config.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        labels: LabelArgs,

        /// Use deterministic synthetic data.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Read-through Parquet cache directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Print the data quality report for one instrument.
    Validate {
        /// Instrument code.
        code: String,

        /// Start date (YYYY-MM-DD).
        start: String,

        /// End date (YYYY-MM-DD).
        end: String,

        /// Read bars from this CSV file instead of the J-Quants API.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Path to a TOML pipeline config; its `[normalize]` section applies.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use deterministic synthetic data.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
}

/// Label overrides shared by `label` and `batch`.
#[derive(clap::Args)]
struct LabelArgs {
    /// Strong label gain threshold (fraction, e.g. 0.25).
    #[arg(long)]
    strong_threshold: Option<f64>,

    /// Buy label gain threshold (fraction, e.g. 0.18).
    #[arg(long)]
    buy_threshold: Option<f64>,

    /// Strong label lookahead in trading days.
    #[arg(long)]
    strong_window: Option<usize>,

    /// Buy label lookahead in trading days.
    #[arg(long)]
    buy_window: Option<usize>,

    /// How to label days whose window runs past the data.
    #[arg(long, value_enum)]
    tail_policy: Option<TailPolicyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TailPolicyArg {
    Negative,
    Unknown,
}

impl From<TailPolicyArg> for TailPolicy {
    fn from(arg: TailPolicyArg) -> Self {
        match arg {
            TailPolicyArg::Negative => TailPolicy::Negative,
            TailPolicyArg::Unknown => TailPolicy::Unknown,
        }
    }
}

impl LabelArgs {
    fn overrides(&self) -> LabelOverrides {
        LabelOverrides {
            strong_threshold: self.strong_threshold,
            buy_threshold: self.buy_threshold,
            strong_window: self.strong_window,
            buy_window: self.buy_window,
            tail_policy: self.tail_policy.map(TailPolicy::from),
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Label {
            code,
            start,
            end,
            csv,
            config,
            labels,
            output,
            format,
            synthetic,
            cache_dir,
        } => {
            let source = source_spec(csv.map(DataSourceSpec::CsvFile), synthetic);
            let config = load_config(config.as_deref(), &labels)?;
            let opts = LabelOptions {
                start: parse_date(&start)?,
                end: parse_date(&end)?,
                output,
                format,
                cache_dir,
            };
            run_label_cmd(&code, &source, &config, &opts)
        }
        Commands::Batch {
            codes,
            start,
            end,
            csv_dir,
            output_dir,
            format,
            config,
            labels,
            synthetic,
            cache_dir,
        } => {
            let source = source_spec(csv_dir.map(DataSourceSpec::CsvDir), synthetic);
            let config = load_config(config.as_deref(), &labels)?;
            let start = parse_date(&start)?;
            let end = parse_date(&end)?;
            run_batch_cmd(
                &codes,
                start,
                end,
                &source,
                &config,
                &output_dir,
                format,
                cache_dir.as_deref(),
            )
        }
        Commands::Validate {
            code,
            start,
            end,
            csv,
            config,
            synthetic,
        } => {
            let source = source_spec(csv.map(DataSourceSpec::CsvFile), synthetic);
            let config = match config {
                Some(path) => PipelineConfig::from_file(&path)?,
                None => PipelineConfig::default(),
            };
            run_validate_cmd(
                &code,
                parse_date(&start)?,
                parse_date(&end)?,
                &source,
                &config,
            )
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

/// A CSV source wins over `--synthetic`; with neither, J-Quants.
fn source_spec(csv: Option<DataSourceSpec>, synthetic: bool) -> DataSourceSpec {
    match csv {
        Some(spec) => spec,
        None if synthetic => DataSourceSpec::Synthetic,
        None => DataSourceSpec::JQuants,
    }
}

fn load_config(path: Option<&Path>, labels: &LabelArgs) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    config.apply(&labels.overrides());
    config.validate()?;
    tracing::debug!(config_hash = %config.config_hash(), ?config, "effective config");
    Ok(config)
}

fn build_provider(
    source: &DataSourceSpec,
    code: &str,
    cache_dir: Option<&Path>,
) -> Result<Box<dyn DataProvider>, DataError> {
    let provider = source.provider_for(code)?;
    Ok(match cache_dir {
        Some(dir) => Box::new(CachedProvider::new(provider, ParquetCache::new(dir))),
        None => provider,
    })
}

struct LabelOptions {
    start: NaiveDate,
    end: NaiveDate,
    output: Option<PathBuf>,
    format: Option<ExportFormat>,
    cache_dir: Option<PathBuf>,
}

fn run_label_cmd(
    code: &str,
    source: &DataSourceSpec,
    config: &PipelineConfig,
    opts: &LabelOptions,
) -> Result<()> {
    let provider = build_provider(source, code, opts.cache_dir.as_deref())?;
    let result = run_pipeline(provider.as_ref(), code, opts.start, opts.end, config)?;
    print_summary(&result);

    if let Some(path) = &opts.output {
        let format = opts
            .format
            .or_else(|| ExportFormat::from_path(path))
            .unwrap_or_default();
        export_to_file(&result.labeled, format, path)?;
        println!("Labels saved to: {}", path.display());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_batch_cmd(
    codes: &[String],
    start: NaiveDate,
    end: NaiveDate,
    source: &DataSourceSpec,
    config: &PipelineConfig,
    output_dir: &Path,
    format: ExportFormat,
    cache_dir: Option<&Path>,
) -> Result<()> {
    let items = run_batch(codes, start, end, config, |code| {
        build_provider(source, code, cache_dir)
    });

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let (summary, failures) = export_batch(&items, output_dir, format);

    let summary_path = output_dir.join("summary.json");
    let body = serde_json::json!({
        "start": start,
        "end": end,
        "config_hash": config.config_hash(),
        "instruments": summary,
    });
    std::fs::write(&summary_path, serde_json::to_string_pretty(&body)?)?;
    println!();
    println!("Summary saved to: {}", summary_path.display());

    if failures > 0 {
        bail!("{failures} of {} instrument(s) failed", items.len());
    }
    Ok(())
}

/// Export every successful item and build its summary entry.
///
/// A pipeline or export failure is recorded in that item's entry and counted;
/// it never stops the remaining items. Returns the entries and the failure
/// count.
fn export_batch(
    items: &[BatchItem],
    output_dir: &Path,
    format: ExportFormat,
) -> (Vec<serde_json::Value>, usize) {
    let mut summary = Vec::with_capacity(items.len());
    let mut failures = 0usize;
    println!(
        "{:<8} {:>6} {:>8} {:>8}  {}",
        "Code", "Bars", "Strong", "Buy", "Status"
    );
    println!("{}", "-".repeat(50));
    for item in items {
        match &item.result {
            Ok(result) => {
                let path = output_dir.join(format!("{}.{}", item.instrument_id, format.extension()));
                if let Err(err) = export_to_file(&result.labeled, format, &path) {
                    failures += 1;
                    println!(
                        "{:<8} {:>6} {:>8} {:>8}  export failed: {err}",
                        item.instrument_id,
                        result.labeled.len(),
                        "-",
                        "-"
                    );
                    summary.push(serde_json::json!({
                        "code": item.instrument_id,
                        "status": "error",
                        "bars": result.labeled.len(),
                        "error": format!("export failed: {err}"),
                    }));
                    continue;
                }
                let rate = |i: usize| result.stats.get(i).map_or(0.0, |s| s.positive_rate());
                println!(
                    "{:<8} {:>6} {:>7.1}% {:>7.1}%  ok",
                    item.instrument_id,
                    result.labeled.len(),
                    rate(0) * 100.0,
                    rate(1) * 100.0
                );
                summary.push(serde_json::json!({
                    "code": item.instrument_id,
                    "status": "ok",
                    "source": result.source,
                    "bars": result.labeled.len(),
                    "stats": result.stats,
                    "dataset_hash": result.dataset_hash,
                    "output": path.display().to_string(),
                }));
            }
            Err(err) => {
                failures += 1;
                println!("{:<8} {:>6} {:>8} {:>8}  {err}", item.instrument_id, "-", "-", "-");
                summary.push(serde_json::json!({
                    "code": item.instrument_id,
                    "status": "error",
                    "error": err.to_string(),
                }));
            }
        }
    }
    (summary, failures)
}

fn run_validate_cmd(
    code: &str,
    start: NaiveDate,
    end: NaiveDate,
    source: &DataSourceSpec,
    config: &PipelineConfig,
) -> Result<()> {
    if start > end {
        bail!("start date {start} is after end date {end}");
    }
    let provider = source.provider_for(code)?;
    let fetched = provider.fetch(code, start, end)?;
    let raw = fetched.bars.len();
    let report = validation_report(fetched.bars, code, config)?;

    println!("Source: {} ({raw} raw rows)", provider.name());
    println!("{report}");
    if !report.is_valid() {
        bail!("{code}: data failed validation");
    }
    println!("OK");
    Ok(())
}

/// Normalize with the configured options, as `label` would, then validate.
fn validation_report(
    bars: Vec<RawBar>,
    code: &str,
    config: &PipelineConfig,
) -> Result<ValidationReport> {
    let series = Normalizer::new(config.normalize).normalize(bars, Some(code))?;
    Ok(validate(&series))
}

fn print_summary(result: &PipelineResult) {
    println!();
    println!("=== Label Result ===");
    println!("Code:           {}", result.instrument_id);
    println!("Period:         {} to {}", result.start, result.end);
    println!(
        "Bars:           {} ({} raw rows)",
        result.labeled.len(),
        result.raw_rows
    );
    println!("Source:         {:?}", result.source);
    println!("Dataset hash:   {}", &result.dataset_hash[..16]);
    println!();
    println!("--- Labels ---");
    for stats in &result.stats {
        println!("{stats}");
    }
    for issue in &result.report.issues {
        println!("WARNING: {}: {}", issue.kind, issue.count);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn label_flags_parse_into_overrides() {
        let cli = Cli::try_parse_from([
            "surgelab",
            "label",
            "7203",
            "2024-01-01",
            "2024-12-31",
            "--strong-threshold",
            "0.3",
            "--tail-policy",
            "unknown",
            "--format",
            "parquet",
        ])
        .unwrap();
        let Commands::Label { labels, format, .. } = cli.command else {
            panic!("expected label command");
        };
        let overrides = labels.overrides();
        assert_eq!(overrides.strong_threshold, Some(0.3));
        assert_eq!(overrides.tail_policy, Some(TailPolicy::Unknown));
        assert_eq!(overrides.buy_window, None);
        assert_eq!(format, Some(ExportFormat::Parquet));
    }

    #[test]
    fn csv_source_wins_over_synthetic() {
        let csv = DataSourceSpec::CsvFile(PathBuf::from("a.csv"));
        assert_eq!(source_spec(Some(csv.clone()), true), csv);
        assert_eq!(source_spec(None, true), DataSourceSpec::Synthetic);
        assert_eq!(source_spec(None, false), DataSourceSpec::JQuants);
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn export_failure_is_recorded_per_item() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where 7203's output file should go makes its export fail
        std::fs::create_dir_all(dir.path().join("7203.csv")).unwrap();

        let codes = vec!["7203".to_string(), "6758".to_string()];
        let items = run_batch(&codes, d(1, 1), d(3, 29), &PipelineConfig::default(), |code| {
            DataSourceSpec::Synthetic.provider_for(code)
        });
        let (summary, failures) = export_batch(&items, dir.path(), ExportFormat::Csv);

        assert_eq!(failures, 1);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0]["status"], "error");
        assert!(summary[0]["error"]
            .as_str()
            .unwrap()
            .starts_with("export failed"));
        assert_eq!(summary[1]["status"], "ok");
        assert!(dir.path().join("6758.csv").is_file());
    }

    #[test]
    fn validation_uses_configured_normalize_options() {
        let mut bars =
            surgelab_core::data::synthetic::generate_bars("7203", d(1, 1), d(1, 31), 1_000.0);
        bars[5].close = f64::NAN;
        let missing_close = surgelab_core::data::IssueKind::MissingValues { column: "close" };

        let filled = validation_report(bars.clone(), "7203", &PipelineConfig::default()).unwrap();
        assert_eq!(filled.count(&missing_close), 0);

        let config = PipelineConfig::from_toml("[normalize]\nfill = \"none\"\n").unwrap();
        let raw = validation_report(bars, "7203", &config).unwrap();
        assert_eq!(raw.count(&missing_close), 1);
    }

    #[test]
    fn validate_accepts_config_flag() {
        let cli = Cli::try_parse_from([
            "surgelab",
            "validate",
            "7203",
            "2024-01-01",
            "2024-12-31",
            "--config",
            "surgelab.toml",
        ])
        .unwrap();
        let Commands::Validate { config, .. } = cli.command else {
            panic!("expected validate command");
        };
        assert_eq!(config, Some(PathBuf::from("surgelab.toml")));
    }

    #[test]
    fn bad_dates_are_reported() {
        assert!(parse_date("2024-13-01").is_err());
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }
}
