//! SurgeLab Runner: configuration, provider resolution, pipeline, export.
//!
//! This crate builds on `surgelab-core` to provide:
//! - TOML pipeline configuration with CLI overrides
//! - Provider resolution with an optional read-through Parquet cache
//! - Single-instrument and parallel batch pipelines
//! - CSV, JSON and Parquet export of labeled series

pub mod config;
pub mod export;
pub mod loader;
pub mod pipeline;

pub use config::{ConfigError, LabelOverrides, LabelsSection, PipelineConfig};
pub use export::{export_csv, export_json, export_to_file, ExportError, ExportFormat};
pub use loader::{CachedProvider, DataSourceSpec};
pub use pipeline::{
    dataset_hash, run_batch, run_pipeline, BatchItem, PipelineError, PipelineResult,
};
