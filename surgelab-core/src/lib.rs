//! SurgeLab Core: domain types, data providers, normalizer, label engine.
//!
//! This crate holds everything between a data source and a labeled series:
//! - Domain types (bars and the checked series contract)
//! - Providers (CSV, J-Quants, synthetic) and the Parquet raw-bar cache
//! - The normalizer and the data-quality report
//! - Forward-window gain labels computed with a monotonic-deque sliding max
//!
//! Data flows one way: provider, then normalizer, then label engine. Only
//! providers and the cache perform I/O.

pub mod data;
pub mod domain;
pub mod labeling;

pub use domain::{Bar, Series, SeriesError};
pub use labeling::{
    label, Label, LabelConfig, LabelEngine, LabelError, LabelSpec, LabeledBar, LabeledSeries,
    TailPolicy,
};
