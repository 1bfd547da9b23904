//! Data acquisition and cleaning: providers, the normalizer, the validation
//! report, and the Parquet cache.

pub mod cache;
pub mod columns;
pub mod csv_source;
pub mod jquants;
pub mod normalize;
pub mod provider;
pub mod synthetic;
pub mod validate;

pub use cache::{CacheMeta, CoverageResult, CoveredRange, ParquetCache};
pub use csv_source::{read_csv, CsvProvider};
pub use jquants::JQuantsProvider;
pub use normalize::{FillMethod, NormalizeError, NormalizeOptions, Normalizer};
pub use provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
pub use synthetic::SyntheticProvider;
pub use validate::{validate, Issue, IssueKind, Severity, ValidationReport};
