//! Data-quality report for a normalized series.
//!
//! Nothing here rejects data. The report lists what looks wrong so the CLI
//! can print it and the caller can decide whether to trust the labels.

use crate::domain::Series;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingValues { column: &'static str },
    HighBelowBody,
    LowAboveBody,
    NegativePrice { column: &'static str },
    ZeroVolume,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::MissingValues { column } => write!(f, "missing {column}"),
            IssueKind::HighBelowBody => write!(f, "high below max(open, close, low)"),
            IssueKind::LowAboveBody => write!(f, "low above min(open, close, high)"),
            IssueKind::NegativePrice { column } => write!(f, "negative {column}"),
            IssueKind::ZeroVolume => write!(f, "zero volume"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub count: usize,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub instrument_id: String,
    pub rows: usize,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// True when no error-severity issue was found.
    pub fn is_valid(&self) -> bool {
        self.issues.iter().all(|i| i.severity < Severity::Error)
    }

    pub fn count(&self, kind: &IssueKind) -> usize {
        self.issues
            .iter()
            .filter(|i| &i.kind == kind)
            .map(|i| i.count)
            .sum()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} rows", self.instrument_id, self.rows)?;
        if self.issues.is_empty() {
            return write!(f, "  no issues");
        }
        for issue in &self.issues {
            writeln!(f, "  [{:?}] {}: {}", issue.severity, issue.kind, issue.count)?;
        }
        Ok(())
    }
}

/// Scan a series for missing values, inconsistent OHLC rows, negative prices
/// and zero-volume days.
pub fn validate(series: &Series) -> ValidationReport {
    let bars = series.bars();
    let mut issues = Vec::new();
    let mut push = |kind: IssueKind, count: usize, severity: Severity| {
        if count > 0 {
            issues.push(Issue {
                kind,
                count,
                severity,
            });
        }
    };

    let columns: [(&'static str, fn(&crate::domain::Bar) -> f64); 4] = [
        ("open", |b| b.open),
        ("high", |b| b.high),
        ("low", |b| b.low),
        ("close", |b| b.close),
    ];

    for (column, get) in columns {
        let missing = bars.iter().filter(|b| get(b).is_nan()).count();
        push(IssueKind::MissingValues { column }, missing, Severity::Warning);
    }

    // NaN comparisons are false, so rows with gaps never count here
    let high_below = bars
        .iter()
        .filter(|b| b.high < b.open || b.high < b.close || b.high < b.low)
        .count();
    push(IssueKind::HighBelowBody, high_below, Severity::Error);

    let low_above = bars
        .iter()
        .filter(|b| b.low > b.open || b.low > b.close || b.low > b.high)
        .count();
    push(IssueKind::LowAboveBody, low_above, Severity::Error);

    for (column, get) in columns {
        let negative = bars.iter().filter(|b| get(b) < 0.0).count();
        push(IssueKind::NegativePrice { column }, negative, Severity::Error);
    }

    let zero_volume = bars.iter().filter(|b| b.volume == 0.0).count();
    push(IssueKind::ZeroVolume, zero_volume, Severity::Warning);

    ValidationReport {
        instrument_id: series.instrument_id().to_string(),
        rows: bars.len(),
        issues,
    }
}
