//! Per-column label counts for reporting.

use super::Label;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelStats {
    pub name: String,
    pub positive: usize,
    pub negative: usize,
    pub unknown: usize,
}

impl LabelStats {
    pub fn from_labels(name: &str, labels: impl IntoIterator<Item = Label>) -> Self {
        let mut stats = Self {
            name: name.to_string(),
            positive: 0,
            negative: 0,
            unknown: 0,
        };
        for label in labels {
            match label {
                Label::Positive => stats.positive += 1,
                Label::Negative => stats.negative += 1,
                Label::Unknown => stats.unknown += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.positive + self.negative + self.unknown
    }

    /// Fraction of all rows (unknown included) labeled positive.
    pub fn positive_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.positive as f64 / total as f64,
        }
    }
}

impl fmt::Display for LabelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} / {} ({:.2}%)",
            self.name,
            self.positive,
            self.total(),
            self.positive_rate() * 100.0
        )?;
        if self.unknown > 0 {
            write!(f, ", {} unknown", self.unknown)?;
        }
        Ok(())
    }
}
