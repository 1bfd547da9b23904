//! TOML pipeline configuration.
//!
//! ```toml
//! [labels]
//! strong_threshold = 0.25
//! buy_threshold = 0.18
//! strong_window = 10
//! buy_window = 15
//! tail_policy = "negative"
//!
//! [[labels.extra]]
//! name = "pop"
//! threshold = 0.10
//! window = 5
//!
//! [normalize]
//! fill = "both"
//! drop_duplicates = true
//! ```
//!
//! Every key is optional. CLI flags are applied on top through
//! [`LabelOverrides`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use surgelab_core::data::NormalizeOptions;
use surgelab_core::labeling::{
    LabelConfig, LabelError, LabelSpec, TailPolicy, DEFAULT_BUY_THRESHOLD, DEFAULT_BUY_WINDOW,
    DEFAULT_STRONG_THRESHOLD, DEFAULT_STRONG_WINDOW,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Invalid(#[from] LabelError),
}

/// `[labels]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelsSection {
    pub strong_threshold: f64,
    pub buy_threshold: f64,
    pub strong_window: usize,
    pub buy_window: usize,
    pub tail_policy: TailPolicy,
    /// Additional label columns after `strong` and `buy`.
    pub extra: Vec<LabelSpec>,
}

impl Default for LabelsSection {
    fn default() -> Self {
        Self {
            strong_threshold: DEFAULT_STRONG_THRESHOLD,
            buy_threshold: DEFAULT_BUY_THRESHOLD,
            strong_window: DEFAULT_STRONG_WINDOW,
            buy_window: DEFAULT_BUY_WINDOW,
            tail_policy: TailPolicy::default(),
            extra: Vec::new(),
        }
    }
}

impl LabelsSection {
    pub fn to_label_config(&self) -> LabelConfig {
        let mut config = LabelConfig::strong_buy(
            self.strong_threshold,
            self.buy_threshold,
            self.strong_window,
            self.buy_window,
        )
        .with_tail_policy(self.tail_policy);
        for spec in &self.extra {
            config = config.with_spec(spec.clone());
        }
        config
    }
}

/// Whole pipeline configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub labels: LabelsSection,
    pub normalize: NormalizeOptions,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.label_config().validate()?;
        Ok(())
    }

    pub fn label_config(&self) -> LabelConfig {
        self.labels.to_label_config()
    }

    /// Apply CLI overrides in place.
    pub fn apply(&mut self, overrides: &LabelOverrides) {
        let labels = &mut self.labels;
        if let Some(v) = overrides.strong_threshold {
            labels.strong_threshold = v;
        }
        if let Some(v) = overrides.buy_threshold {
            labels.buy_threshold = v;
        }
        if let Some(v) = overrides.strong_window {
            labels.strong_window = v;
        }
        if let Some(v) = overrides.buy_window {
            labels.buy_window = v;
        }
        if let Some(v) = overrides.tail_policy {
            labels.tail_policy = v;
        }
    }

    /// Stable BLAKE3 id of the effective configuration.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// Per-run label settings from the command line. `None` keeps the file value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LabelOverrides {
    pub strong_threshold: Option<f64>,
    pub buy_threshold: Option<f64>,
    pub strong_window: Option<usize>,
    pub buy_window: Option<usize>,
    pub tail_policy: Option<TailPolicy>,
}
