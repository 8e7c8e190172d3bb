//! Store configuration.
//!
//! Configuration is plain serde data so it can be embedded in larger JSON
//! documents (see `modelstore-protocol`'s scripts) or loaded from a file.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::ListKind;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Read error: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration is not valid JSON for [`StoreConfig`].
    #[error("Invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),

    /// The configuration parsed but holds an unusable setting.
    #[error("Invalid setting {field}: {message}")]
    InvalidSetting { field: &'static str, message: String },
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Kind of list created when a list update hits an empty model.
    pub default_list_kind: ListKind,

    /// Maximum number of propagation waves in one run loop pass.
    pub max_iterations: usize,

    /// Policy for computed models that do not set their own.
    pub computed_defaults: ComputedDefaults,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_list_kind: ListKind::Array,
            max_iterations: 10_000,
            computed_defaults: ComputedDefaults::default(),
        }
    }
}

/// Default caching policy of computed models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputedDefaults {
    /// Keep the last computed value until an input changes.
    pub cacheable: bool,

    /// Recompute as soon as an input changes instead of on the next read.
    pub immediate: bool,
}

impl Default for ComputedDefaults {
    fn default() -> Self {
        Self {
            cacheable: true,
            immediate: true,
        }
    }
}

impl StoreConfig {
    /// Parse configuration from JSON text. Missing fields take their
    /// defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "maxIterations",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
