//! Runtime settings for marker placement and store synchronization.
//!
//! # Responsibility
//! - Hold every tunable constant used by placement and sync paths.
//! - Load settings from JSON with per-field defaults.
//!
//! # Invariants
//! - Validated settings have at least one column, a positive batch size and a
//!   non-blank metadata key.

use crate::transform::TransformPolicy;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Default reserved metadata key marking managed markers.
pub const DEFAULT_METADATA_KEY: &str = "com.condition-markers/metadata";
/// Default marker name prefix, followed by the condition label.
pub const DEFAULT_MARKER_NAME_PREFIX: &str = "Condition Marker - ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSettings {
    /// Namespaced metadata key reserved for the managed-marker flag.
    pub metadata_key: String,
    /// Columns of the marker grid laid over a token image.
    pub markers_per_row: usize,
    /// Upper bound of items per `add_items` call.
    pub max_batch_len: usize,
    pub marker_name_prefix: String,
    /// Base URL marker images are served from.
    pub image_base_url: String,
    /// Native pixel size of condition images.
    pub condition_dpi: f64,
    /// Marker edge length as a fraction of one scene grid cell.
    pub marker_size_fraction: f64,
    /// Placement policy for newly created markers.
    pub creation_policy: TransformPolicy,
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            metadata_key: DEFAULT_METADATA_KEY.to_string(),
            markers_per_row: 5,
            max_batch_len: 40,
            marker_name_prefix: DEFAULT_MARKER_NAME_PREFIX.to_string(),
            image_base_url: "https://conditiontracker.onrender.com/images".to_string(),
            condition_dpi: 150.0,
            marker_size_fraction: 0.16,
            creation_policy: TransformPolicy::FlipImmune,
        }
    }
}

impl MarkerSettings {
    /// Parses settings from JSON; missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_key.trim().is_empty() {
            return Err(ConfigError::Invalid("metadata_key must not be blank"));
        }
        if self.markers_per_row == 0 {
            return Err(ConfigError::Invalid("markers_per_row must be at least 1"));
        }
        if self.max_batch_len == 0 {
            return Err(ConfigError::Invalid("max_batch_len must be at least 1"));
        }
        if !(self.condition_dpi.is_finite() && self.condition_dpi > 0.0) {
            return Err(ConfigError::Invalid("condition_dpi must be positive"));
        }
        if !(self.marker_size_fraction.is_finite() && self.marker_size_fraction > 0.0) {
            return Err(ConfigError::Invalid("marker_size_fraction must be positive"));
        }
        Ok(())
    }
}

/// Loads settings from a JSON file.
pub fn load_settings(path: impl AsRef<Path>) -> Result<MarkerSettings, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    let settings = MarkerSettings::from_json_str(&raw)?;
    info!(
        "event=settings_load module=config status=ok path={} markers_per_row={} max_batch_len={}",
        path.display(),
        settings.markers_per_row,
        settings.max_batch_len
    );
    Ok(settings)
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read settings: {err}"),
            Self::Parse(err) => write!(f, "failed to parse settings: {err}"),
            Self::Invalid(message) => write!(f, "invalid settings: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
