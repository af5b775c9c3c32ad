//! # Configuration Management
//!
//! Loads `tide-curve.toml`. Every section and field has a default, so a
//! partial file (or none at all) still yields a working configuration.
//!
//! ```toml
//! [station]
//! id = "8418150"
//! name = "Portland, ME"
//! supports_dense = true
//! supports_observations = false
//!
//! [chart]
//! future_hours = 24
//! history_hours = 0
//!
//! [predictions]
//! offsets_minutes = [-60, 60, 180, 360]
//!
//! [refresh]
//! remote_interval_minutes = 10
//! local_interval_seconds = 60
//! fetch_buffer_hours = 12
//!
//! [model]
//! semi_period_hours = 6.2
//! derivative_delta_seconds = 300.0
//! steady_threshold = 0.1
//! chart_buffer_minutes = 30
//! ```

use crate::estimator::CHART_BUFFER_MINUTES;
use crate::extrema::TIDE_SEMI_PERIOD_HOURS;
use crate::rate::RATE_DERIVATIVE_DELTA_SECONDS;
use crate::trend::TREND_STEADY_THRESHOLD;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "tide-curve.toml";

/// Furthest prediction offset either side of now (one week)
pub const MAX_OFFSET_MINUTES: i64 = 168 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("serializing config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub station: StationConfig,
    pub chart: ChartConfig,
    pub predictions: PredictionConfig,
    pub refresh: RefreshConfig,
    pub model: ModelConfig,
}

/// Station identity and what its data source can offer
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StationConfig {
    /// Provider station ID (e.g., "8418150" for Portland, ME)
    pub id: String,
    pub name: String,
    /// Station publishes a dense prediction series, not just high/low water
    pub supports_dense: bool,
    /// Station publishes observed water levels
    pub supports_observations: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Hours ahead of now to chart (6..=168)
    pub future_hours: u32,
    /// Hours behind now to chart (0..=168)
    pub history_hours: u32,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Minutes from now; negative looks back. Zero is not allowed.
    pub offsets_minutes: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Provider fetch cadence
    pub remote_interval_minutes: u64,
    /// Current state recompute cadence
    pub local_interval_seconds: u64,
    /// Extra hours fetched on each side of the chart window
    pub fetch_buffer_hours: i64,
}

/// Tuning of the estimation math
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub semi_period_hours: f64,
    pub derivative_delta_seconds: f64,
    pub steady_threshold: f64,
    pub chart_buffer_minutes: i64,
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            id: "8418150".to_string(),
            name: "Portland, ME".to_string(),
            supports_dense: true,
            supports_observations: false,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            future_hours: 24,
            history_hours: 0,
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            offsets_minutes: vec![-60, 60, 180, 360],
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            remote_interval_minutes: 10,
            local_interval_seconds: 60,
            fetch_buffer_hours: 12,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            semi_period_hours: TIDE_SEMI_PERIOD_HOURS,
            derivative_delta_seconds: RATE_DERIVATIVE_DELTA_SECONDS,
            steady_threshold: TREND_STEADY_THRESHOLD,
            chart_buffer_minutes: CHART_BUFFER_MINUTES,
        }
    }
}

impl ModelConfig {
    /// Semi-period rounded to whole seconds.
    pub fn semi_period(&self) -> Duration {
        Duration::seconds((self.semi_period_hours * 3600.0).round() as i64)
    }
}

impl RefreshConfig {
    pub fn remote_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.remote_interval_minutes * 60)
    }

    pub fn local_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.local_interval_seconds)
    }
}

impl Config {
    /// Load configuration from tide-curve.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist, doesn't
    /// parse, or fails validation
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => {
                info!(
                    "no config file at {}, using defaults ({})",
                    path.display(),
                    Self::default().station.name
                );
                return Self::default();
            }
        };

        let config = match toml::from_str::<Config>(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("invalid config file format in {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match config.validate() {
            Ok(()) => {
                info!("loaded configuration for station: {}", config.station.name);
                config
            }
            Err(e) => {
                warn!("{} rejected: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let chart = &self.chart;
        if !(6..=168).contains(&chart.future_hours) {
            return Err(ConfigError::Invalid(format!(
                "chart.future_hours must be 6..=168, got {}",
                chart.future_hours
            )));
        }
        if chart.history_hours > 168 {
            return Err(ConfigError::Invalid(format!(
                "chart.history_hours must be 0..=168, got {}",
                chart.history_hours
            )));
        }
        if self.predictions.offsets_minutes.contains(&0) {
            return Err(ConfigError::Invalid(
                "predictions.offsets_minutes must not contain 0".to_string(),
            ));
        }
        if let Some(offset) = self
            .predictions
            .offsets_minutes
            .iter()
            .find(|m| m.unsigned_abs() > MAX_OFFSET_MINUTES.unsigned_abs())
        {
            return Err(ConfigError::Invalid(format!(
                "predictions.offsets_minutes must be within ±{MAX_OFFSET_MINUTES}, got {offset}"
            )));
        }
        if self.refresh.remote_interval_minutes == 0 || self.refresh.local_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "refresh intervals must be positive".to_string(),
            ));
        }
        if self.refresh.fetch_buffer_hours < 0 {
            return Err(ConfigError::Invalid(
                "refresh.fetch_buffer_hours must not be negative".to_string(),
            ));
        }

        let model = &self.model;
        if !(model.semi_period_hours.is_finite() && model.semi_period_hours > 0.0) {
            return Err(ConfigError::Invalid(
                "model.semi_period_hours must be positive".to_string(),
            ));
        }
        if !(model.derivative_delta_seconds.is_finite() && model.derivative_delta_seconds > 0.0) {
            return Err(ConfigError::Invalid(
                "model.derivative_delta_seconds must be positive".to_string(),
            ));
        }
        if !(model.steady_threshold.is_finite() && model.steady_threshold >= 0.0) {
            return Err(ConfigError::Invalid(
                "model.steady_threshold must not be negative".to_string(),
            ));
        }
        if model.chart_buffer_minutes < 0 {
            return Err(ConfigError::Invalid(
                "model.chart_buffer_minutes must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Save current configuration to tide-curve.toml
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(CONFIG_FILE)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!("configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}
