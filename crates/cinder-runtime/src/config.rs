//! Engine configuration loaded from TOML
//!
//! Every field has a default, so an empty file (or none at all) yields a
//! runnable 60 Hz setup. `CINDER_LOG` overrides the log filter.

use crate::clock::DEFAULT_MAX_FRAME_DELTA;
use crate::session::SimulationControl;
use cinder_core::{CinderError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `[log] filter`
pub const LOG_ENV_VAR: &str = "CINDER_LOG";

/// Fixed-step timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_fixed_hz")]
    pub fixed_hz: f64,
    #[serde(default = "default_max_frame_delta")]
    pub max_frame_delta: f64,
    #[serde(default)]
    pub max_steps_per_frame: Option<u32>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fixed_hz: default_fixed_hz(),
            max_frame_delta: default_max_frame_delta(),
            max_steps_per_frame: None,
        }
    }
}

impl TimingConfig {
    /// Seconds per fixed step
    pub fn fixed_step(&self) -> f64 {
        1.0 / self.fixed_hz
    }
}

fn default_fixed_hz() -> f64 {
    60.0
}
fn default_max_frame_delta() -> f64 {
    DEFAULT_MAX_FRAME_DELTA
}

/// Initial session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub paused: bool,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            paused: false,
            speed: default_speed(),
        }
    }
}

impl SessionConfig {
    pub fn control(&self) -> SimulationControl {
        SimulationControl {
            paused: self.paused,
            speed: self.speed,
        }
    }
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub profiler: ProfilerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl EngineConfig {
    /// Load and validate a config file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: EngineConfig = toml::from_str(&content).map_err(|e| {
            CinderError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate config text. No environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let timing = &self.timing;
        if !timing.fixed_hz.is_finite() || timing.fixed_hz <= 0.0 {
            return Err(CinderError::Config(format!(
                "timing.fixed_hz must be positive, got {}",
                timing.fixed_hz
            )));
        }
        if !timing.max_frame_delta.is_finite() || timing.max_frame_delta <= 0.0 {
            return Err(CinderError::Config(format!(
                "timing.max_frame_delta must be positive, got {}",
                timing.max_frame_delta
            )));
        }
        if timing.max_steps_per_frame == Some(0) {
            return Err(CinderError::Config(
                "timing.max_steps_per_frame must be at least 1".to_string(),
            ));
        }
        if !self.session.speed.is_finite() || self.session.speed < 0.0 {
            return Err(CinderError::InvalidSpeed(self.session.speed));
        }
        Ok(())
    }

    /// Apply overrides looked up through `var`
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(filter) = var(LOG_ENV_VAR).filter(|f| !f.trim().is_empty()) {
            self.log.filter = filter;
        }
    }
}
