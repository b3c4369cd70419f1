//! Simulation Configuration
//!
//! Every knob has a default matching the observed game: 50 ms ticks at 1.01x
//! growth, crash points in `[1, 11)`, targets in `[1.5, 6.5)`, a 15 s dwell
//! after the crash and 11 remembered crash points. A JSON file may override
//! any subset of fields.

use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::game::engine::EngineConfig;
use crate::predict::tracker::TrackerConfig;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Largest event broadcast buffer a config may ask for.
pub const MAX_EVENT_BUFFER: usize = 1 << 16;

/// Full configuration for a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Round engine settings.
    pub engine: EngineConfig,
    /// Prediction tracker settings.
    pub tracker: TrackerConfig,
    /// Master seed; `None` picks one from the system clock.
    pub seed: Option<u64>,
    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            tracker: TrackerConfig::default(),
            seed: None,
            event_buffer: 256,
        }
    }
}

impl SimulationConfig {
    /// Parse from a JSON string and validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.tracker.validate()?;
        if self.event_buffer == 0 || self.event_buffer > MAX_EVENT_BUFFER {
            return Err(ConfigError::Invalid(format!(
                "event_buffer must be in 1..={}",
                MAX_EVENT_BUFFER
            )));
        }
        Ok(())
    }

    /// The configured seed, or one derived from the system clock.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
        })
    }
}
