//! Cover configuration.
//!
//! One [`CoverConfig`] describes one shutter: the two actuation switches,
//! the optional motion sensors, travel times and stop sequences. It
//! deserializes from the flat key set used by the cover options and from a
//! TOML table.
//!
//! # Example
//!
//! ```rust
//! use rs_shutters::config::CoverConfig;
//!
//! // Use defaults for everything but the switches
//! let config = CoverConfig::new("switch.living_up", "switch.living_down");
//!
//! // Or customize
//! let config = CoverConfig::new("switch.living_up", "switch.living_down")
//!     .with_name("Living room")
//!     .with_open_time(24.0)
//!     .with_close_time(21.5)
//!     .with_sensors(Some("binary_sensor.living_up"), Some("binary_sensor.living_down"));
//!
//! assert!(config.validate().is_ok());
//! assert!(!config.assumed_state());
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;
use crate::estimator::clamp_position;
use crate::movement::{Direction, MIN_TICK_INTERVAL};
use crate::stop_sequence::StopSequenceSet;

/// Default travel time in seconds for both directions
pub const DEFAULT_TRAVEL_SECS: f64 = 20.0;

/// Default shade position
pub const DEFAULT_SHADE_POSITION: f64 = 40.0;

/// Default estimation cadence in milliseconds
pub const DEFAULT_TICK_MS: u64 = 500;

// ============================================================================
// Cover Config
// ============================================================================

/// Configuration for a single shutter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Display name
    pub name: String,
    /// Switch that drives the motor up
    pub open_switch: String,
    /// Switch that drives the motor down
    pub close_switch: String,
    /// Sensor reporting upward movement
    #[serde(deserialize_with = "empty_as_none")]
    pub moving_up_sensor: Option<String>,
    /// Sensor reporting downward movement
    #[serde(deserialize_with = "empty_as_none")]
    pub moving_down_sensor: Option<String>,
    /// Seconds to travel from fully closed to fully open
    pub open_time: f64,
    /// Seconds to travel from fully open to fully closed
    pub close_time: f64,
    /// Position at startup; when unset the last known position is restored
    pub initial_position: Option<f64>,
    /// Position used by the shade command
    pub shade_position: f64,
    /// Stop sequence used for whichever direction has none of its own
    pub stop_sequence: String,
    /// Stop sequence after opening
    pub stop_sequence_up: String,
    /// Stop sequence after closing
    pub stop_sequence_down: String,
    /// Estimation cadence in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            name: "Shutter".to_string(),
            open_switch: String::new(),
            close_switch: String::new(),
            moving_up_sensor: None,
            moving_down_sensor: None,
            open_time: DEFAULT_TRAVEL_SECS,
            close_time: DEFAULT_TRAVEL_SECS,
            initial_position: None,
            shade_position: DEFAULT_SHADE_POSITION,
            stop_sequence: String::new(),
            stop_sequence_up: String::new(),
            stop_sequence_down: String::new(),
            tick_interval_ms: DEFAULT_TICK_MS,
        }
    }
}

impl CoverConfig {
    /// Create a config for the given switches with default timings
    pub fn new(open_switch: impl Into<String>, close_switch: impl Into<String>) -> Self {
        Self {
            open_switch: open_switch.into(),
            close_switch: close_switch.into(),
            ..Default::default()
        }
    }

    /// Parse a flat TOML table and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the motion sensors (empty ids count as unset)
    pub fn with_sensors(mut self, up: Option<&str>, down: Option<&str>) -> Self {
        self.moving_up_sensor = up.filter(|s| !s.is_empty()).map(str::to_string);
        self.moving_down_sensor = down.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    /// Set the opening travel time
    pub fn with_open_time(mut self, secs: f64) -> Self {
        self.open_time = secs;
        self
    }

    /// Set the closing travel time
    pub fn with_close_time(mut self, secs: f64) -> Self {
        self.close_time = secs;
        self
    }

    /// Set an explicit startup position
    pub fn with_initial_position(mut self, position: f64) -> Self {
        self.initial_position = Some(position);
        self
    }

    /// Set the shade position
    pub fn with_shade_position(mut self, position: f64) -> Self {
        self.shade_position = position;
        self
    }

    /// Set the shared stop sequence text
    pub fn with_stop_sequence(mut self, text: impl Into<String>) -> Self {
        self.stop_sequence = text.into();
        self
    }

    /// Set the per-direction stop sequence texts
    pub fn with_directional_stop_sequences(
        mut self,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        self.stop_sequence_up = up.into();
        self.stop_sequence_down = down.into();
        self
    }

    /// Set the estimation cadence
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    /// Check travel times and switch ids
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("open_time", self.open_time), ("close_time", self.close_time)] {
            if !(value > 0.0 && Duration::try_from_secs_f64(value).is_ok()) {
                return Err(ConfigError::InvalidDuration { field, value });
            }
        }
        if self.open_switch.trim().is_empty() {
            return Err(ConfigError::MissingSwitch("open_switch"));
        }
        if self.close_switch.trim().is_empty() {
            return Err(ConfigError::MissingSwitch("close_switch"));
        }
        Ok(())
    }

    /// Travel time for a movement in `direction`
    pub fn duration_for(&self, direction: Direction) -> Duration {
        let secs = match direction {
            Direction::Opening => self.open_time,
            Direction::Closing => self.close_time,
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    /// Switch that starts a movement in `direction`
    pub fn switch_for(&self, direction: Direction) -> &str {
        match direction {
            Direction::Opening => &self.open_switch,
            Direction::Closing => &self.close_switch,
        }
    }

    /// Which direction a sensor id reports, if it is one of ours
    pub fn sensor_direction(&self, entity_id: &str) -> Option<Direction> {
        if self.moving_up_sensor.as_deref() == Some(entity_id) {
            Some(Direction::Opening)
        } else if self.moving_down_sensor.as_deref() == Some(entity_id) {
            Some(Direction::Closing)
        } else {
            None
        }
    }

    /// Whether published state is a guess (no motion sensors configured)
    pub fn assumed_state(&self) -> bool {
        self.moving_up_sensor.is_none() && self.moving_down_sensor.is_none()
    }

    /// Shade position clamped to `0..=100`
    pub fn shade_position(&self) -> u8 {
        clamp_position(self.shade_position)
    }

    /// Explicit startup position clamped to `0..=100`
    pub fn initial_position(&self) -> Option<u8> {
        self.initial_position.map(clamp_position)
    }

    /// Estimation cadence, never shorter than [`MIN_TICK_INTERVAL`]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms).max(MIN_TICK_INTERVAL)
    }

    /// Parse the three stop sequence texts
    pub fn stop_sequences(&self) -> StopSequenceSet {
        StopSequenceSet::parse(
            &self.stop_sequence,
            &self.stop_sequence_up,
            &self.stop_sequence_down,
        )
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

// ============================================================================
// Tests
// ============================================================================
