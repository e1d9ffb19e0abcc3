//! # rs-shutters
//!
//! Time-based position tracking and control for roller shutters driven by
//! two momentary switches (one per direction), with optional motion sensors
//! and configurable stop sequences.
//!
//! ## Features
//!
//! - **Position estimation**: Linear interpolation over configured travel times
//! - **Sensor reconciliation**: Motion sensors start and stop the estimate on their own
//! - **Stop sequences**: Per-direction action lists with delays, or a plain switch-off
//! - **Single-writer tasks**: Each shutter runs in its own task; commands never interleave
//! - **Pluggable host**: Actions, state output and position memory sit behind traits
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without a host platform:
//!
//! - `traits` - Collaborator abstractions (action invoker, state publisher, store)
//! - `estimator` - Pure interpolation math
//! - `movement` - Active movement, estimation timer and committed position
//! - `stop_sequence` - Stop sequence parsing
//! - `executor` - Stop sequence execution
//! - `cover` - Main controller that ties everything together
//! - `runner` - Task owning a controller, driven through a handle
//! - `hal` - Concrete implementations (mocks for testing, state file)
//! - `services` - MQTT bridge (feature-gated)
//!
//! ## Example
//!
//! ```rust
//! use rs_shutters::{spawn_cover, CoverConfig, CoverController, SensorEvent};
//! use rs_shutters::hal::{MockInvoker, MockPublisher};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = CoverConfig::new("switch.living_up", "switch.living_down")
//!     .with_open_time(24.0)
//!     .with_sensors(Some("binary_sensor.living_up"), None)
//!     .with_stop_sequence("- action: switch.turn_on\n  entity_id: switch.living_stop");
//!
//! let invoker = MockInvoker::new();
//! let controller = CoverController::new(config, invoker.clone(), MockPublisher::new()).unwrap();
//! let (cover, _task) = spawn_cover(controller);
//!
//! // Someone pressed the wall switch
//! cover.sensor_event(SensorEvent::on("binary_sensor.living_up")).await.unwrap();
//! assert!(cover.state().await.unwrap().is_opening);
//!
//! // Halt it through the stop sequence
//! cover.stop().await.unwrap();
//! assert_eq!(invoker.call_ids(), ["switch.turn_on"]);
//! # }
//! ```

#![warn(missing_docs)]

/// Cover commands and their text/service forms.
pub mod commands;
/// Cover configuration with builder methods and validation.
pub mod config;
/// Main cover controller that coordinates commands, sensors and movement.
pub mod cover;
/// Error types.
pub mod error;
/// Pure position interpolation.
pub mod estimator;
/// Stop sequence execution against an action invoker.
pub mod executor;
/// Collaborator implementations: mocks for testing and a state file.
pub mod hal;
/// Movement tracking with estimation timer.
pub mod movement;
/// Task owning one cover, driven through a cloneable handle.
pub mod runner;
/// Stop sequence parsing.
pub mod stop_sequence;
/// Collaborator traits consumed from the host platform.
pub mod traits;

/// Network services (feature-gated).
#[cfg(feature = "mqtt")]
pub mod services;

// Re-exports for convenience
pub use commands::CoverCommand;
pub use config::CoverConfig;
pub use cover::{CoverController, CoverState, SensorEvent};
pub use error::{ConfigError, CoverError};
pub use executor::{StopOutcome, StopSequenceExecutor};
pub use movement::{
    Direction, MotionFlags, Movement, MovementController, MovementProgress, SensorState,
    TickOutcome,
};
pub use runner::{spawn_cover, CoverHandle};
pub use stop_sequence::{parse_stop_sequence, StopSequenceSet, StopStep};
pub use traits::{ActionCall, ActionInvoker, StatePublisher, StateStore};
