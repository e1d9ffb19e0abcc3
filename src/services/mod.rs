//! Network services connecting a cover to the outside world.
//!
//! - `mqtt` feature: MQTT bridge that carries commands, sensor reports,
//!   action requests and state over a broker
//!
//! Services talk to the cover only through a [`CoverHandle`](crate::CoverHandle),
//! so the cover task stays the single writer of its state.

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::*;
