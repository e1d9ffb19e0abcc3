//! Collaborator interfaces consumed from the host platform.
//!
//! The shutter core never talks to a home automation system directly. It
//! depends on three narrow seams:
//!
//! - [`ActionInvoker`]: run a named action (`switch.turn_on`, `script.stop`, ...)
//!   and wait for it to finish
//! - [`StatePublisher`]: render the cover state
//! - [`StateStore`]: recall the last known position at startup
//!
//! Motion sensor updates flow the other way: the host forwards them as
//! [`SensorEvent`](crate::cover::SensorEvent)s.
//!
//! Mock implementations live in [`crate::hal::mock`].

pub mod action;
pub mod platform;

pub use action::*;
pub use platform::*;
