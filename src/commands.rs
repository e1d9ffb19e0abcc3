//! Cover commands.
//!
//! The host dispatches five commands into a shutter: open, close, stop,
//! set-position and set-shade. [`CoverCommand`] is their typed form; the
//! parsing helpers accept the service names and payloads a host adapter
//! receives.
//!
//! # Example
//!
//! ```rust
//! use rs_shutters::CoverCommand;
//! use serde_json::json;
//!
//! assert_eq!(CoverCommand::from_text("open"), Some(CoverCommand::Open));
//! assert_eq!(
//!     CoverCommand::from_service("set_cover_position", &json!({"position": "35"})),
//!     Some(CoverCommand::SetPosition { position: 35.0 }),
//! );
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command for one shutter.
///
/// Positions are not validated here; the controller clamps them to
/// `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CoverCommand {
    /// Move to 100.
    Open,
    /// Move to 0.
    Close,
    /// Halt and run the stop sequence.
    Stop,
    /// Move to an arbitrary position.
    SetPosition {
        /// Requested position (clamped by the controller).
        position: f64,
    },
    /// Move to the configured shade position.
    SetShade,
}

impl CoverCommand {
    /// Name of the command, as used in logs and topics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CoverCommand::Open => "open",
            CoverCommand::Close => "close",
            CoverCommand::Stop => "stop",
            CoverCommand::SetPosition { .. } => "set_position",
            CoverCommand::SetShade => "set_shade",
        }
    }

    /// Parse a plain-text command.
    ///
    /// Accepts the command names (`open`, `close`, `stop`, `shade`) and a
    /// bare number, which becomes a set-position command. Input is trimmed
    /// and case-insensitive.
    ///
    /// ```
    /// use rs_shutters::CoverCommand;
    ///
    /// assert_eq!(CoverCommand::from_text(" STOP "), Some(CoverCommand::Stop));
    /// assert_eq!(CoverCommand::from_text("set_shade"), Some(CoverCommand::SetShade));
    /// assert_eq!(CoverCommand::from_text("72.5"), Some(CoverCommand::SetPosition { position: 72.5 }));
    /// assert_eq!(CoverCommand::from_text("sideways"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "open" | "open_cover" | "up" => Some(CoverCommand::Open),
            "close" | "close_cover" | "down" => Some(CoverCommand::Close),
            "stop" | "stop_cover" => Some(CoverCommand::Stop),
            "shade" | "set_shade" => Some(CoverCommand::SetShade),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|p| !p.is_nan())
                .map(|position| CoverCommand::SetPosition { position }),
        }
    }

    /// Parse a service call with its parameter mapping.
    ///
    /// Set-position without a usable `position` parameter yields `None`.
    pub fn from_service(service: &str, data: &Value) -> Option<Self> {
        match service.trim() {
            "set_cover_position" | "set_position" => data
                .get("position")
                .and_then(coerce_position)
                .map(|position| CoverCommand::SetPosition { position }),
            other => match Self::from_text(other)? {
                CoverCommand::SetPosition { .. } => None,
                cmd => Some(cmd),
            },
        }
    }
}

/// Read a position from a JSON number or numeric string.
pub fn coerce_position(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|p| !p.is_nan())
}
