//! Stop sequence parsing.
//!
//! A stop sequence is an ordered list of external actions run to halt the
//! shutter motor, e.g. pulsing both switches on a PLC that latches its
//! outputs. Sequences are written by hand in the cover options as YAML (or
//! JSON, which YAML accepts):
//!
//! ```yaml
//! - action: switch.turn_on
//!   entity_id: switch.stop_pulse
//!   delay: 0.5
//! - action: switch.turn_off
//!   entity_id: switch.stop_pulse
//! ```
//!
//! Parsing never fails. Text that cannot be understood degrades to an empty
//! sequence (and the cover falls back to switching both outputs off), and a
//! malformed step is dropped without affecting the steps around it.
//!
//! # Example
//!
//! ```rust
//! use rs_shutters::stop_sequence::parse_stop_sequence;
//!
//! let steps = parse_stop_sequence(r#"
//! - action: switch.turn_off
//!   entity_id: switch.up
//!   delay: 0.2
//! - action: not-a-valid-id
//! - action: script.release
//! "#);
//!
//! assert_eq!(steps.len(), 2);
//! assert_eq!(steps[0].namespace, "switch");
//! assert_eq!(steps[1].action, "release");
//! ```

use std::time::Duration;

use serde_json::{Map, Value};
use serde_yaml::Value as YamlValue;
use tracing::warn;

use crate::movement::Direction;

/// One action to run while halting the shutter.
#[derive(Clone, Debug, PartialEq)]
pub struct StopStep {
    /// Namespace of the action (the part before the dot, e.g. `switch`).
    pub namespace: String,
    /// Action name within the namespace (e.g. `turn_off`).
    pub action: String,
    /// Optional target: a single id or a list of ids.
    pub target: Option<Value>,
    /// Named parameters passed to the action.
    pub params: Map<String, Value>,
    /// Pause after this step before the next one runs.
    pub delay: Duration,
}

/// Parse a textual stop sequence into its steps, in source order.
///
/// Blank input yields an empty sequence without a warning. Unparsable text or
/// a document that is not a list yields an empty sequence with a warning.
pub fn parse_stop_sequence(raw: &str) -> Vec<StopStep> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let loaded: YamlValue = match serde_yaml::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "could not parse stop sequence, falling back to default");
            return Vec::new();
        }
    };

    let YamlValue::Sequence(items) = loaded else {
        warn!("stop sequence must be a list of steps");
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| parse_step(idx, item))
        .collect()
}

fn parse_step(idx: usize, item: &YamlValue) -> Option<StopStep> {
    let YamlValue::Mapping(map) = item else {
        warn!(step = idx, "stop step ignored: not a mapping");
        return None;
    };

    let id = map
        .get("action")
        .or_else(|| map.get("service"))
        .and_then(YamlValue::as_str);
    let Some((namespace, action)) = id.and_then(split_action_id) else {
        warn!(step = idx, "stop step ignored: invalid action id");
        return None;
    };

    let target = match map.get("entity_id") {
        None | Some(YamlValue::Null) => None,
        Some(value) => match to_json(value) {
            Some(v @ (Value::String(_) | Value::Array(_))) => Some(v),
            _ => {
                warn!(step = idx, "stop step target ignored: not an id or list of ids");
                None
            }
        },
    };

    let params = match map.get("data").or_else(|| map.get("service_data")) {
        None | Some(YamlValue::Null) => Map::new(),
        Some(value) => match to_json(value) {
            Some(Value::Object(obj)) => obj,
            _ => {
                warn!(step = idx, "stop step data replaced: must be a mapping");
                Map::new()
            }
        },
    };

    Some(StopStep {
        namespace: namespace.to_string(),
        action: action.to_string(),
        target,
        params,
        delay: coerce_delay(map.get("delay")),
    })
}

/// Split `"<namespace>.<action>"` at the first dot.
fn split_action_id(id: &str) -> Option<(&str, &str)> {
    let (namespace, action) = id.trim().split_once('.')?;
    if namespace.is_empty() || action.is_empty() {
        return None;
    }
    Some((namespace, action))
}

/// Delay in seconds; anything uncoercible, negative or absurd becomes zero.
fn coerce_delay(value: Option<&YamlValue>) -> Duration {
    let secs = match value {
        Some(YamlValue::Number(n)) => n.as_f64(),
        Some(YamlValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    secs.filter(|s| s.is_finite() && *s > 0.0)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .unwrap_or(Duration::ZERO)
}

fn to_json(value: &YamlValue) -> Option<Value> {
    serde_json::to_value(value).ok()
}

/// The stop sequences configured for one shutter.
///
/// Per-direction sequences left empty are replaced by the shared sequence
/// when the set is built, so lookups never need to consider the fallback.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StopSequenceSet {
    shared: Vec<StopStep>,
    up: Vec<StopStep>,
    down: Vec<StopStep>,
}

impl StopSequenceSet {
    /// Build the set from already-parsed sequences.
    pub fn new(shared: Vec<StopStep>, up: Vec<StopStep>, down: Vec<StopStep>) -> Self {
        let up = if up.is_empty() { shared.clone() } else { up };
        let down = if down.is_empty() { shared.clone() } else { down };
        Self { shared, up, down }
    }

    /// Parse the three configured texts and build the set.
    pub fn parse(shared: &str, up: &str, down: &str) -> Self {
        Self::new(
            parse_stop_sequence(shared),
            parse_stop_sequence(up),
            parse_stop_sequence(down),
        )
    }

    /// Sequence to run for a stop attributed to `direction`.
    ///
    /// An unknown direction has no sequence.
    pub fn for_direction(&self, direction: Option<Direction>) -> &[StopStep] {
        match direction {
            Some(Direction::Opening) => &self.up,
            Some(Direction::Closing) => &self.down,
            None => &[],
        }
    }

    /// The shared sequence as configured.
    pub fn shared(&self) -> &[StopStep] {
        &self.shared
    }

    /// True when no sequence is configured for either direction.
    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }
}
