//! Dynamic action dispatch.
//!
//! Actions are addressed by a `namespace.action` string pair because the set
//! of callable actions is open-ended and comes from user configuration.
//!
//! # Example
//!
//! ```rust
//! use rs_shutters::traits::ActionCall;
//! use serde_json::json;
//!
//! let call = ActionCall::new("switch", "turn_on").with_target("switch.shutter_up");
//! assert_eq!(call.id(), "switch.turn_on");
//! assert_eq!(call.target(), Some(&json!("switch.shutter_up")));
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter key carrying the target id (or list of ids).
pub const TARGET_KEY: &str = "entity_id";

/// A single action invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    /// Action namespace, e.g. `switch`.
    pub namespace: String,
    /// Action name, e.g. `turn_off`.
    pub action: String,
    /// Named parameters, including the target under [`TARGET_KEY`].
    pub data: Map<String, Value>,
}

impl ActionCall {
    /// Create a call without parameters.
    pub fn new(namespace: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            action: action.into(),
            data: Map::new(),
        }
    }

    /// Replace the parameters.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Set the target unless the parameters already name one.
    pub fn with_target(mut self, target: impl Into<Value>) -> Self {
        self.data
            .entry(TARGET_KEY)
            .or_insert_with(|| target.into());
        self
    }

    /// The target id or list of ids, if any.
    pub fn target(&self) -> Option<&Value> {
        self.data.get(TARGET_KEY)
    }

    /// `namespace.action` form.
    pub fn id(&self) -> String {
        format!("{}.{}", self.namespace, self.action)
    }
}

/// Runs actions on the host platform.
///
/// `call` resolves once the action has completed (or failed). Failures are
/// not retried by the shutter core.
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    /// Error type for failed invocations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Invoke an action and wait for it to finish.
    async fn call(&self, call: ActionCall) -> Result<(), Self::Error>;
}

#[async_trait]
impl<T: ActionInvoker + ?Sized> ActionInvoker for Arc<T> {
    type Error = T::Error;

    async fn call(&self, call: ActionCall) -> Result<(), Self::Error> {
        (**self).call(call).await
    }
}
