//! State publication and restore.

use std::sync::Arc;

use crate::cover::CoverState;

/// Renders cover state on the host platform.
///
/// Called after every state change and on each estimation tick while
/// moving. Implementations must not block for long; the shutter task is
/// paused while `publish` runs.
pub trait StatePublisher: Send {
    /// Publish a state snapshot.
    fn publish(&self, state: &CoverState);
}

impl<T: StatePublisher + Sync + ?Sized> StatePublisher for Arc<T> {
    fn publish(&self, state: &CoverState) {
        (**self).publish(state);
    }
}

impl<A: StatePublisher, B: StatePublisher> StatePublisher for (A, B) {
    fn publish(&self, state: &CoverState) {
        self.0.publish(state);
        self.1.publish(state);
    }
}

impl<T: StatePublisher> StatePublisher for Option<T> {
    fn publish(&self, state: &CoverState) {
        if let Some(inner) = self {
            inner.publish(state);
        }
    }
}

/// Source of the last known position, consulted once at startup.
pub trait StateStore {
    /// Last position recorded for this cover, if any.
    fn last_position(&self) -> Option<f64>;
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn last_position(&self) -> Option<f64> {
        (**self).last_position()
    }
}
