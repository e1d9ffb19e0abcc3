//! Mock implementations for testing without a host platform.
//!
//! This module provides test doubles for the collaborator traits, enabling
//! development and testing on desktop without switches or a broker.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockInvoker`] | [`ActionInvoker`] | Records calls, fails on demand |
//! | [`MockPublisher`] | [`StatePublisher`] | Records published states |
//! | [`MemoryStore`] | [`StateStore`] | In-memory last position |
//!
//! The recording mocks are cheap to clone; clones share their records, so a
//! test can keep one handle while the cover task owns another.
//!
//! # Example
//!
//! ```rust
//! use rs_shutters::{CoverConfig, CoverController};
//! use rs_shutters::hal::{MockInvoker, MockPublisher};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let invoker = MockInvoker::new();
//! let publisher = MockPublisher::new();
//! let config = CoverConfig::new("switch.up", "switch.down");
//! let mut cover = CoverController::new(config, invoker.clone(), publisher.clone()).unwrap();
//!
//! cover.stop().await.unwrap();
//! assert_eq!(invoker.calls()[0].id(), "switch.turn_off");
//! assert_eq!(publisher.count(), 1);
//! # }
//! ```
//!
//! [`ActionInvoker`]: crate::traits::ActionInvoker
//! [`StatePublisher`]: crate::traits::StatePublisher
//! [`StateStore`]: crate::traits::StateStore

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::cover::CoverState;
use crate::traits::{ActionCall, ActionInvoker, StatePublisher, StateStore};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Action Mocks
// ============================================================================

/// Error returned by [`MockInvoker`] for actions marked as failing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mock failure for {0}")]
pub struct MockError(pub String);

/// Mock action invoker.
///
/// Every call is recorded before it resolves, including failing ones.
///
/// # Example
///
/// ```rust
/// use rs_shutters::hal::MockInvoker;
/// use rs_shutters::traits::{ActionCall, ActionInvoker};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let invoker = MockInvoker::new().fail_on("script.jammed");
///
/// assert!(invoker.call(ActionCall::new("switch", "turn_on")).await.is_ok());
/// assert!(invoker.call(ActionCall::new("script", "jammed")).await.is_err());
/// assert_eq!(invoker.calls().len(), 2);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockInvoker {
    calls: Arc<Mutex<Vec<ActionCall>>>,
    failing: Vec<String>,
    latency: Duration,
}

impl MockInvoker {
    /// Creates an invoker where every action succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make calls to `namespace.action` fail.
    pub fn fail_on(mut self, id: impl Into<String>) -> Self {
        self.failing.push(id.into());
        self
    }

    /// Make every call take `latency` (tokio time) to resolve.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<ActionCall> {
        lock(&self.calls).clone()
    }

    /// Calls so far as `namespace.action` strings.
    pub fn call_ids(&self) -> Vec<String> {
        lock(&self.calls).iter().map(ActionCall::id).collect()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        lock(&self.calls).clear();
    }
}

#[async_trait]
impl ActionInvoker for MockInvoker {
    type Error = MockError;

    async fn call(&self, call: ActionCall) -> Result<(), MockError> {
        let id = call.id();
        lock(&self.calls).push(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(&id) {
            Err(MockError(id))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Platform Mocks
// ============================================================================

/// Mock state publisher that records every snapshot.
#[derive(Debug, Clone, Default)]
pub struct MockPublisher {
    states: Arc<Mutex<Vec<CoverState>>>,
}

impl MockPublisher {
    /// Creates an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// All published states, oldest first.
    pub fn states(&self) -> Vec<CoverState> {
        lock(&self.states).clone()
    }

    /// Most recent state.
    pub fn last(&self) -> Option<CoverState> {
        lock(&self.states).last().cloned()
    }

    /// Number of publications.
    pub fn count(&self) -> usize {
        lock(&self.states).len()
    }
}

impl StatePublisher for MockPublisher {
    fn publish(&self, state: &CoverState) {
        lock(&self.states).push(state.clone());
    }
}

/// In-memory position store.
///
/// Remembers the position of every settled state it is given as a
/// publisher, like [`FileStateStore`](crate::hal::FileStateStore) does on
/// disk.
///
/// ```rust
/// use rs_shutters::hal::MemoryStore;
/// use rs_shutters::traits::StateStore;
///
/// assert_eq!(MemoryStore::new(Some(35.0)).last_position(), Some(35.0));
/// assert_eq!(MemoryStore::default().last_position(), None);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    position: Mutex<Option<f64>>,
}

impl MemoryStore {
    /// Creates a store holding `position`.
    pub fn new(position: Option<f64>) -> Self {
        Self {
            position: Mutex::new(position),
        }
    }
}

impl StateStore for MemoryStore {
    fn last_position(&self) -> Option<f64> {
        *lock(&self.position)
    }
}

impl StatePublisher for MemoryStore {
    fn publish(&self, state: &CoverState) {
        if !state.is_opening && !state.is_closing {
            *lock(&self.position) = Some(f64::from(state.position));
        }
    }
}
