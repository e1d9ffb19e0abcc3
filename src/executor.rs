//! Stop sequence execution.
//!
//! Halting the motor is a side effect on the host platform. With a
//! configured sequence for the resolved direction each step runs in order,
//! awaited to completion and followed by its delay. Without one (or without
//! a known direction) both actuation switches are turned off in a single
//! call.
//!
//! Failures are not caught: the first failing step aborts the sequence and
//! its error reaches the caller.

use tracing::debug;

use crate::error::CoverError;
use crate::movement::Direction;
use crate::stop_sequence::{StopSequenceSet, StopStep};
use crate::traits::{ActionCall, ActionInvoker};

/// Namespace used for the actuation switches.
pub const SWITCH_NAMESPACE: &str = "switch";

/// The two actuation switches of a shutter.
#[derive(Clone, Copy, Debug)]
pub struct SwitchPair<'a> {
    /// Switch driving the motor up.
    pub open: &'a str,
    /// Switch driving the motor down.
    pub close: &'a str,
}

/// What a stop run did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// Both switches were turned off in one call.
    Fallback,
    /// The configured sequence ran; carries the number of steps.
    Sequence(usize),
}

/// Runs stop sequences through an [`ActionInvoker`].
pub struct StopSequenceExecutor<'a, A: ActionInvoker> {
    invoker: &'a A,
    sequences: &'a StopSequenceSet,
    switches: SwitchPair<'a>,
}

impl<'a, A: ActionInvoker> StopSequenceExecutor<'a, A> {
    /// Create an executor over borrowed configuration.
    pub fn new(invoker: &'a A, sequences: &'a StopSequenceSet, switches: SwitchPair<'a>) -> Self {
        Self {
            invoker,
            sequences,
            switches,
        }
    }

    /// Halt a shutter last moving in `direction` (`None` when unknown).
    pub async fn run(&self, direction: Option<Direction>) -> Result<StopOutcome, CoverError> {
        let steps = self.sequences.for_direction(direction);
        if steps.is_empty() {
            self.run_fallback().await?;
            return Ok(StopOutcome::Fallback);
        }

        for (idx, step) in steps.iter().enumerate() {
            debug!(step = idx, namespace = %step.namespace, action = %step.action, "stop step");
            self.invoke(step_call(step)).await?;
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
        }
        Ok(StopOutcome::Sequence(steps.len()))
    }

    async fn run_fallback(&self) -> Result<(), CoverError> {
        debug!("stop fallback: turning off both switches");
        let call = ActionCall::new(SWITCH_NAMESPACE, "turn_off")
            .with_target(vec![self.switches.open.to_string(), self.switches.close.to_string()]);
        self.invoke(call).await
    }

    async fn invoke(&self, call: ActionCall) -> Result<(), CoverError> {
        let (namespace, action) = (call.namespace.clone(), call.action.clone());
        self.invoker
            .call(call)
            .await
            .map_err(|e| CoverError::action(&namespace, &action, e))
    }
}

/// Build the action call for a step, merging its target into the parameters.
fn step_call(step: &StopStep) -> ActionCall {
    let call = ActionCall::new(step.namespace.as_str(), step.action.as_str())
        .with_data(step.params.clone());
    match &step.target {
        Some(target) => call.with_target(target.clone()),
        None => call,
    }
}
