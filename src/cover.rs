//! Cover controller that ties everything together.
//!
//! This module provides [`CoverController`], the central component for one
//! shutter. It coordinates commands, motion sensors, the movement estimate
//! and the stop sequence.
//!
//! # Overview
//!
//! The cover controller:
//! - Turns commands into switch actions and tracked movements
//! - Reconciles the estimate with motion sensor reports
//! - Halts the shutter through the configured stop sequence
//! - Publishes a [`CoverState`] after every change
//!
//! The controller is single-owner. Run it inside the task spawned by
//! [`crate::runner::spawn_cover`], which serialises commands, sensor events
//! and estimation ticks.
//!
//! # Example
//!
//! ```rust
//! use rs_shutters::{CoverConfig, CoverController, hal::{MockInvoker, MockPublisher}};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = CoverConfig::new("switch.up", "switch.down").with_initial_position(0.0);
//! let mut cover = CoverController::new(config, MockInvoker::new(), MockPublisher::new()).unwrap();
//!
//! cover.open().await.unwrap();
//! assert!(cover.state().is_opening);
//! assert_eq!(cover.invoker().calls()[0].id(), "switch.turn_on");
//!
//! cover.stop().await.unwrap();
//! assert!(!cover.state().is_opening);
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::commands::CoverCommand;
use crate::config::CoverConfig;
use crate::error::{ConfigError, CoverError};
use crate::executor::{StopSequenceExecutor, SwitchPair, SWITCH_NAMESPACE};
use crate::movement::{
    Direction, MotionFlags, MovementController, MovementProgress, SensorState, TickOutcome,
};
use crate::stop_sequence::StopSequenceSet;
use crate::traits::{ActionCall, ActionInvoker, StatePublisher, StateStore};

/// Sensor state string that counts as active.
pub const SENSOR_ACTIVE: &str = "on";

// ============================================================================
// State Snapshot
// ============================================================================

/// Snapshot of a cover for publication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoverState {
    /// Display name.
    pub name: String,
    /// Committed position (0 closed, 100 open).
    pub position: u8,
    /// Believed to be opening.
    pub is_opening: bool,
    /// Believed to be closing.
    pub is_closing: bool,
    /// Position is 0.
    pub is_closed: bool,
    /// No motion sensors back this state.
    pub assumed_state: bool,
    /// Target of the active movement.
    pub target_position: Option<u8>,
    /// Progress of the active movement.
    pub movement: Option<MovementProgress>,
}

/// A state change reported for one of the motion sensors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEvent {
    /// Id of the sensor that changed.
    pub entity_id: String,
    /// Previous state, if known.
    #[serde(default)]
    pub old_state: Option<String>,
    /// New state; missing counts as inactive.
    #[serde(default)]
    pub new_state: Option<String>,
}

impl SensorEvent {
    /// Create an event for `entity_id` with only the new state known.
    pub fn new(entity_id: impl Into<String>, new_state: Option<&str>) -> Self {
        Self {
            entity_id: entity_id.into(),
            old_state: None,
            new_state: new_state.map(str::to_string),
        }
    }

    /// Shorthand for an active (`on`) report.
    pub fn on(entity_id: impl Into<String>) -> Self {
        Self::new(entity_id, Some(SENSOR_ACTIVE))
    }

    /// Shorthand for an inactive (`off`) report.
    pub fn off(entity_id: impl Into<String>) -> Self {
        Self::new(entity_id, Some("off"))
    }

    /// True when the new state reports movement.
    pub fn is_active(&self) -> bool {
        self.new_state.as_deref() == Some(SENSOR_ACTIVE)
    }
}

// ============================================================================
// Cover Controller
// ============================================================================

/// Main cover controller.
///
/// # Type Parameters
///
/// - `A`: runs switch and stop-sequence actions ([`ActionInvoker`])
/// - `P`: renders state ([`StatePublisher`])
pub struct CoverController<A: ActionInvoker, P: StatePublisher> {
    config: CoverConfig,
    sequences: StopSequenceSet,
    movement: MovementController,
    sensors: SensorState,
    invoker: A,
    publisher: P,
}

impl<A: ActionInvoker, P: StatePublisher> CoverController<A, P> {
    /// Create a controller, rejecting invalid configuration.
    ///
    /// The starting position is the configured `initial_position`, or 0
    /// until [`restore`](Self::restore) supplies a remembered one.
    pub fn new(config: CoverConfig, invoker: A, publisher: P) -> Result<Self, ConfigError> {
        config.validate()?;
        let initial = config.initial_position().map_or(0.0, f64::from);
        Ok(Self {
            sequences: config.stop_sequences(),
            movement: MovementController::new(initial, config.tick_interval()),
            sensors: SensorState::default(),
            config,
            invoker,
            publisher,
        })
    }

    /// Adopt the last known position when no explicit initial position is set.
    pub fn restore<S: StateStore + ?Sized>(&mut self, store: &S) {
        if self.config.initial_position.is_some() {
            return;
        }
        if let Some(position) = store.last_position() {
            info!(cover = %self.config.name, position, "restored last position");
            self.movement.set_position(position);
        }
        self.publish();
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Apply a typed command.
    pub async fn apply(&mut self, command: CoverCommand) -> Result<(), CoverError> {
        match command {
            CoverCommand::Open => self.open().await,
            CoverCommand::Close => self.close().await,
            CoverCommand::Stop => self.stop().await,
            CoverCommand::SetPosition { position } => self.set_position(position).await,
            CoverCommand::SetShade => self.set_shade().await,
        }
    }

    /// Move to fully open.
    pub async fn open(&mut self) -> Result<(), CoverError> {
        self.set_position(100.0).await
    }

    /// Move to fully closed.
    pub async fn close(&mut self) -> Result<(), CoverError> {
        self.set_position(0.0).await
    }

    /// Move to the configured shade position.
    pub async fn set_shade(&mut self) -> Result<(), CoverError> {
        let shade = self.config.shade_position();
        self.set_position(f64::from(shade)).await
    }

    /// Move to `position`, clamped to `0..=100`.
    ///
    /// A target equal to the current position is a stop. Otherwise the
    /// active movement is cancelled, the switch for the new direction is
    /// turned on and a movement is tracked with that direction's full
    /// travel time.
    pub async fn set_position(&mut self, position: f64) -> Result<(), CoverError> {
        let target = crate::estimator::clamp_position(position);
        if target == self.movement.position() {
            debug!(cover = %self.config.name, target, "already at target");
            return self.stop().await;
        }

        self.movement.cancel(true, Instant::now());
        let current = self.movement.position();
        // Frozen on the target between ticks: no direction switch is driven.
        if target == current {
            return self.stop().await;
        }

        let direction = Direction::towards(current, target);
        info!(
            cover = %self.config.name,
            from = current,
            target,
            direction = direction.as_str(),
            "moving"
        );

        let switch = self.config.switch_for(direction).to_string();
        let call = ActionCall::new(SWITCH_NAMESPACE, "turn_on").with_target(switch);
        if let Err(e) = invoke(&self.invoker, call).await {
            self.publish();
            return Err(e);
        }

        let duration = self.config.duration_for(direction);
        self.movement
            .start(f64::from(target), duration, direction, Instant::now());
        self.publish();
        Ok(())
    }

    /// Halt the shutter.
    ///
    /// The direction used to pick the stop sequence is taken from the
    /// sensors, then the motion flags, then the last movement. The position
    /// freezes at its interpolated value before any action runs.
    pub async fn stop(&mut self) -> Result<(), CoverError> {
        let direction = self.stop_direction();
        info!(
            cover = %self.config.name,
            direction = direction.map_or("unknown", Direction::as_str),
            "stopping"
        );
        self.movement.cancel(true, Instant::now());

        let switches = SwitchPair {
            open: &self.config.open_switch,
            close: &self.config.close_switch,
        };
        let result = StopSequenceExecutor::new(&self.invoker, &self.sequences, switches)
            .run(direction)
            .await;

        self.movement.set_flags(MotionFlags::STOPPED);
        self.publish();
        if let Err(e) = &result {
            warn!(cover = %self.config.name, error = %e, "stop sequence failed");
        }
        result.map(|_| ())
    }

    /// Direction a stop issued now would resolve to.
    pub fn stop_direction(&self) -> Option<Direction> {
        self.sensors
            .direction()
            .or_else(|| self.movement.flags().direction())
            .or_else(|| self.movement.last_direction())
    }

    // ========================================================================
    // Sensors
    // ========================================================================

    /// Reconcile with a motion sensor report.
    ///
    /// Returns false for events about sensors this cover does not use. Every
    /// active report, repeated ones included, freezes the estimate and
    /// restarts tracking from there towards the sensor's endpoint. A
    /// deactivation freezes the estimate once neither sensor is active.
    /// Sensor events never invoke actions.
    pub fn handle_sensor_event(&mut self, event: &SensorEvent) -> bool {
        let Some(direction) = self.config.sensor_direction(&event.entity_id) else {
            return false;
        };
        let active = event.is_active();
        self.sensors.set(direction, active);
        let now = Instant::now();

        if active {
            info!(
                cover = %self.config.name,
                sensor = %event.entity_id,
                direction = direction.as_str(),
                "movement reported by sensor"
            );
            let endpoint = f64::from(direction.endpoint());
            let duration = self.config.duration_for(direction);
            self.movement.start(endpoint, duration, direction, now);
        } else if !self.sensors.any() {
            info!(cover = %self.config.name, sensor = %event.entity_id, "sensors idle");
            self.movement.cancel(true, now);
        } else {
            debug!(sensor = %event.entity_id, "sensor inactive, other still active");
        }

        self.publish();
        true
    }

    // ========================================================================
    // Estimation
    // ========================================================================

    /// Wait for the next estimation tick; pends while idle.
    pub async fn next_tick(&mut self) {
        self.movement.next_tick().await;
    }

    /// Advance the estimate to `now` and publish.
    pub fn on_tick(&mut self, now: Instant) -> Option<TickOutcome> {
        let outcome = self.movement.tick(now, self.sensors)?;
        if let TickOutcome::Completed(position) = outcome {
            info!(cover = %self.config.name, position, "movement complete");
        }
        self.publish();
        Some(outcome)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Replace the configuration at runtime.
    ///
    /// Sequences and travel times apply to the next movement or stop. A
    /// sensor whose id changed is forgotten.
    pub fn update_options(&mut self, config: CoverConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.moving_up_sensor != self.config.moving_up_sensor {
            self.sensors.up = false;
        }
        if config.moving_down_sensor != self.config.moving_down_sensor {
            self.sensors.down = false;
        }
        self.sequences = config.stop_sequences();
        self.movement.set_tick_interval(config.tick_interval());
        info!(cover = %config.name, "options updated");
        self.config = config;
        self.publish();
        Ok(())
    }

    /// Stop tracking without moving the committed position or invoking actions.
    pub fn shutdown(&mut self) {
        debug!(cover = %self.config.name, "shutting down");
        self.movement.cancel(false, Instant::now());
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Current state snapshot.
    pub fn state(&self) -> CoverState {
        let now = Instant::now();
        let flags = self.movement.flags();
        let position = self.movement.position();
        CoverState {
            name: self.config.name.clone(),
            position,
            is_opening: flags.opening,
            is_closing: flags.closing,
            is_closed: position == 0,
            assumed_state: self.config.assumed_state(),
            target_position: self.movement.target(),
            movement: self.movement.progress(now),
        }
    }

    /// Committed position.
    pub fn position(&self) -> u8 {
        self.movement.position()
    }

    /// Last reported sensor state.
    pub fn sensors(&self) -> SensorState {
        self.sensors
    }

    /// True while a movement is tracked.
    pub fn is_moving(&self) -> bool {
        self.movement.is_moving()
    }

    /// Active configuration.
    pub fn config(&self) -> &CoverConfig {
        &self.config
    }

    /// The action invoker.
    pub fn invoker(&self) -> &A {
        &self.invoker
    }

    /// The state publisher.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    fn publish(&self) {
        self.publisher.publish(&self.state());
    }
}

async fn invoke<A: ActionInvoker>(invoker: &A, call: ActionCall) -> Result<(), CoverError> {
    let (namespace, action) = (call.namespace.clone(), call.action.clone());
    invoker.call(call).await.map_err(|e| {
        warn!(namespace = %namespace, action = %action, error = %e, "action failed");
        CoverError::action(&namespace, &action, e)
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MemoryStore, MockInvoker, MockPublisher};
    use serde_json::json;
    use std::time::Duration;

    type TestCover = CoverController<MockInvoker, MockPublisher>;

    const UP: &str = "binary_sensor.up";
    const DOWN: &str = "binary_sensor.down";

    fn config() -> CoverConfig {
        CoverConfig::new("switch.up", "switch.down").with_initial_position(0.0)
    }

    fn cover(config: CoverConfig) -> TestCover {
        CoverController::new(config, MockInvoker::new(), MockPublisher::new()).unwrap()
    }

    fn with_sensors() -> TestCover {
        cover(config().with_sensors(Some(UP), Some(DOWN)))
    }

    /// Advance paused time and run the tick the task would run.
    async fn advance(cover: &mut TestCover, secs: f64) {
        tokio::time::advance(Duration::from_secs_f64(secs)).await;
        cover.on_tick(Instant::now());
    }

    fn call_ids(cover: &TestCover) -> Vec<String> {
        cover.invoker().calls().iter().map(ActionCall::id).collect()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    #[test]
    fn new_rejects_invalid_config() {
        let result = CoverController::new(
            config().with_open_time(0.0),
            MockInvoker::new(),
            MockPublisher::new(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidDuration { .. })));
    }

    #[tokio::test]
    async fn initial_state() {
        let cover = cover(config().with_initial_position(65.0));
        let state = cover.state();
        assert_eq!(state.position, 65);
        assert!(!state.is_opening && !state.is_closing);
        assert!(!state.is_closed);
        assert!(state.assumed_state);
        assert_eq!(state.target_position, None);
    }

    #[tokio::test]
    async fn restore_only_without_initial_position() {
        let mut restored = cover(CoverConfig::new("switch.up", "switch.down"));
        restored.restore(&MemoryStore::new(Some(72.0)));
        assert_eq!(restored.position(), 72);
        assert_eq!(restored.publisher().last().unwrap().position, 72);

        let mut pinned = cover(config().with_initial_position(10.0));
        pinned.restore(&MemoryStore::new(Some(72.0)));
        assert_eq!(pinned.position(), 10);
    }

    #[tokio::test]
    async fn restore_without_history_keeps_zero() {
        let mut cover = cover(CoverConfig::new("switch.up", "switch.down"));
        cover.restore(&MemoryStore::new(None));
        assert_eq!(cover.position(), 0);
    }

    // ========================================================================
    // Commands
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn set_position_estimates_and_completes() {
        let mut cover = cover(config());
        cover.set_position(50.0).await.unwrap();

        let calls = cover.invoker().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id(), "switch.turn_on");
        assert_eq!(calls[0].target(), Some(&json!("switch.up")));
        assert!(cover.state().is_opening);
        assert_eq!(cover.state().target_position, Some(50));

        // the full-travel duration applies even for a partial move
        advance(&mut cover, 10.0).await;
        assert_eq!(cover.position(), 25);

        advance(&mut cover, 10.0).await;
        let state = cover.state();
        assert_eq!(state.position, 50);
        assert!(!state.is_opening && !state.is_closing);
        assert!(!cover.is_moving());
        // no stop action on natural completion
        assert_eq!(cover.invoker().calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_uses_close_switch_and_time() {
        let mut cover = cover(config().with_initial_position(100.0).with_close_time(10.0));
        cover.close().await.unwrap();
        assert_eq!(cover.invoker().calls()[0].target(), Some(&json!("switch.down")));
        assert!(cover.state().is_closing);

        advance(&mut cover, 5.0).await;
        assert_eq!(cover.position(), 50);
        advance(&mut cover, 5.0).await;
        assert_eq!(cover.position(), 0);
        assert!(cover.state().is_closed);
    }

    #[tokio::test(start_paused = true)]
    async fn set_shade_targets_shade_position() {
        let mut cover = cover(config().with_shade_position(30.0));
        cover.set_shade().await.unwrap();
        assert_eq!(cover.state().target_position, Some(30));
    }

    #[tokio::test(start_paused = true)]
    async fn targets_are_clamped() {
        let mut cover = cover(config());
        cover.set_position(180.0).await.unwrap();
        assert_eq!(cover.state().target_position, Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn set_position_to_current_is_a_stop() {
        let mut cover = cover(config().with_initial_position(40.0));
        cover.set_position(40.0).await.unwrap();

        assert_eq!(call_ids(&cover), ["switch.turn_off"]);
        assert!(!cover.is_moving());
        assert_eq!(cover.position(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn target_reached_by_cancel_is_a_stop() {
        let mut cover = cover(config());
        cover.open().await.unwrap();
        // no tick ran, so the committed position is still 0
        tokio::time::advance(Duration::from_secs(5)).await;

        cover.set_position(25.0).await.unwrap();
        assert_eq!(call_ids(&cover), ["switch.turn_on", "switch.turn_off"]);
        assert_eq!(cover.invoker().calls()[0].target(), Some(&json!("switch.up")));
        assert!(!cover.is_moving());
        assert_eq!(cover.position(), 25);
        assert!(!cover.state().is_opening && !cover.state().is_closing);
    }

    #[tokio::test(start_paused = true)]
    async fn new_command_supersedes_active_movement() {
        let mut cover = cover(config());
        cover.open().await.unwrap();
        advance(&mut cover, 5.0).await;
        assert_eq!(cover.position(), 25);

        cover.close().await.unwrap();
        assert!(cover.state().is_closing);
        assert_eq!(cover.state().target_position, Some(0));
        assert_eq!(
            cover.invoker().calls()[1].target(),
            Some(&json!("switch.down"))
        );

        // closes from 25 at the full-travel rate
        advance(&mut cover, 4.0).await;
        assert_eq!(cover.position(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_turn_on_does_not_track_movement() {
        let invoker = MockInvoker::new().fail_on("switch.turn_on");
        let mut cover = CoverController::new(config(), invoker, MockPublisher::new()).unwrap();

        let err = cover.open().await.unwrap_err();
        assert!(matches!(err, CoverError::Action { .. }));
        assert!(!cover.is_moving());
        assert!(!cover.state().is_opening);
        assert!(!cover.publisher().states().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn apply_dispatches() {
        let mut cover = cover(config());
        cover
            .apply(CoverCommand::SetPosition { position: 70.0 })
            .await
            .unwrap();
        assert_eq!(cover.state().target_position, Some(70));
        cover.apply(CoverCommand::Stop).await.unwrap();
        assert!(!cover.is_moving());
    }

    // ========================================================================
    // Stop
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn stop_without_sequences_turns_off_both_switches() {
        let mut cover = cover(config());
        cover.open().await.unwrap();
        advance(&mut cover, 4.0).await;

        cover.stop().await.unwrap();
        let calls = cover.invoker().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].id(), "switch.turn_off");
        assert_eq!(calls[1].target(), Some(&json!(["switch.up", "switch.down"])));
        assert_eq!(cover.position(), 20);
        assert!(!cover.state().is_opening);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_interpolated_position_between_ticks() {
        let mut cover = cover(config().with_tick_interval_ms(1000));
        cover.open().await.unwrap();
        tokio::time::advance(Duration::from_millis(2600)).await;

        cover.stop().await.unwrap();
        assert_eq!(cover.position(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_uses_direction_sequence() {
        let mut cover = cover(
            config().with_directional_stop_sequences("- action: script.stop_up", "- action: script.stop_down"),
        );
        cover.open().await.unwrap();
        advance(&mut cover, 1.0).await;
        cover.stop().await.unwrap();
        assert_eq!(call_ids(&cover), ["switch.turn_on", "script.stop_up"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_completion_uses_last_direction() {
        let mut cover = cover(
            config()
                .with_close_time(4.0)
                .with_initial_position(100.0)
                .with_directional_stop_sequences("- action: script.stop_up", "- action: script.stop_down"),
        );
        cover.close().await.unwrap();
        advance(&mut cover, 4.0).await;
        assert!(!cover.is_moving());

        cover.stop().await.unwrap();
        assert_eq!(call_ids(&cover), ["switch.turn_on", "script.stop_down"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_with_unknown_direction_falls_back() {
        let mut cover = cover(config().with_stop_sequence("- action: script.stop"));
        cover.stop().await.unwrap();
        assert_eq!(call_ids(&cover), ["switch.turn_off"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_stop_step_still_clears_flags() {
        let invoker = MockInvoker::new().fail_on("script.stop");
        let mut cover = CoverController::new(
            config().with_stop_sequence("- action: script.stop\n- action: script.after"),
            invoker,
            MockPublisher::new(),
        )
        .unwrap();
        cover.open().await.unwrap();

        assert!(cover.stop().await.is_err());
        assert_eq!(call_ids(&cover), ["switch.turn_on", "script.stop"]);
        assert!(!cover.state().is_opening);
        assert!(!cover.is_moving());
    }

    // ========================================================================
    // Sensors
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn sensor_activation_tracks_movement_without_actions() {
        let mut cover = cover(config().with_initial_position(30.0).with_sensors(Some(UP), Some(DOWN)));

        assert!(cover.handle_sensor_event(&SensorEvent::on(UP)));
        assert!(cover.state().is_opening);
        assert_eq!(cover.state().target_position, Some(100));
        assert!(!cover.state().assumed_state);

        advance(&mut cover, 5.0).await;
        assert!(cover.handle_sensor_event(&SensorEvent::off(UP)));

        let state = cover.state();
        assert!((47..=48).contains(&state.position));
        assert!(!state.is_opening && !state.is_closing);
        assert!(cover.invoker().calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_sensor_is_ignored() {
        let mut cover = with_sensors();
        let before = cover.publisher().states().len();
        assert!(!cover.handle_sensor_event(&SensorEvent::on("binary_sensor.other")));
        assert!(!cover.is_moving());
        assert_eq!(cover.publisher().states().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_activation_restarts_from_estimate() {
        let mut cover = cover(
            config()
                .with_initial_position(30.0)
                .with_sensors(Some(UP), Some(DOWN)),
        );
        cover.handle_sensor_event(&SensorEvent::on(UP));

        tokio::time::advance(Duration::from_secs(5)).await;
        cover.handle_sensor_event(&SensorEvent::on(UP));

        // 30 + 70 * 5 / 20
        assert_eq!(cover.position(), 48);
        let movement = cover.movement.active().unwrap();
        assert_eq!(movement.started, Instant::now());
        assert!((movement.from - 47.5).abs() < 1e-9);
        assert_eq!(movement.target, 100.0);
        assert!(cover.state().is_opening);
        assert!(cover.invoker().calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_new_state_counts_as_inactive() {
        let mut cover = with_sensors();
        cover.handle_sensor_event(&SensorEvent::on(UP));
        cover.handle_sensor_event(&SensorEvent::new(UP, None));
        assert!(!cover.is_moving());
        assert!(!cover.sensors().up);
    }

    #[tokio::test(start_paused = true)]
    async fn deactivation_with_other_sensor_active_keeps_movement() {
        let mut cover = with_sensors();
        cover.handle_sensor_event(&SensorEvent::on(UP));
        cover.handle_sensor_event(&SensorEvent::on(DOWN));
        assert!(cover.state().is_closing);

        cover.handle_sensor_event(&SensorEvent::off(UP));
        assert!(cover.is_moving());
        assert!(cover.state().is_closing);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_while_sensor_active_keeps_flag() {
        let mut cover = cover(config().with_open_time(4.0).with_sensors(Some(UP), None));
        cover.handle_sensor_event(&SensorEvent::on(UP));
        advance(&mut cover, 4.0).await;

        let state = cover.state();
        assert_eq!(state.position, 100);
        assert!(state.is_opening);
        assert!(!cover.is_moving());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prefers_sensor_direction() {
        let mut cover = cover(
            config()
                .with_initial_position(50.0)
                .with_sensors(Some(UP), Some(DOWN))
                .with_directional_stop_sequences("- action: script.stop_up", "- action: script.stop_down"),
        );
        cover.close().await.unwrap();
        cover.handle_sensor_event(&SensorEvent::on(UP));
        assert_eq!(cover.stop_direction(), Some(Direction::Opening));

        cover.stop().await.unwrap();
        assert_eq!(call_ids(&cover), ["switch.turn_on", "script.stop_up"]);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn update_options_swaps_sequences_and_resets_changed_sensors() {
        let mut cover = with_sensors();
        cover.handle_sensor_event(&SensorEvent::on(UP));

        let updated = config()
            .with_sensors(Some("binary_sensor.new_up"), Some(DOWN))
            .with_stop_sequence("- action: script.halt");
        cover.update_options(updated).unwrap();
        assert!(!cover.sensors().up);

        cover.stop().await.unwrap();
        assert_eq!(call_ids(&cover), ["script.halt"]);
    }

    #[tokio::test]
    async fn update_options_rejects_invalid() {
        let mut cover = cover(config());
        let err = cover
            .update_options(config().with_close_time(-1.0))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { field: "close_time", .. }));
        assert_eq!(cover.config().close_time, 20.0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_keeps_last_committed_position() {
        let mut cover = cover(config());
        cover.open().await.unwrap();
        advance(&mut cover, 2.0).await;
        tokio::time::advance(Duration::from_millis(300)).await;

        cover.shutdown();
        assert_eq!(cover.position(), 10);
        assert!(!cover.is_moving());
        assert_eq!(cover.invoker().calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn every_change_is_published() {
        let mut cover = cover(config());
        cover.open().await.unwrap();
        advance(&mut cover, 1.0).await;
        cover.stop().await.unwrap();

        let states = cover.publisher().states();
        assert_eq!(states.len(), 3);
        assert!(states[0].is_opening);
        assert_eq!(states[1].position, 5);
        assert!(!states[2].is_opening);
    }
}
