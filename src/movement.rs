//! Movement tracking for a single shutter.
//!
//! [`MovementController`] owns the one in-flight [`Movement`] and the
//! periodic estimation timer that drives it. Starting a new movement always
//! cancels the previous one first, freezing the committed position at the
//! interpolated value, so two movements can never coexist.
//!
//! The controller is deliberately passive: it never spawns anything. The
//! owning task awaits [`MovementController::next_tick`] alongside its other
//! inputs and calls [`MovementController::tick`] when it fires. Cancelling
//! drops the timer, so a cancelled movement can never reach its completion
//! step.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rs_shutters::movement::{Direction, MovementController, SensorState, TickOutcome};
//! use tokio::time::Instant;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut movement = MovementController::new(0.0, Duration::from_millis(500));
//! let t0 = Instant::now();
//!
//! movement.start(50.0, Duration::from_secs(20), Direction::Opening, t0);
//! assert!(movement.flags().opening);
//!
//! let outcome = movement.tick(t0 + Duration::from_secs(10), SensorState::default());
//! assert_eq!(outcome, Some(TickOutcome::Moving(25)));
//!
//! let outcome = movement.tick(t0 + Duration::from_secs(20), SensorState::default());
//! assert_eq!(outcome, Some(TickOutcome::Completed(50)));
//! assert!(!movement.flags().opening);
//! # }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::estimator::{clamp_position, interpolate};

/// Shortest accepted estimation cadence.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Direction of shutter travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Moving towards 100 (fully open).
    Opening,
    /// Moving towards 0 (fully closed).
    Closing,
}

impl Direction {
    /// Direction needed to go from `current` to `target`.
    ///
    /// Equal positions count as closing; callers treat that case as a stop.
    pub fn towards(current: u8, target: u8) -> Self {
        if target > current {
            Direction::Opening
        } else {
            Direction::Closing
        }
    }

    /// Endpoint implied by this direction.
    pub const fn endpoint(self) -> u8 {
        match self {
            Direction::Opening => 100,
            Direction::Closing => 0,
        }
    }

    /// Lowercase name, as used in topics and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Opening => "opening",
            Direction::Closing => "closing",
        }
    }
}

/// Published motion flags. Both false means stationary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionFlags {
    /// The shutter is believed to be opening.
    pub opening: bool,
    /// The shutter is believed to be closing.
    pub closing: bool,
}

impl MotionFlags {
    /// Both flags cleared.
    pub const STOPPED: Self = Self {
        opening: false,
        closing: false,
    };

    /// Flags for a movement in `direction`.
    pub const fn moving(direction: Direction) -> Self {
        Self {
            opening: matches!(direction, Direction::Opening),
            closing: matches!(direction, Direction::Closing),
        }
    }

    /// Flags mirroring what the motion sensors currently report.
    pub const fn from_sensors(sensors: SensorState) -> Self {
        Self {
            opening: sensors.up,
            closing: sensors.down,
        }
    }

    /// Direction these flags describe, preferring opening when both are set.
    pub const fn direction(self) -> Option<Direction> {
        if self.opening {
            Some(Direction::Opening)
        } else if self.closing {
            Some(Direction::Closing)
        } else {
            None
        }
    }
}

/// Last reported state of the two optional motion sensors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorState {
    /// The "moving up" sensor reports active.
    pub up: bool,
    /// The "moving down" sensor reports active.
    pub down: bool,
}

impl SensorState {
    /// True when either sensor reports movement.
    pub const fn any(self) -> bool {
        self.up || self.down
    }

    /// Direction reported by the sensors, preferring up when both are active.
    pub const fn direction(self) -> Option<Direction> {
        if self.up {
            Some(Direction::Opening)
        } else if self.down {
            Some(Direction::Closing)
        } else {
            None
        }
    }

    /// Record a sensor for `direction` as active or inactive.
    pub fn set(&mut self, direction: Direction, active: bool) {
        match direction {
            Direction::Opening => self.up = active,
            Direction::Closing => self.down = active,
        }
    }

    /// Current state of the sensor for `direction`.
    pub const fn get(self, direction: Direction) -> bool {
        match direction {
            Direction::Opening => self.up,
            Direction::Closing => self.down,
        }
    }
}

/// A tracked motion attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct Movement {
    /// When the movement started.
    pub started: Instant,
    /// Real-valued position at the start.
    pub from: f64,
    /// Position the movement ends at.
    pub target: f64,
    /// Expected travel time from `from` to `target`.
    pub duration: Duration,
    /// Direction of travel.
    pub direction: Direction,
}

impl Movement {
    /// Interpolated position at `now`.
    pub fn position_at(&self, now: Instant) -> f64 {
        interpolate(self.from, self.target, self.started, self.duration, now)
    }

    /// True once the expected duration has elapsed.
    pub fn is_complete_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.duration
    }

    /// Progress snapshot for UI feedback.
    pub fn progress_at(&self, now: Instant) -> MovementProgress {
        MovementProgress {
            from: self.from,
            to: self.target,
            direction: self.direction,
            elapsed: now.saturating_duration_since(self.started),
            duration: self.duration,
        }
    }
}

/// Progress information for the active movement.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use rs_shutters::movement::{Direction, MovementProgress};
///
/// let progress = MovementProgress {
///     from: 0.0,
///     to: 100.0,
///     direction: Direction::Opening,
///     elapsed: Duration::from_secs(5),
///     duration: Duration::from_secs(20),
/// };
/// assert_eq!(progress.percent(), 0.25);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementProgress {
    /// Start position.
    pub from: f64,
    /// Target position.
    pub to: f64,
    /// Direction of travel.
    pub direction: Direction,
    /// Time since the movement started.
    pub elapsed: Duration,
    /// Expected total duration.
    pub duration: Duration,
}

impl MovementProgress {
    /// Completed fraction (0.0 - 1.0).
    pub fn percent(&self) -> f64 {
        if self.duration.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        }
    }
}

/// Result of a single estimation tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still moving; carries the newly committed position.
    Moving(u8),
    /// Reached the expected duration; carries the final position.
    Completed(u8),
}

/// Owns the active movement, its estimation timer and the committed position.
pub struct MovementController {
    active: Option<Movement>,
    ticker: Option<Interval>,
    tick_interval: Duration,
    /// Real-valued estimate behind the committed integer position.
    estimate: f64,
    position: u8,
    flags: MotionFlags,
    last_direction: Option<Direction>,
}

impl MovementController {
    /// Create a stationary controller at `initial` position.
    pub fn new(initial: f64, tick_interval: Duration) -> Self {
        let position = clamp_position(initial);
        Self {
            active: None,
            ticker: None,
            tick_interval,
            estimate: f64::from(position),
            position,
            flags: MotionFlags::STOPPED,
            last_direction: None,
        }
    }

    /// Start tracking a movement towards `target`.
    ///
    /// Any active movement is cancelled first and the new one starts from its
    /// interpolated position at `now`.
    pub fn start(&mut self, target: f64, duration: Duration, direction: Direction, now: Instant) {
        self.cancel(true, now);

        let movement = Movement {
            started: now,
            from: self.estimate,
            target,
            duration,
            direction,
        };
        debug!(
            from = movement.from,
            target,
            duration_s = duration.as_secs_f64(),
            direction = direction.as_str(),
            "movement started"
        );

        let period = self.tick_interval.max(MIN_TICK_INTERVAL);
        let mut ticker = tokio::time::interval_at(now + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.active = Some(movement);
        self.ticker = Some(ticker);
        self.last_direction = Some(direction);
        self.flags = MotionFlags::moving(direction);
    }

    /// Stop tracking the active movement.
    ///
    /// With `update_position` the committed position freezes at the value
    /// interpolated for `now`; otherwise it keeps the last ticked value.
    /// Motion flags are cleared either way.
    pub fn cancel(&mut self, update_position: bool, now: Instant) {
        self.ticker = None;
        if let Some(movement) = self.active.take() {
            if update_position {
                self.commit(movement.position_at(now));
            }
            debug!(position = self.position, "movement cancelled");
        }
        self.flags = MotionFlags::STOPPED;
    }

    /// Wait for the next estimation tick.
    ///
    /// Pends forever while no movement is active, so it can sit in a
    /// `select!` next to other inputs.
    pub async fn next_tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Advance the active movement to `now`.
    ///
    /// On completion the committed position is set to the exact target and
    /// the motion flags follow whatever the sensors still report.
    pub fn tick(&mut self, now: Instant, sensors: SensorState) -> Option<TickOutcome> {
        let movement = self.active.as_ref()?;

        if !movement.is_complete_at(now) {
            let estimate = movement.position_at(now);
            self.commit(estimate);
            trace!(estimate, position = self.position, "tick");
            return Some(TickOutcome::Moving(self.position));
        }

        let target = movement.target;
        self.active = None;
        self.ticker = None;
        self.commit(target);
        self.flags = MotionFlags::from_sensors(sensors);
        debug!(position = self.position, "movement completed");
        Some(TickOutcome::Completed(self.position))
    }

    /// Overwrite the committed position, e.g. from a restored state.
    ///
    /// Ignored while a movement is active.
    pub fn set_position(&mut self, value: f64) {
        if self.active.is_none() {
            self.commit(value);
        }
    }

    fn commit(&mut self, value: f64) {
        self.position = clamp_position(value);
        self.estimate = if value.is_finite() {
            value.clamp(0.0, 100.0)
        } else {
            f64::from(self.position)
        };
    }

    /// Committed integer position.
    pub fn position(&self) -> u8 {
        self.position
    }

    /// Current motion flags.
    pub fn flags(&self) -> MotionFlags {
        self.flags
    }

    /// Override the motion flags.
    pub fn set_flags(&mut self, flags: MotionFlags) {
        self.flags = flags;
    }

    /// Direction of the most recently started movement.
    pub fn last_direction(&self) -> Option<Direction> {
        self.last_direction
    }

    /// The active movement, if any.
    pub fn active(&self) -> Option<&Movement> {
        self.active.as_ref()
    }

    /// True while a movement is being tracked.
    pub fn is_moving(&self) -> bool {
        self.active.is_some()
    }

    /// Target of the active movement.
    pub fn target(&self) -> Option<u8> {
        self.active.as_ref().map(|m| clamp_position(m.target))
    }

    /// Progress of the active movement at `now`.
    pub fn progress(&self, now: Instant) -> Option<MovementProgress> {
        self.active.as_ref().map(|m| m.progress_at(now))
    }

    /// Estimation cadence.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Change the estimation cadence; applies to the next movement.
    pub fn set_tick_interval(&mut self, interval: Duration) {
        self.tick_interval = interval;
    }
}

// ============================================================================
// Tests
// ============================================================================
