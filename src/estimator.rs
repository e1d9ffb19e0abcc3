//! Time-linear position estimation.
//!
//! Shutters driven by plain open/close switches report nothing about where
//! they are. The only model available is time: a movement that takes
//! `duration` to travel from `from` to `to` is assumed to cover the distance
//! at a constant rate.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rs_shutters::estimator::{clamp_position, interpolate};
//! use tokio::time::Instant;
//!
//! let started = Instant::now();
//! let duration = Duration::from_secs(20);
//!
//! // Half way through an opening movement from 0 to 50
//! let pos = interpolate(0.0, 50.0, started, duration, started + Duration::from_secs(10));
//! assert_eq!(clamp_position(pos), 25);
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Fraction of `duration` that has elapsed since `started`, in `[0.0, 1.0]`.
///
/// A zero duration counts as already complete.
pub fn progress(started: Instant, duration: Duration, now: Instant) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    let elapsed = now.saturating_duration_since(started).as_secs_f64();
    (elapsed / duration.as_secs_f64()).clamp(0.0, 1.0)
}

/// Interpolated position at `now` for a movement from `from` to `to`.
///
/// Returns `from` exactly before any time has elapsed and `to` exactly once
/// the duration has passed. The result never leaves the `[from, to]` span.
pub fn interpolate(from: f64, to: f64, started: Instant, duration: Duration, now: Instant) -> f64 {
    let p = progress(started, duration, now);
    if p <= 0.0 {
        return from;
    }
    if p >= 1.0 {
        return to;
    }
    let value = from + (to - from) * p;
    value.clamp(from.min(to), from.max(to))
}

/// Round a real-valued position to the integer `0..=100` range.
///
/// Non-finite values collapse to the nearest bound (`NaN` to 0).
pub fn clamp_position(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
