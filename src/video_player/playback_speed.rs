// SPDX-License-Identifier: MPL-2.0
//! Playback speed domain type for video playback.
//!
//! This module provides a type-safe wrapper for playback speed values,
//! ensuring they are always within the valid range (0.1x - 3.0x), and the
//! derivation of the pump's pace interval from a stream frame rate.

use crate::backend::Rational;
use crate::config::defaults::{
    DEFAULT_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED, MIN_PACE_INTERVAL_MICROS, MIN_PLAYBACK_SPEED,
};
use std::time::Duration;

/// Playback speed value, guaranteed to be within valid range (0.1x - 3.0x).
///
/// Unlike a clamping setter, out-of-range requests are rejected so the
/// caller can report them.
///
/// # Example
///
/// ```
/// use vdec_player::video_player::PlaybackSpeed;
///
/// let speed = PlaybackSpeed::try_new(2.0).unwrap();
/// assert_eq!(speed.value(), 2.0);
///
/// // Values outside range are rejected
/// assert!(PlaybackSpeed::try_new(4.0).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSpeed(f64);

impl PlaybackSpeed {
    /// Creates a playback speed, or `None` if outside `[0.1, 3.0]` or NaN.
    #[must_use]
    pub fn try_new(speed: f64) -> Option<Self> {
        (MIN_PLAYBACK_SPEED..=MAX_PLAYBACK_SPEED)
            .contains(&speed)
            .then_some(Self(speed))
    }

    /// Returns the speed value as f64.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Scales a base (1.0x) interval by this speed.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn scale(self, base: Duration) -> Duration {
        let nanos = (base.as_nanos() as f64 / self.0).round() as u64;
        Duration::from_nanos(nanos).max(Duration::from_micros(MIN_PACE_INTERVAL_MICROS))
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self(DEFAULT_PLAYBACK_SPEED)
    }
}

/// Interval between two frames at 1.0x for the given average frame rate.
///
/// Missing, zero or negative rates yield `fallback`. The result is never zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn base_pace_interval(frame_rate: Option<Rational>, fallback: Duration) -> Duration {
    let interval = frame_rate
        .and_then(Rational::to_f64)
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .map_or(fallback, |fps| Duration::from_nanos((1e9 / fps).round() as u64));
    interval.max(Duration::from_micros(MIN_PACE_INTERVAL_MICROS))
}
