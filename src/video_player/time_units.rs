// SPDX-License-Identifier: MPL-2.0
//! Time unit conversion utilities for video playback.
//!
//! Frames carry timestamps in stream timebase ticks. The player converts them
//! to seconds for seeking and to whole milliseconds for timer callbacks.

use crate::config::defaults::FALLBACK_TICKS_PER_SECOND;

/// Milliseconds per second as f64 for calculations.
pub const MILLIS_PER_SECOND: f64 = 1_000.0;

/// Ticks per second of a stream timebase expressed as `num/den` seconds.
///
/// Invalid timebases (zero numerator or denominator) fall back to
/// microsecond ticks.
///
/// # Examples
///
/// ```
/// use vdec_player::video_player::time_units::ticks_per_second;
///
/// assert_eq!(ticks_per_second(1, 90_000), 90_000.0);
/// assert_eq!(ticks_per_second(0, 0), 1_000_000.0);
/// ```
#[inline]
pub fn ticks_per_second(num: i32, den: i32) -> f64 {
    if num == 0 || den == 0 {
        FALLBACK_TICKS_PER_SECOND
    } else {
        f64::from(den) / f64::from(num)
    }
}

/// Converts a tick count to seconds.
#[inline]
#[allow(clippy::cast_precision_loss)]
pub fn ticks_to_secs(ticks: i64, ticks_per_second: f64) -> f64 {
    ticks as f64 / ticks_per_second
}

/// Converts seconds to the nearest lower tick count.
///
/// # Examples
///
/// ```
/// use vdec_player::video_player::time_units::secs_to_ticks;
///
/// assert_eq!(secs_to_ticks(5.0, 1_000.0), 5_000);
/// assert_eq!(secs_to_ticks(0.5, 90_000.0), 45_000);
/// ```
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub fn secs_to_ticks(secs: f64, ticks_per_second: f64) -> i64 {
    (secs * ticks_per_second) as i64
}

/// Converts a tick count to whole milliseconds, truncating like the timer
/// callback contract (`1000 × pts / ticks_per_second`).
///
/// # Examples
///
/// ```
/// use vdec_player::video_player::time_units::ticks_to_millis;
///
/// assert_eq!(ticks_to_millis(45_000, 90_000.0), 500);
/// ```
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn ticks_to_millis(ticks: i64, ticks_per_second: f64) -> i64 {
    (MILLIS_PER_SECOND * ticks as f64 / ticks_per_second) as i64
}

/// Converts a stream duration in ticks to whole milliseconds.
///
/// Negative or missing durations count as zero.
#[inline]
pub fn duration_millis(duration_ticks: Option<i64>, ticks_per_second: f64) -> i64 {
    duration_ticks
        .filter(|ticks| *ticks > 0)
        .map_or(0, |ticks| ticks_to_millis(ticks, ticks_per_second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_abs_diff_eq;

    #[test]
    fn ticks_per_second_inverts_timebase() {
        assert_abs_diff_eq!(ticks_per_second(1, 1000), 1000.0);
        assert_abs_diff_eq!(ticks_per_second(1001, 30_000), 30_000.0 / 1001.0);
    }

    #[test]
    fn ticks_per_second_falls_back_on_invalid_timebase() {
        assert_abs_diff_eq!(ticks_per_second(0, 1000), FALLBACK_TICKS_PER_SECOND);
        assert_abs_diff_eq!(ticks_per_second(1, 0), FALLBACK_TICKS_PER_SECOND);
    }

    #[test]
    fn ticks_to_secs_converts_correctly() {
        assert_abs_diff_eq!(ticks_to_secs(90_000, 90_000.0), 1.0);
        assert_abs_diff_eq!(ticks_to_secs(2_500, 1_000.0), 2.5);
        assert_abs_diff_eq!(ticks_to_secs(0, 1_000.0), 0.0);
    }

    #[test]
    fn secs_to_ticks_truncates() {
        assert_eq!(secs_to_ticks(1.0, 1_000.0), 1_000);
        assert_eq!(secs_to_ticks(0.0015, 1_000.0), 1);
        assert_eq!(secs_to_ticks(10.0, 12_800.0), 128_000);
    }

    #[test]
    fn ticks_to_millis_truncates() {
        assert_eq!(ticks_to_millis(1, 3.0), 333);
        assert_eq!(ticks_to_millis(5_000, 1_000.0), 5_000);
        assert_eq!(ticks_to_millis(0, 1_000.0), 0);
    }

    #[test]
    fn duration_millis_ignores_missing_or_negative() {
        assert_eq!(duration_millis(Some(10_000), 1_000.0), 10_000);
        assert_eq!(duration_millis(Some(-1), 1_000.0), 0);
        assert_eq!(duration_millis(None, 1_000.0), 0);
    }

    #[test]
    fn handles_large_durations() {
        // 24 hours at 90 kHz
        let day_ticks = 24 * 60 * 60 * 90_000_i64;
        assert_eq!(ticks_to_millis(day_ticks, 90_000.0), 86_400_000);
    }
}
