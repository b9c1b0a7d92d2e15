// SPDX-License-Identifier: MPL-2.0
//! Drift-free periodic scheduling.
//!
//! The pump does not sleep a fixed delta per iteration. It keeps a running
//! wake deadline and adds the interval to it, so time spent decoding inside a
//! tick is absorbed by the next sleep instead of accumulating:
//!
//! ```text
//! next_wake += interval
//! sleep_until(next_wake)
//! ```
//!
//! A tick that overruns its slot makes the following deadlines fall in the
//! past; those ticks fire immediately until the schedule catches up.

use std::time::{Duration, Instant};

/// Running wake deadline for a periodic loop.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    next_wake: Instant,
}

impl Pacer {
    /// Creates a pacer anchored at `origin`; the first deadline is one
    /// interval after it.
    #[must_use]
    pub fn new(origin: Instant) -> Self {
        Self { next_wake: origin }
    }

    /// Advances the deadline by `interval` and returns it.
    pub fn advance(&mut self, interval: Duration) -> Instant {
        self.next_wake += interval;
        self.next_wake
    }

    /// Re-anchors the schedule, dropping any backlog of missed ticks.
    pub fn restart(&mut self, origin: Instant) {
        self.next_wake = origin;
    }

    /// The deadline of the tick most recently scheduled.
    #[must_use]
    pub fn next_wake(&self) -> Instant {
        self.next_wake
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_are_accumulated_from_origin() {
        let origin = Instant::now();
        let mut pacer = Pacer::new(origin);
        let interval = Duration::from_millis(40);

        for _ in 0..100 {
            pacer.advance(interval);
        }

        assert_eq!(pacer.next_wake(), origin + Duration::from_millis(4_000));
    }

    #[test]
    fn processing_latency_does_not_shift_schedule() {
        let origin = Instant::now();
        let mut pacer = Pacer::new(origin);
        let interval = Duration::from_millis(10);

        let first = pacer.advance(interval);
        // Pretend the tick took 7ms to process before scheduling the next one
        let second = pacer.advance(interval);

        assert_eq!(second - first, interval);
        assert_eq!(second - origin, Duration::from_millis(20));
    }

    #[test]
    fn interval_changes_apply_to_next_tick_only() {
        let origin = Instant::now();
        let mut pacer = Pacer::new(origin);

        pacer.advance(Duration::from_millis(40));
        let wake = pacer.advance(Duration::from_millis(20));

        assert_eq!(wake - origin, Duration::from_millis(60));
    }

    #[test]
    fn restart_drops_backlog() {
        let origin = Instant::now();
        let mut pacer = Pacer::new(origin);
        pacer.advance(Duration::from_secs(5));

        let later = origin + Duration::from_secs(1);
        pacer.restart(later);

        assert_eq!(pacer.advance(Duration::from_millis(10)), later + Duration::from_millis(10));
    }

    #[test]
    fn real_sleeps_stay_on_schedule() {
        let origin = Instant::now();
        let mut pacer = Pacer::new(origin);
        let interval = Duration::from_millis(5);

        for _ in 0..10 {
            let wake = pacer.advance(interval);
            std::thread::sleep(wake.saturating_duration_since(Instant::now()));
            assert!(Instant::now() >= wake);
        }

        // Ten ticks of 5ms: total elapsed tracks the schedule, not the sum of
        // sleep overshoots.
        let elapsed = origin.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500));
    }
}
