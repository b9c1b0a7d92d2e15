// SPDX-License-Identifier: MPL-2.0
//! Frame-accurate repositioning.
//!
//! Backends can only land on a keyframe at or before the requested time. The
//! seek controller rewinds there, then decodes forward and discards frames
//! until the first one within the tolerance window of the target:
//!
//! ```text
//! keyframe ... discarded ... | target - tolerance | first kept frame
//! ```
//!
//! The cost is bounded by decode throughput over one group of pictures.

use super::frame::Frame;
use super::state::Session;
use super::time_units::secs_to_ticks;
use crate::backend::MediaInput;
use crate::error::VideoError;

/// Result of [`reposition`].
#[derive(Debug)]
pub(crate) enum SeekOutcome {
    /// The first frame past the tolerance window; already the current frame.
    Landed(Frame),
    /// The stream ended before reaching the target.
    Exhausted,
    /// The backend rejected the flush or the keyframe seek.
    Failed(VideoError),
}

/// Clamps a requested position to `[0, total_secs]`; NaN maps to 0.
pub(crate) fn clamp_target(target_secs: f64, total_secs: f64) -> f64 {
    if target_secs.is_nan() {
        return 0.0;
    }
    target_secs.clamp(0.0, total_secs.max(0.0))
}

/// Rewinds the session's source and scans forward to `target_secs`.
///
/// Returns `None` if no source is open. Status handling is left to the
/// caller.
pub(crate) fn reposition<I: MediaInput>(
    session: &mut Session<I>,
    target_secs: f64,
    tolerance_secs: f64,
    max_read_errors: u32,
) -> Option<SeekOutcome> {
    let target_ticks = secs_to_ticks(target_secs, session.metadata.ticks_per_second);
    if let Err(err) = session.media.as_mut()?.rewind_to(target_ticks) {
        return Some(SeekOutcome::Failed(err));
    }

    let threshold = target_secs - tolerance_secs;
    let mut discarded = 0_usize;
    loop {
        let Some(frame) = session.retrieve_frame(max_read_errors) else {
            log::debug!("Seek to {target_secs:.3}s ran past the end after {discarded} frames");
            return Some(SeekOutcome::Exhausted);
        };
        if session.frame_secs(&frame) > threshold {
            log::debug!(
                "Seek to {target_secs:.3}s landed on pts {} after discarding {discarded} frames",
                frame.pts()
            );
            return Some(SeekOutcome::Landed(frame));
        }
        discarded += 1;
    }
}
