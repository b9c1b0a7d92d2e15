// SPDX-License-Identifier: MPL-2.0
//! The frame pump thread.
//!
//! One pump runs per started session. It sleeps on the player's condvar until
//! the next [`Pacer`] deadline, decodes one frame, caches it and delivers it
//! outside the lock. `stop` and a newer `start` retire it through the status
//! and the pump epoch.

use super::pacing::Pacer;
use super::player::Shared;
use super::state::Status;
use crate::backend::DecodingBackend;
use parking_lot::MutexGuard;
use std::sync::Arc;
use std::time::Instant;

/// Thread name of the pump, visible in debuggers and panic messages.
pub(crate) const PUMP_THREAD_NAME: &str = "vdec-pump";

pub(crate) fn run<B: DecodingBackend>(shared: Arc<Shared<B>>, epoch: u64) {
    let max_read_errors = shared.config.max_consecutive_read_errors;
    let mut session = shared.session.lock();
    let mut pacer = Pacer::new(Instant::now());
    log::debug!("Pump {epoch} started at {:?} per frame", session.pace_interval);

    loop {
        let wake_at = pacer.advance(session.pace_interval);
        while session.pump_may_run(epoch) && Instant::now() < wake_at {
            shared.wake.wait_until(&mut session, wake_at);
        }
        if !session.pump_may_run(epoch) {
            break;
        }

        if session.status == Status::Pause {
            // Fully suspended until resumed or stopped
            while session.pump_may_run(epoch) && session.status == Status::Pause {
                shared.wake.wait(&mut session);
            }
            pacer.restart(Instant::now());
            continue;
        }

        let Some(frame) = session.retrieve_frame(max_read_errors) else {
            log::info!("Playback reached the end of the stream");
            session.status = Status::Stop;
            shared.wake.notify_all();
            break;
        };
        if let Some(delivery) = session.delivery(frame) {
            MutexGuard::unlocked(&mut session, || {
                shared.dispatcher.fire(delivery);
            });
        }
    }

    log::debug!("Pump {epoch} exited");
}
