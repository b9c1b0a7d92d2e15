// SPDX-License-Identifier: MPL-2.0
//! Callback delivery.
//!
//! The pump and the seek controller never invoke host callbacks while holding
//! the session lock. They capture a [`Delivery`] under the lock, release it,
//! then hand the delivery to the [`Dispatcher`]. Callbacks may therefore call
//! any player operation, including `stop`.
//!
//! Every delivery carries a sequence number taken under the session lock.
//! The dispatcher fires one delivery at a time behind a reentrant gate and
//! checks the number while holding it: a delivery older than one already
//! fired is dropped, and a tick is skipped when its frame callback triggered
//! a newer delivery. Frames therefore reach the host in decode order, each
//! tick right after its own frame.

use super::frame::Frame;
use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::sync::Arc;

/// Host callback receiving each delivered frame.
pub type FrameCallback = dyn Fn(&Frame) + Send + Sync;

/// Host callback receiving the presentation time (ms) of each delivered frame.
pub type TickCallback = dyn Fn(i64) + Send + Sync;

/// The registered callback pair.
#[derive(Clone)]
pub(crate) struct Callbacks {
    on_frame: Arc<FrameCallback>,
    on_tick: Arc<TickCallback>,
}

impl Callbacks {
    pub fn new(
        on_frame: impl Fn(&Frame) + Send + Sync + 'static,
        on_tick: impl Fn(i64) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_frame: Arc::new(on_frame),
            on_tick: Arc::new(on_tick),
        }
    }
}

/// One frame ready to be handed to the host.
pub(crate) struct Delivery {
    seq: u64,
    frame: Frame,
    millis: i64,
    callbacks: Callbacks,
}

impl Delivery {
    pub fn new(seq: u64, frame: Frame, millis: i64, callbacks: Callbacks) -> Self {
        Self {
            seq,
            frame,
            millis,
            callbacks,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// State only the thread holding the gate may touch.
#[derive(Debug, Default)]
struct GateState {
    last_fired: Cell<u64>,
    /// Nesting depth of `fire` on the holding thread.
    depth: Cell<usize>,
}

/// Restores the nesting depth even if a callback panics.
struct Nested<'a>(&'a Cell<usize>);

impl<'a> Nested<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for Nested<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// Fires deliveries one at a time, discarding stale ones.
#[derive(Debug, Default)]
pub(crate) struct Dispatcher {
    gate: ReentrantMutex<GateState>,
}

impl Dispatcher {
    /// Invokes the frame callback then the tick callback.
    ///
    /// Blocks while another thread is firing. Returns false if the delivery
    /// was stale and dropped.
    pub fn fire(&self, delivery: Delivery) -> bool {
        let state = self.gate.lock();
        let previous = state.last_fired.get();
        if previous > delivery.seq {
            log::trace!(
                "Dropping stale delivery {} (already fired {previous})",
                delivery.seq
            );
            return false;
        }
        state.last_fired.set(delivery.seq);

        let _nested = Nested::enter(&state.depth);
        (delivery.callbacks.on_frame)(&delivery.frame);
        if state.last_fired.get() == delivery.seq {
            (delivery.callbacks.on_tick)(delivery.millis);
        } else {
            log::trace!("Delivery {} superseded before its tick", delivery.seq);
        }
        true
    }

    /// Whether the calling thread is inside a callback fired by this
    /// dispatcher.
    pub fn is_firing_here(&self) -> bool {
        self.gate
            .try_lock()
            .is_some_and(|state| state.depth.get() > 0)
    }
}
