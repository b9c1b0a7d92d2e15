// SPDX-License-Identifier: MPL-2.0
//! Public playback control surface.
//!
//! [`VideoPlayer`] drives one media source at a time through a
//! [`DecodingBackend`]. All state lives behind one lock shared with the pump
//! thread; every operation takes `&self`, so a player can be shared through an
//! `Arc` and driven from several threads.
//!
//! # Design Notes
//!
//! - Failures never cross this boundary as errors: operations return `bool` or
//!   `Option` and log the reason
//! - Callbacks run outside the lock, on the pump thread or on the thread
//!   calling `seek`/`toggle_pause`, and may call back into the player
//! - Callbacks are serialized: frames arrive in decode order, each followed
//!   by its tick
//! - `stop` waits for the pump to exit unless called from inside a callback
//!
//! # Example
//!
//! ```
//! use vdec_player::backend::memory::{MemoryBackend, MemoryClip};
//! use vdec_player::{Status, VideoPlayer};
//!
//! let backend = MemoryBackend::new().with_clip("clip.mp4", MemoryClip::new(320, 240, 25, 4.0));
//! let player = VideoPlayer::new(backend);
//!
//! assert!(player.open("clip.mp4"));
//! assert!(player.set_callback(|_frame| {}, |_millis| {}));
//! assert!(player.start());
//! assert_eq!(player.status(), Status::Playing);
//!
//! player.seek(2.0);
//! assert!(player.current_pts() > 0);
//!
//! assert!(player.stop());
//! assert_eq!(player.current_pts(), 0);
//! ```

use super::dispatch::{Callbacks, Dispatcher};
use super::frame::{Frame, RgbImage};
use super::playback_speed::{base_pace_interval, PlaybackSpeed};
use super::pump::{self, PUMP_THREAD_NAME};
use super::seek::{self, SeekOutcome};
use super::state::{OpenMedia, Session, Status, StreamMetadata};
use super::time_units::{duration_millis, ticks_per_second};
use crate::backend::{DecodingBackend, MediaInput};
use crate::config::PlayerConfig;
use crate::error::VideoError;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// State shared between the player handle and its pump thread.
pub(crate) struct Shared<B: DecodingBackend> {
    pub backend: B,
    pub config: PlayerConfig,
    pub session: Mutex<Session<B::Input>>,
    /// Signalled on every status change so the pump reacts without polling.
    pub wake: Condvar,
    pub dispatcher: Dispatcher,
}

/// Playback engine over a decoding backend.
pub struct VideoPlayer<B: DecodingBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: DecodingBackend> VideoPlayer<B> {
    /// Creates a player with the default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, PlayerConfig::default())
    }

    pub fn with_config(backend: B, config: PlayerConfig) -> Self {
        let config = config.validated();
        let session = Session::new(config.fallback_pace_interval());
        Self {
            shared: Arc::new(Shared {
                backend,
                config,
                session: Mutex::new(session),
                wake: Condvar::new(),
                dispatcher: Dispatcher::default(),
            }),
        }
    }

    /// Closes any current source, then opens `source`.
    ///
    /// On success the player is stopped at the start of the stream with fresh
    /// metadata and speed 1.0. On failure nothing stays open.
    pub fn open(&self, source: &str) -> bool {
        self.stop();

        let mut session = self.shared.session.lock();
        let media = match self.open_media(source) {
            Ok(media) => media,
            Err(err) => {
                log::error!("Cannot open {source}: {err}");
                return false;
            }
        };

        let stream = media.stream();
        let tps = ticks_per_second(stream.time_base.num, stream.time_base.den);
        session.metadata = StreamMetadata {
            width: stream.width,
            height: stream.height,
            duration_ms: duration_millis(stream.duration_ticks, tps),
            ticks_per_second: tps,
        };
        session.base_interval =
            base_pace_interval(stream.avg_frame_rate, self.shared.config.fallback_pace_interval());
        session.speed = PlaybackSpeed::default();
        session.pace_interval = session.base_interval;
        log::info!(
            "Opened {source}: {}x{} {} stream, {:.3}s, {:?} per frame",
            stream.width,
            stream.height,
            stream.codec_name,
            session.metadata.total_secs(),
            session.base_interval
        );
        session.media = Some(media);
        true
    }

    fn open_media(&self, source: &str) -> Result<OpenMedia<B::Input>, VideoError> {
        let input = self.shared.backend.open_media(source)?;
        let stream = input.best_video_stream()?;
        let decoder = input.open_decoder(&stream, self.shared.config.decoder_threads)?;
        Ok(OpenMedia::new(input, decoder, stream))
    }

    /// Starts the pump. Requires an open source, registered callbacks and a
    /// stopped player.
    pub fn start(&self) -> bool {
        let mut session = self.shared.session.lock();
        if !Self::can_start(&session) {
            return false;
        }

        // Reap a pump that ended on its own. Inside a callback it may still be
        // waiting on the dispatcher, so leave it to the epoch bump instead.
        if let Some(finished) = session.pump.take() {
            if self.shared.dispatcher.is_firing_here() {
                log::debug!("start called from a callback; previous pump not joined");
            } else {
                MutexGuard::unlocked(&mut session, || join_pump(finished));
            }
            if !Self::can_start(&session) {
                return false;
            }
        }

        session.pump_epoch += 1;
        let epoch = session.pump_epoch;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(PUMP_THREAD_NAME.to_string())
            .spawn(move || pump::run(shared, epoch));
        match spawned {
            Ok(handle) => {
                session.status = Status::Playing;
                session.pump = Some(handle);
                true
            }
            Err(err) => {
                log::error!("Cannot spawn {PUMP_THREAD_NAME} thread: {err}");
                false
            }
        }
    }

    fn can_start(session: &Session<B::Input>) -> bool {
        if !session.is_open() {
            log::warn!("start: no source is open");
            false
        } else if session.callbacks.is_none() {
            log::warn!("start: no callback registered");
            false
        } else if session.status != Status::Stop {
            log::warn!("start: already {:?}", session.status);
            false
        } else {
            true
        }
    }

    /// Pauses (`true`) or resumes (`false`) a started player.
    ///
    /// Fails on a stopped player, which has no pump to pause or resume.
    pub fn pause(&self, want_pause: bool) -> bool {
        let mut session = self.shared.session.lock();
        self.set_paused(&mut session, want_pause)
    }

    fn set_paused(&self, session: &mut Session<B::Input>, want_pause: bool) -> bool {
        match session.status {
            Status::Stop => {
                log::warn!("pause({want_pause}): player is stopped");
                false
            }
            _ => {
                session.status = if want_pause {
                    Status::Pause
                } else {
                    Status::Playing
                };
                self.shared.wake.notify_all();
                true
            }
        }
    }

    /// Toggles between playing and paused.
    ///
    /// On a stopped player with an open source, rewinds to the start and
    /// plays again.
    pub fn toggle_pause(&self) -> bool {
        let mut session = self.shared.session.lock();
        let status = session.status;
        match status {
            Status::Playing => self.set_paused(&mut session, true),
            Status::Pause => self.set_paused(&mut session, false),
            Status::Stop if session.is_open() => {
                drop(session);
                self.seek(0.0);
                self.start()
            }
            Status::Stop => {
                log::warn!("toggle_pause: no source is open");
                false
            }
        }
    }

    /// Stops playback and releases the source.
    ///
    /// Waits for the pump thread to exit, except when called from inside a
    /// callback. Always succeeds.
    pub fn stop(&self) -> bool {
        let pump = {
            let mut session = self.shared.session.lock();
            session.pump_epoch += 1;
            session.release(self.shared.config.fallback_pace_interval());
            self.shared.wake.notify_all();
            session.pump.take()
        };

        // The pump only touches the source under the lock after checking its
        // epoch, so releasing before the join is safe.
        if let Some(pump) = pump {
            if pump.thread().id() == thread::current().id() {
                log::debug!("stop called from the pump thread; not joining");
            } else if self.shared.dispatcher.is_firing_here() {
                // The pump may be waiting for this callback to return
                log::debug!("stop called from a callback; pump exits on its own");
            } else {
                join_pump(pump);
            }
        }
        true
    }

    /// Repositions to `target_secs`, clamped to `[0, total_time]`.
    ///
    /// Delivers the landed frame through the callbacks before returning and
    /// restores the previous status. Seeking past the last frame stops the
    /// player. Without an open source this does nothing.
    pub fn seek(&self, target_secs: f64) {
        let config = &self.shared.config;
        let mut session = self.shared.session.lock();
        if !session.is_open() {
            log::debug!("seek: no source is open");
            return;
        }

        let target = seek::clamp_target(target_secs, session.metadata.total_secs());
        let previous = session.status;
        session.status = Status::Pause;

        let outcome = seek::reposition(
            &mut *session,
            target,
            config.seek_tolerance_secs(),
            config.max_consecutive_read_errors,
        );
        match outcome {
            Some(SeekOutcome::Landed(frame)) => {
                if let Some(delivery) = session.delivery(frame) {
                    MutexGuard::unlocked(&mut session, || {
                        self.shared.dispatcher.fire(delivery);
                    });
                }
                // A callback may have stopped or resumed the player meanwhile
                if session.status == Status::Pause {
                    session.status = previous;
                }
            }
            Some(SeekOutcome::Exhausted) => {
                log::info!("Seek to {target:.3}s reached the end of the stream");
                session.status = Status::Stop;
            }
            Some(SeekOutcome::Failed(err)) => {
                log::warn!("Seek to {target:.3}s failed: {err}");
                session.status = previous;
            }
            None => session.status = previous,
        }
        self.shared.wake.notify_all();
    }

    /// Registers the frame and tick callbacks. Requires an open source.
    ///
    /// `on_frame` receives each delivered frame, then `on_tick` receives its
    /// presentation time in milliseconds.
    pub fn set_callback<F, T>(&self, on_frame: F, on_tick: T) -> bool
    where
        F: Fn(&Frame) + Send + Sync + 'static,
        T: Fn(i64) + Send + Sync + 'static,
    {
        let mut session = self.shared.session.lock();
        if !session.is_open() {
            log::warn!("set_callback: no source is open");
            return false;
        }
        session.callbacks = Some(Callbacks::new(on_frame, on_tick));
        true
    }

    /// Sets the speed multiplier (`0.1..=3.0`). Requires an open source.
    ///
    /// Takes effect from the next frame.
    pub fn set_video_speed(&self, multiplier: f64) -> bool {
        let mut session = self.shared.session.lock();
        if !session.is_open() {
            log::warn!("set_video_speed: no source is open");
            return false;
        }
        let Some(speed) = PlaybackSpeed::try_new(multiplier) else {
            log::warn!("set_video_speed: {multiplier} is out of range");
            return false;
        };
        session.speed = speed;
        session.pace_interval = speed.scale(session.base_interval);
        true
    }

    /// Width of the open stream, 0 if none.
    pub fn width(&self) -> u32 {
        self.shared.session.lock().metadata.width
    }

    /// Height of the open stream, 0 if none.
    pub fn height(&self) -> u32 {
        self.shared.session.lock().metadata.height
    }

    /// Duration of the open stream in seconds, 0 if none.
    pub fn total_time(&self) -> f64 {
        self.shared.session.lock().metadata.total_secs()
    }

    pub fn status(&self) -> Status {
        self.shared.session.lock().status
    }

    /// Raw timestamp of the current frame in stream ticks, 0 if none.
    pub fn current_pts(&self) -> i64 {
        self.shared
            .session
            .lock()
            .current_frame
            .as_ref()
            .map_or(0, Frame::pts)
    }

    /// An independent handle to the current frame.
    pub fn current_frame(&self) -> Option<Frame> {
        self.shared.session.lock().current_frame.clone()
    }

    /// Packed RGB24 copy of the current frame.
    ///
    /// `None` if no frame is cached, the conversion fails, or it produces
    /// fewer than `width × height` pixels.
    pub fn current_rgb(&self) -> Option<RgbImage> {
        let session = self.shared.session.lock();
        let frame = session.current_frame.clone()?;
        let rgb = match self.shared.backend.convert_to_rgb(&frame) {
            Ok(rgb) => rgb,
            Err(err) => {
                log::warn!("Cannot snapshot frame at pts {}: {err}", frame.pts());
                return None;
            }
        };
        drop(session);

        let expected = RgbImage::expected_len(frame.width(), frame.height());
        if !rgb.is_complete() || rgb.data().len() != expected {
            log::warn!(
                "Incomplete RGB snapshot: {} of {expected} bytes",
                rgb.data().len()
            );
            return None;
        }
        Some(rgb)
    }

    /// Current speed multiplier.
    pub fn video_speed(&self) -> f64 {
        self.shared.session.lock().speed.value()
    }

    /// Interval between two delivered frames at the current speed.
    pub fn pace_interval(&self) -> Duration {
        self.shared.session.lock().pace_interval
    }

    /// Build configuration of the backend.
    pub fn configuration(&self) -> String {
        self.shared.backend.configuration()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }
}

impl<B: DecodingBackend> Drop for VideoPlayer<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_pump(pump: JoinHandle<()>) {
    if pump.join().is_err() {
        log::error!("{PUMP_THREAD_NAME} thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, MemoryClip};
    use crate::test_utils::{init_logging, wait_until};

    fn player() -> VideoPlayer<MemoryBackend> {
        let backend = MemoryBackend::new().with_clip("clip", MemoryClip::new(64, 36, 25, 2.0));
        VideoPlayer::new(backend)
    }

    #[test]
    fn open_populates_metadata() {
        let player = player();
        assert!(player.open("clip"));

        assert_eq!(player.width(), 64);
        assert_eq!(player.height(), 36);
        assert_eq!(player.total_time(), 2.0);
        assert_eq!(player.status(), Status::Stop);
        assert_eq!(player.pace_interval(), Duration::from_millis(40));
    }

    #[test]
    fn failed_open_leaves_player_closed() {
        let player = player();
        assert!(player.open("clip"));
        assert!(!player.open("missing"));

        assert_eq!(player.width(), 0);
        assert_eq!(player.total_time(), 0.0);
        assert!(!player.set_callback(|_| {}, |_| {}));
    }

    #[test]
    fn start_requires_source_and_callback() {
        let player = player();
        assert!(!player.start());

        assert!(player.open("clip"));
        assert!(!player.start());

        assert!(player.set_callback(|_| {}, |_| {}));
        assert!(player.start());
        assert!(!player.start());
    }

    #[test]
    fn speed_is_validated_and_reset_on_open() {
        let player = player();
        assert!(!player.set_video_speed(2.0));

        assert!(player.open("clip"));
        assert!(player.set_video_speed(2.0));
        assert_eq!(player.pace_interval(), Duration::from_millis(20));

        assert!(!player.set_video_speed(3.5));
        assert_eq!(player.pace_interval(), Duration::from_millis(20));

        assert!(player.open("clip"));
        assert_eq!(player.video_speed(), 1.0);
        assert_eq!(player.pace_interval(), Duration::from_millis(40));
    }

    #[test]
    fn pause_rejected_when_stopped() {
        let player = player();
        assert!(player.open("clip"));
        assert!(!player.pause(true));
        assert!(!player.pause(false));
        assert_eq!(player.status(), Status::Stop);
    }

    #[test]
    fn configured_fallback_interval_is_used_without_frame_rate() {
        let clip = MemoryClip::new(8, 8, 25, 1.0).with_frame_rate(None);
        let backend = MemoryBackend::new().with_clip("clip", clip);
        let config = PlayerConfig {
            fallback_pace_interval_micros: 10_000,
            ..PlayerConfig::default()
        };
        let player = VideoPlayer::with_config(backend, config);

        assert!(player.open("clip"));
        assert_eq!(player.pace_interval(), Duration::from_millis(10));
    }

    #[test]
    fn snapshot_requires_a_frame() {
        let player = player();
        assert!(player.open("clip"));
        assert!(player.current_rgb().is_none());

        player.seek(1.0);
        let rgb = player.current_rgb().expect("frame cached after seek");
        assert_eq!(rgb.data().len(), 64 * 36 * 3);
    }

    #[test]
    fn playback_stops_at_end_of_stream() {
        init_logging();
        let backend = MemoryBackend::new().with_clip("clip", MemoryClip::new(8, 8, 100, 0.2));
        let player = VideoPlayer::new(backend);
        assert!(player.open("clip"));
        assert!(player.set_callback(|_| {}, |_| {}));
        assert!(player.start());

        assert!(wait_until(Duration::from_secs(5), || player.status() == Status::Stop));
        // the last frame stays cached and the source stays open
        assert_eq!(player.current_pts(), 19 * 900);
        assert!(player.toggle_pause());
        assert_eq!(player.status(), Status::Playing);
    }

    #[test]
    fn drop_stops_the_pump() {
        let backend = MemoryBackend::new().with_clip("clip", MemoryClip::new(8, 8, 25, 60.0));
        let stats = backend.stats();
        {
            let player = VideoPlayer::new(backend);
            assert!(player.open("clip"));
            assert!(player.set_callback(|_| {}, |_| {}));
            assert!(player.start());
        }
        assert_eq!(stats.live_inputs(), 0);
    }
}
