// SPDX-License-Identifier: MPL-2.0
//! Playback session state.
//!
//! A [`Session`] is everything the player's single lock guards: the opened
//! backend handles, stream metadata, the playback status, pacing, the one
//! current frame, the registered callbacks and the pump's join handle.
//!
//! Status transitions:
//! - Stop: no pump running (initial state, after `stop` or end of stream)
//! - Playing: the pump fetches and delivers one frame per pace interval
//! - Pause: the pump is alive but suspended

use super::dispatch::{Callbacks, Delivery};
use super::frame::Frame;
use super::playback_speed::PlaybackSpeed;
use super::time_units::{ticks_to_millis, ticks_to_secs, MILLIS_PER_SECOND};
use crate::backend::{DecodeStep, MediaInput, PacketRead, StreamDecoder, StreamInfo};
use crate::config::defaults::FALLBACK_TICKS_PER_SECOND;
use crate::error::VideoError;
use std::thread::JoinHandle;
use std::time::Duration;

/// Playback status reported by [`VideoPlayer::status`](super::VideoPlayer::status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Stop,
    Playing,
    Pause,
}

impl Status {
    /// Returns true if a pump thread is expected to be alive.
    pub fn is_active(self) -> bool {
        !matches!(self, Status::Stop)
    }
}

/// Metadata of the opened stream, zeroed when no source is open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub duration_ms: i64,
    pub ticks_per_second: f64,
}

impl Default for StreamMetadata {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            duration_ms: 0,
            ticks_per_second: FALLBACK_TICKS_PER_SECOND,
        }
    }
}

impl StreamMetadata {
    pub fn total_secs(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let millis = self.duration_ms as f64;
        millis / MILLIS_PER_SECOND
    }
}

/// Backend handles of an opened source.
pub(crate) struct OpenMedia<I: MediaInput> {
    input: I,
    decoder: I::Decoder,
    stream: StreamInfo,
    /// Set once end-of-stream was signalled to the decoder.
    draining: bool,
}

impl<I: MediaInput> OpenMedia<I> {
    pub fn new(input: I, decoder: I::Decoder, stream: StreamInfo) -> Self {
        Self {
            input,
            decoder,
            stream,
            draining: false,
        }
    }

    pub fn stream(&self) -> &StreamInfo {
        &self.stream
    }

    /// Decodes the next frame of the selected stream.
    ///
    /// Returns `None` once the stream is exhausted: end of stream after the
    /// decoder was drained, an unrecoverable decode error, or too many
    /// consecutive read errors. The reason is logged.
    pub fn next_frame(&mut self, max_read_errors: u32) -> Option<Frame> {
        let mut read_errors = 0;

        loop {
            match self.decoder.receive_frame() {
                DecodeStep::Frame(frame) if frame.is_empty() => {
                    log::debug!("Skipping empty frame at pts {}", frame.pts());
                    continue;
                }
                DecodeStep::Frame(frame) => return Some(frame),
                DecodeStep::NeedMoreInput if !self.draining => {}
                DecodeStep::NeedMoreInput | DecodeStep::EndOfStream => {
                    log::debug!("End of stream reached");
                    return None;
                }
                DecodeStep::Failed(err) => {
                    log::error!("Frame decoding aborted: {err}");
                    return None;
                }
            }

            // Feed exactly one packet of the selected stream (or the drain signal)
            loop {
                match self.input.next_packet() {
                    PacketRead::Packet {
                        stream_index,
                        packet,
                    } if stream_index == self.stream.index => {
                        if let Err(err) = self.decoder.send_packet(&packet) {
                            log::error!("Frame decoding aborted: {err}");
                            return None;
                        }
                        break;
                    }
                    PacketRead::Packet { .. } => {}
                    PacketRead::Error(err) => {
                        read_errors += 1;
                        log::warn!("Skipping unreadable packet: {err}");
                        if read_errors >= max_read_errors {
                            log::error!("Giving up after {read_errors} consecutive read errors");
                            return None;
                        }
                    }
                    PacketRead::EndOfStream => {
                        if let Err(err) = self.decoder.send_eof() {
                            log::error!("Cannot drain decoder: {err}");
                            return None;
                        }
                        self.draining = true;
                        break;
                    }
                }
            }
        }
    }

    /// Drops buffered demuxer and decoder state, then repositions on the
    /// nearest keyframe at or before `pts`.
    pub fn rewind_to(&mut self, pts: i64) -> Result<(), VideoError> {
        self.input.flush()?;
        self.decoder.flush();
        self.draining = false;
        self.input
            .seek_to_preceding_keyframe(self.stream.index, pts)
    }
}

/// Mutable state of one player, guarded by a single lock.
pub(crate) struct Session<I: MediaInput> {
    pub media: Option<OpenMedia<I>>,
    pub metadata: StreamMetadata,
    pub status: Status,
    pub speed: PlaybackSpeed,
    /// Frame interval at 1.0x.
    pub base_interval: Duration,
    /// Speed-adjusted frame interval used by the pump.
    pub pace_interval: Duration,
    pub current_frame: Option<Frame>,
    pub callbacks: Option<Callbacks>,
    pub pump: Option<JoinHandle<()>>,
    /// Identifies the pump allowed to run; bumped on every start and stop.
    pub pump_epoch: u64,
    last_delivery: u64,
}

impl<I: MediaInput> Session<I> {
    pub fn new(fallback_interval: Duration) -> Self {
        Self {
            media: None,
            metadata: StreamMetadata::default(),
            status: Status::Stop,
            speed: PlaybackSpeed::default(),
            base_interval: fallback_interval,
            pace_interval: fallback_interval,
            current_frame: None,
            callbacks: None,
            pump: None,
            pump_epoch: 0,
            last_delivery: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.media.is_some()
    }

    /// Returns true while the pump started with `epoch` may keep running.
    pub fn pump_may_run(&self, epoch: u64) -> bool {
        self.pump_epoch == epoch && self.status.is_active()
    }

    /// Pulls the next frame and installs it as the current frame.
    pub fn retrieve_frame(&mut self, max_read_errors: u32) -> Option<Frame> {
        let frame = self.media.as_mut()?.next_frame(max_read_errors)?;
        self.current_frame = Some(frame.clone());
        Some(frame)
    }

    pub fn frame_secs(&self, frame: &Frame) -> f64 {
        ticks_to_secs(frame.pts(), self.metadata.ticks_per_second)
    }

    pub fn frame_millis(&self, frame: &Frame) -> i64 {
        ticks_to_millis(frame.pts(), self.metadata.ticks_per_second)
    }

    /// Packages `frame` for delivery outside the lock, or `None` if no
    /// callbacks are registered.
    pub fn delivery(&mut self, frame: Frame) -> Option<Delivery> {
        let callbacks = self.callbacks.clone()?;
        self.last_delivery += 1;
        let millis = self.frame_millis(&frame);
        Some(Delivery::new(self.last_delivery, frame, millis, callbacks))
    }

    /// Releases backend handles and forgets everything tied to the source.
    ///
    /// The delivery counter survives so sequence numbers stay monotonic for
    /// the lifetime of the player.
    pub fn release(&mut self, fallback_interval: Duration) {
        self.status = Status::Stop;
        self.media = None;
        self.metadata = StreamMetadata::default();
        self.speed = PlaybackSpeed::default();
        self.base_interval = fallback_interval;
        self.pace_interval = fallback_interval;
        self.current_frame = None;
        self.callbacks = None;
    }
}
