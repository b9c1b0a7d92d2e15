// SPDX-License-Identifier: MPL-2.0
//! Decoding backend port.
//!
//! The playback engine never demuxes, decodes or converts pixels itself. It
//! drives a backend through the traits in this module:
//!
//! - [`DecodingBackend`] opens sources and converts frames to RGB
//! - [`MediaInput`] is one opened source (demuxer): packets, flush, seek
//! - [`StreamDecoder`] turns packets of the selected stream into [`Frame`]s
//!
//! # Design Notes
//!
//! - All calls are synchronous; the player serializes them under its session lock
//! - Implementations must be `Send` so the pump thread can own the session
//! - Errors use [`VideoError`]; the player logs them and never propagates them
//!
//! [`Frame`]: crate::video_player::Frame

#[cfg(feature = "backend-ffmpeg")]
pub mod ffmpeg;
pub mod memory;

use crate::error::VideoError;
use crate::video_player::{Frame, RgbImage};

/// A rational number `num / den`, as used for timebases and frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Returns the value as f64, or `None` if the denominator is zero.
    pub fn to_f64(self) -> Option<f64> {
        (self.den != 0).then(|| f64::from(self.num) / f64::from(self.den))
    }
}

/// Metadata of the selected video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Index of the stream inside its container.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// Timestamp unit in seconds (`num/den`).
    pub time_base: Rational,
    /// Average frame rate, if the container reports one.
    pub avg_frame_rate: Option<Rational>,
    /// Stream duration in `time_base` ticks, if known.
    pub duration_ticks: Option<i64>,
    /// Short codec name for diagnostics.
    pub codec_name: String,
}

/// Outcome of reading one packet from a [`MediaInput`].
#[derive(Debug)]
pub enum PacketRead<P> {
    /// A demuxed packet and the index of the stream it belongs to.
    Packet { stream_index: usize, packet: P },
    /// The container has no more packets.
    EndOfStream,
    /// The read failed but later reads may succeed.
    Error(VideoError),
}

/// Outcome of asking a [`StreamDecoder`] for a frame.
#[derive(Debug)]
pub enum DecodeStep {
    Frame(Frame),
    /// The decoder needs another packet before it can output a frame.
    NeedMoreInput,
    /// The decoder was drained and holds no more frames.
    EndOfStream,
    Failed(VideoError),
}

/// Entry point of a backend.
pub trait DecodingBackend: Send + Sync + 'static {
    type Input: MediaInput;

    /// Opens and probes a media source.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::SourceUnavailable`] if the source cannot be
    /// opened or probed.
    fn open_media(&self, source: &str) -> Result<Self::Input, VideoError>;

    /// Converts a frame produced by this backend into packed RGB24.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::ConversionFailed`] if the frame's pixel layout
    /// cannot be converted.
    fn convert_to_rgb(&self, frame: &Frame) -> Result<RgbImage, VideoError>;

    /// Human-readable build configuration of the backend.
    fn configuration(&self) -> String;
}

/// One opened media source.
pub trait MediaInput: Send + 'static {
    type Packet: Send;
    type Decoder: StreamDecoder<Packet = Self::Packet>;

    /// Picks the best video stream of the source.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::NoVideoStream`] if the source has none.
    fn best_video_stream(&self) -> Result<StreamInfo, VideoError>;

    /// Creates and opens a decoder for `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::UnsupportedCodec`] or [`VideoError::DecoderInit`].
    fn open_decoder(&self, stream: &StreamInfo, threads: usize)
        -> Result<Self::Decoder, VideoError>;

    /// Reads the next packet of any stream.
    fn next_packet(&mut self) -> PacketRead<Self::Packet>;

    /// Discards buffered demuxer state.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::SeekFailed`] if the demuxer cannot be flushed.
    fn flush(&mut self) -> Result<(), VideoError>;

    /// Repositions to the nearest keyframe at or before `pts` (stream ticks).
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::SeekFailed`] if the demuxer rejects the seek.
    fn seek_to_preceding_keyframe(&mut self, stream_index: usize, pts: i64)
        -> Result<(), VideoError>;
}

/// Decoder bound to one stream of a [`MediaInput`].
pub trait StreamDecoder: Send + 'static {
    type Packet;

    /// Submits one packet.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::DecodingFailed`] if the packet is rejected.
    fn send_packet(&mut self, packet: &Self::Packet) -> Result<(), VideoError>;

    /// Signals end of input so buffered frames can be drained.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::DecodingFailed`] if the decoder refuses the signal.
    fn send_eof(&mut self) -> Result<(), VideoError>;

    fn receive_frame(&mut self) -> DecodeStep;

    /// Drops all buffered decode state (after a seek).
    fn flush(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_to_f64() {
        assert_eq!(Rational::new(1, 4).to_f64(), Some(0.25));
        assert_eq!(Rational::new(1, 0).to_f64(), None);
    }
}
