// SPDX-License-Identifier: MPL-2.0
//! Scripted in-memory backend.
//!
//! [`MemoryBackend`] serves synthetic clips registered under a source name.
//! Each clip is a solid-color video stream with configurable frame rate,
//! keyframe interval and decoder delay, optionally interleaved with audio
//! packets and injected failures. It exists so playback can be exercised
//! deterministically without media files or native libraries.
//!
//! # Example
//!
//! ```
//! use vdec_player::backend::memory::{MemoryBackend, MemoryClip};
//! use vdec_player::VideoPlayer;
//!
//! let backend = MemoryBackend::new().with_clip("clip.mp4", MemoryClip::new(64, 36, 20, 2.0));
//! let player = VideoPlayer::new(backend);
//!
//! assert!(player.open("clip.mp4"));
//! assert_eq!(player.width(), 64);
//! assert_eq!(player.total_time(), 2.0);
//! ```

use super::{
    DecodeStep, DecodingBackend, MediaInput, PacketRead, Rational, StreamDecoder, StreamInfo,
};
use crate::error::VideoError;
use crate::video_player::frame::pack_rows;
use crate::video_player::{Frame, PixelBuffer, RgbImage};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Ticks per second of every synthetic stream.
pub const MEMORY_TICKS_PER_SECOND: i32 = 90_000;

const VIDEO_STREAM_INDEX: usize = 0;
const AUDIO_STREAM_INDEX: usize = 1;

/// Bytes of padding appended to every synthetic pixel row.
const ROW_PADDING: usize = 8;

/// How [`MemoryBackend::convert_to_rgb`] behaves for a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionMode {
    #[default]
    Full,
    /// Produces only half of the scanlines.
    Truncated,
    Fail,
}

/// Description of one synthetic clip.
#[derive(Debug, Clone)]
pub struct MemoryClip {
    pub width: u32,
    pub height: u32,
    /// Frame rate advertised in the stream metadata (`None` = unknown).
    pub frame_rate: Option<Rational>,
    /// Number of video frames in the stream.
    pub frame_count: usize,
    /// Tick distance between consecutive frames.
    pub frame_ticks: i64,
    /// A keyframe every `gop_size` frames.
    pub gop_size: usize,
    /// Packets the decoder buffers before emitting the first frame.
    pub decoder_delay: usize,
    /// Stream duration in ticks (`None` = unknown).
    pub duration_ticks: Option<i64>,
    /// Emit an audio packet ahead of every video packet.
    pub interleaved_audio: bool,
    /// Video frame indexes preceded by one transient read error.
    pub read_errors: Vec<usize>,
    /// Video frame indexes whose packet fails to decode.
    pub corrupt_frames: Vec<usize>,
    pub has_video: bool,
    pub codec_supported: bool,
    pub fail_seeks: bool,
    pub conversion: ConversionMode,
    /// Packed RGB color of every pixel.
    pub color: [u8; 3],
}

impl MemoryClip {
    /// A clip of `duration_secs` at `fps` frames per second with a keyframe
    /// every second.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(width: u32, height: u32, fps: i32, duration_secs: f64) -> Self {
        let fps = fps.max(1);
        let frame_ticks = i64::from(MEMORY_TICKS_PER_SECOND / fps);
        let frame_count = (duration_secs * f64::from(fps)).round().max(0.0) as usize;
        Self {
            width,
            height,
            frame_rate: Some(Rational::new(fps, 1)),
            frame_count,
            frame_ticks,
            gop_size: fps as usize,
            decoder_delay: 0,
            duration_ticks: Some(frame_count as i64 * frame_ticks),
            interleaved_audio: false,
            read_errors: Vec::new(),
            corrupt_frames: Vec::new(),
            has_video: true,
            codec_supported: true,
            fail_seeks: false,
            conversion: ConversionMode::Full,
            color: [0x20, 0x80, 0xc0],
        }
    }

    #[must_use]
    pub fn with_gop_size(mut self, gop_size: usize) -> Self {
        self.gop_size = gop_size.max(1);
        self
    }

    #[must_use]
    pub fn with_decoder_delay(mut self, packets: usize) -> Self {
        self.decoder_delay = packets;
        self
    }

    #[must_use]
    pub fn with_interleaved_audio(mut self) -> Self {
        self.interleaved_audio = true;
        self
    }

    #[must_use]
    pub fn with_read_error_before(mut self, frame_index: usize) -> Self {
        self.read_errors.push(frame_index);
        self
    }

    #[must_use]
    pub fn with_corrupt_frame(mut self, frame_index: usize) -> Self {
        self.corrupt_frames.push(frame_index);
        self
    }

    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: Option<Rational>) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    #[must_use]
    pub fn with_duration_ticks(mut self, duration_ticks: Option<i64>) -> Self {
        self.duration_ticks = duration_ticks;
        self
    }

    #[must_use]
    pub fn without_video(mut self) -> Self {
        self.has_video = false;
        self
    }

    #[must_use]
    pub fn with_unsupported_codec(mut self) -> Self {
        self.codec_supported = false;
        self
    }

    #[must_use]
    pub fn with_failing_seeks(mut self) -> Self {
        self.fail_seeks = true;
        self
    }

    #[must_use]
    pub fn with_conversion(mut self, conversion: ConversionMode) -> Self {
        self.conversion = conversion;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    fn stride(&self) -> usize {
        self.width as usize * RgbImage::BYTES_PER_PIXEL + ROW_PADDING
    }

    fn pixels(&self) -> Arc<[u8]> {
        let row_bytes = self.width as usize * RgbImage::BYTES_PER_PIXEL;
        let mut pixels = Vec::with_capacity(self.stride() * self.height as usize);
        for _ in 0..self.height {
            for _ in 0..self.width {
                pixels.extend_from_slice(&self.color);
            }
            pixels.resize(pixels.len() + self.stride() - row_bytes, 0);
        }
        pixels.into()
    }
}

/// Counters shared by a [`MemoryBackend`] and everything it opened.
#[derive(Debug, Default)]
pub struct MemoryStats {
    opened: AtomicUsize,
    live_inputs: AtomicUsize,
    seeks: AtomicUsize,
    decoded_frames: AtomicUsize,
}

impl MemoryStats {
    /// Sources successfully opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Inputs currently alive (not yet released).
    pub fn live_inputs(&self) -> usize {
        self.live_inputs.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub fn decoded_frames(&self) -> usize {
        self.decoded_frames.load(Ordering::SeqCst)
    }
}

/// Backend serving registered [`MemoryClip`]s.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    clips: HashMap<String, MemoryClip>,
    stats: Arc<MemoryStats>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `clip` under `source`.
    #[must_use]
    pub fn with_clip(mut self, source: impl Into<String>, clip: MemoryClip) -> Self {
        self.clips.insert(source.into(), clip);
        self
    }

    pub fn stats(&self) -> Arc<MemoryStats> {
        Arc::clone(&self.stats)
    }
}

impl DecodingBackend for MemoryBackend {
    type Input = MemoryInput;

    fn open_media(&self, source: &str) -> Result<MemoryInput, VideoError> {
        let clip = self
            .clips
            .get(source)
            .ok_or_else(|| VideoError::SourceUnavailable(format!("No such file: {source}")))?;
        Ok(MemoryInput::new(clip.clone(), Arc::clone(&self.stats)))
    }

    fn convert_to_rgb(&self, frame: &Frame) -> Result<RgbImage, VideoError> {
        let picture = frame.pixels_as::<MemoryPicture>().ok_or_else(|| {
            VideoError::ConversionFailed("frame was not produced by the memory backend".into())
        })?;

        let rows = match picture.conversion {
            ConversionMode::Full => frame.height() as usize,
            ConversionMode::Truncated => frame.height() as usize / 2,
            ConversionMode::Fail => {
                return Err(VideoError::ConversionFailed("conversion disabled".into()))
            }
        };
        let row_bytes = frame.width() as usize * RgbImage::BYTES_PER_PIXEL;
        let data = pack_rows(&picture.pixels, picture.stride, row_bytes, rows);
        #[allow(clippy::cast_possible_truncation)]
        Ok(RgbImage::new(frame.width(), rows as u32, data))
    }

    fn configuration(&self) -> String {
        format!("memory backend ({} synthetic clips)", self.clips.len())
    }
}

/// Packed RGB24 pixels of a synthetic frame.
#[derive(Debug)]
pub struct MemoryPicture {
    pixels: Arc<[u8]>,
    stride: usize,
    conversion: ConversionMode,
}

impl PixelBuffer for MemoryPicture {
    fn plane(&self, _index: usize) -> &[u8] {
        &self.pixels
    }

    fn stride(&self, _index: usize) -> usize {
        self.stride
    }

    fn format_name(&self) -> &str {
        "rgb24"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A synthetic demuxed packet.
#[derive(Debug, Clone)]
pub struct MemoryPacket {
    stream_index: usize,
    frame_index: usize,
    pts: i64,
    is_key: bool,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Audio(usize),
    ReadError,
    Video(usize),
}

/// An opened synthetic clip.
pub struct MemoryInput {
    clip: MemoryClip,
    timeline: Vec<Slot>,
    cursor: usize,
    pixels: Arc<[u8]>,
    stats: Arc<MemoryStats>,
}

impl MemoryInput {
    fn new(clip: MemoryClip, stats: Arc<MemoryStats>) -> Self {
        let mut timeline = Vec::new();
        for index in 0..clip.frame_count {
            if clip.interleaved_audio {
                timeline.push(Slot::Audio(index));
            }
            if clip.read_errors.contains(&index) {
                timeline.push(Slot::ReadError);
            }
            timeline.push(Slot::Video(index));
        }
        stats.opened.fetch_add(1, Ordering::SeqCst);
        stats.live_inputs.fetch_add(1, Ordering::SeqCst);
        let pixels = clip.pixels();
        Self {
            clip,
            timeline,
            cursor: 0,
            pixels,
            stats,
        }
    }

    fn packet(&self, stream_index: usize, frame_index: usize) -> MemoryPacket {
        #[allow(clippy::cast_possible_wrap)]
        let pts = frame_index as i64 * self.clip.frame_ticks;
        MemoryPacket {
            stream_index,
            frame_index,
            pts,
            is_key: frame_index % self.clip.gop_size.max(1) == 0,
        }
    }
}

impl Drop for MemoryInput {
    fn drop(&mut self) {
        self.stats.live_inputs.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MediaInput for MemoryInput {
    type Packet = MemoryPacket;
    type Decoder = MemoryDecoder;

    fn best_video_stream(&self) -> Result<StreamInfo, VideoError> {
        if !self.clip.has_video {
            return Err(VideoError::NoVideoStream);
        }
        Ok(StreamInfo {
            index: VIDEO_STREAM_INDEX,
            width: self.clip.width,
            height: self.clip.height,
            time_base: Rational::new(1, MEMORY_TICKS_PER_SECOND),
            avg_frame_rate: self.clip.frame_rate,
            duration_ticks: self.clip.duration_ticks,
            codec_name: "rawvideo".to_string(),
        })
    }

    fn open_decoder(
        &self,
        stream: &StreamInfo,
        _threads: usize,
    ) -> Result<MemoryDecoder, VideoError> {
        if !self.clip.codec_supported {
            return Err(VideoError::UnsupportedCodec(stream.codec_name.clone()));
        }
        Ok(MemoryDecoder {
            width: self.clip.width,
            height: self.clip.height,
            delay: self.clip.decoder_delay,
            corrupt_frames: self.clip.corrupt_frames.clone(),
            pending: VecDeque::new(),
            draining: false,
            pixels: Arc::clone(&self.pixels),
            stride: self.clip.stride(),
            conversion: self.clip.conversion,
            stats: Arc::clone(&self.stats),
        })
    }

    fn next_packet(&mut self) -> PacketRead<MemoryPacket> {
        let Some(slot) = self.timeline.get(self.cursor).copied() else {
            return PacketRead::EndOfStream;
        };
        self.cursor += 1;
        match slot {
            Slot::Audio(index) => PacketRead::Packet {
                stream_index: AUDIO_STREAM_INDEX,
                packet: self.packet(AUDIO_STREAM_INDEX, index),
            },
            Slot::ReadError => {
                PacketRead::Error(VideoError::Demux("synthetic transient read error".into()))
            }
            Slot::Video(index) => PacketRead::Packet {
                stream_index: VIDEO_STREAM_INDEX,
                packet: self.packet(VIDEO_STREAM_INDEX, index),
            },
        }
    }

    fn flush(&mut self) -> Result<(), VideoError> {
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn seek_to_preceding_keyframe(
        &mut self,
        stream_index: usize,
        pts: i64,
    ) -> Result<(), VideoError> {
        if self.clip.fail_seeks {
            return Err(VideoError::SeekFailed("seeking disabled for this clip".into()));
        }
        if stream_index != VIDEO_STREAM_INDEX {
            return Err(VideoError::SeekFailed(format!("no stream {stream_index}")));
        }
        self.stats.seeks.fetch_add(1, Ordering::SeqCst);

        let last = self.clip.frame_count.saturating_sub(1);
        let target = ((pts.max(0) / self.clip.frame_ticks.max(1)) as usize).min(last);
        let keyframe = target - target % self.clip.gop_size.max(1);

        // Land on the first slot belonging to the keyframe (its audio
        // companion or injected error included).
        self.cursor = self
            .timeline
            .iter()
            .position(|slot| match slot {
                Slot::Audio(index) | Slot::Video(index) => *index == keyframe,
                Slot::ReadError => false,
            })
            .unwrap_or(self.timeline.len());
        Ok(())
    }
}

/// Decoder of synthetic packets, with an optional output delay.
pub struct MemoryDecoder {
    width: u32,
    height: u32,
    delay: usize,
    corrupt_frames: Vec<usize>,
    pending: VecDeque<MemoryPacket>,
    draining: bool,
    pixels: Arc<[u8]>,
    stride: usize,
    conversion: ConversionMode,
    stats: Arc<MemoryStats>,
}

impl StreamDecoder for MemoryDecoder {
    type Packet = MemoryPacket;

    fn send_packet(&mut self, packet: &MemoryPacket) -> Result<(), VideoError> {
        if self.draining {
            return Err(VideoError::DecodingFailed("packet sent after end of stream".into()));
        }
        if packet.stream_index != VIDEO_STREAM_INDEX {
            return Err(VideoError::DecodingFailed(format!(
                "packet of stream {} sent to video decoder",
                packet.stream_index
            )));
        }
        self.pending.push_back(packet.clone());
        Ok(())
    }

    fn send_eof(&mut self) -> Result<(), VideoError> {
        self.draining = true;
        Ok(())
    }

    fn receive_frame(&mut self) -> DecodeStep {
        if self.pending.is_empty() {
            return if self.draining {
                DecodeStep::EndOfStream
            } else {
                DecodeStep::NeedMoreInput
            };
        }
        if !self.draining && self.pending.len() <= self.delay {
            return DecodeStep::NeedMoreInput;
        }
        let Some(packet) = self.pending.pop_front() else {
            return DecodeStep::NeedMoreInput;
        };
        if self.corrupt_frames.contains(&packet.frame_index) {
            return DecodeStep::Failed(VideoError::DecodingFailed(format!(
                "corrupt packet at frame {}",
                packet.frame_index
            )));
        }

        self.stats.decoded_frames.fetch_add(1, Ordering::SeqCst);
        let picture = MemoryPicture {
            pixels: Arc::clone(&self.pixels),
            stride: self.stride,
            conversion: self.conversion,
        };
        let frame = if packet.is_key {
            Frame::keyframe(packet.pts, self.width, self.height, picture)
        } else {
            Frame::new(packet.pts, self.width, self.height, picture)
        };
        DecodeStep::Frame(frame)
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(clip: MemoryClip) -> (MemoryInput, MemoryDecoder, StreamInfo) {
        let backend = MemoryBackend::new().with_clip("clip", clip);
        let input = backend.open_media("clip").expect("clip should open");
        let stream = input.best_video_stream().expect("clip has video");
        let decoder = input.open_decoder(&stream, 1).expect("codec supported");
        (input, decoder, stream)
    }

    fn next_video(input: &mut MemoryInput) -> Option<MemoryPacket> {
        loop {
            match input.next_packet() {
                PacketRead::Packet {
                    stream_index,
                    packet,
                } if stream_index == VIDEO_STREAM_INDEX => {
                    return Some(packet)
                }
                PacketRead::Packet { .. } | PacketRead::Error(_) => continue,
                PacketRead::EndOfStream => return None,
            }
        }
    }

    #[test]
    fn clip_metadata_matches_description() {
        let (_, _, stream) = open(MemoryClip::new(1920, 1080, 20, 10.0));

        assert_eq!(stream.width, 1920);
        assert_eq!(stream.height, 1080);
        assert_eq!(stream.avg_frame_rate, Some(Rational::new(20, 1)));
        assert_eq!(stream.duration_ticks, Some(900_000));
    }

    #[test]
    fn unknown_source_fails_to_open() {
        let backend = MemoryBackend::new();
        let result = backend.open_media("missing.mp4");
        assert!(matches!(result, Err(VideoError::SourceUnavailable(_))));
    }

    #[test]
    fn clip_without_video_has_no_stream() {
        let backend =
            MemoryBackend::new().with_clip("audio", MemoryClip::new(1, 1, 20, 1.0).without_video());
        let input = backend.open_media("audio").unwrap();
        assert_eq!(input.best_video_stream(), Err(VideoError::NoVideoStream));
    }

    #[test]
    fn interleaved_audio_uses_another_stream() {
        let backend = MemoryBackend::new()
            .with_clip("clip", MemoryClip::new(8, 8, 20, 1.0).with_interleaved_audio());
        let mut input = backend.open_media("clip").unwrap();

        match input.next_packet() {
            PacketRead::Packet { stream_index, .. } => assert_eq!(stream_index, AUDIO_STREAM_INDEX),
            other => panic!("expected audio packet, got {other:?}"),
        }
        match input.next_packet() {
            PacketRead::Packet { stream_index, .. } => assert_eq!(stream_index, VIDEO_STREAM_INDEX),
            other => panic!("expected video packet, got {other:?}"),
        }
    }

    #[test]
    fn decoder_delay_requires_more_input() {
        let (mut input, mut decoder, _) =
            open(MemoryClip::new(8, 8, 20, 1.0).with_decoder_delay(2));

        for _ in 0..2 {
            decoder.send_packet(&next_video(&mut input).unwrap()).unwrap();
            assert!(matches!(decoder.receive_frame(), DecodeStep::NeedMoreInput));
        }
        decoder.send_packet(&next_video(&mut input).unwrap()).unwrap();
        match decoder.receive_frame() {
            DecodeStep::Frame(frame) => assert_eq!(frame.pts(), 0),
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn draining_releases_buffered_frames() {
        let (mut input, mut decoder, _) =
            open(MemoryClip::new(8, 8, 20, 0.1).with_decoder_delay(5));

        while let Some(packet) = next_video(&mut input) {
            decoder.send_packet(&packet).unwrap();
        }
        decoder.send_eof().unwrap();

        let mut drained = 0;
        while let DecodeStep::Frame(_) = decoder.receive_frame() {
            drained += 1;
        }
        assert_eq!(drained, 2);
        assert!(matches!(decoder.receive_frame(), DecodeStep::EndOfStream));
    }

    #[test]
    fn seek_lands_on_preceding_keyframe() {
        let (mut input, _, _) = open(MemoryClip::new(8, 8, 20, 10.0).with_gop_size(20));

        // 5.3s is frame 106, whose keyframe is frame 100 (5.0s)
        input.seek_to_preceding_keyframe(0, 5 * 90_000 + 27_000).unwrap();
        let packet = next_video(&mut input).unwrap();

        assert_eq!(packet.frame_index, 100);
        assert!(packet.is_key);
    }

    #[test]
    fn seek_past_end_lands_on_last_keyframe() {
        let (mut input, _, _) = open(MemoryClip::new(8, 8, 20, 2.0).with_gop_size(10));
        input.seek_to_preceding_keyframe(0, i64::MAX / 2).unwrap();
        assert_eq!(next_video(&mut input).unwrap().frame_index, 30);
    }

    #[test]
    fn conversion_strips_padding() {
        let backend = MemoryBackend::new()
            .with_clip("clip", MemoryClip::new(4, 2, 20, 1.0).with_color([1, 2, 3]));
        let input = backend.open_media("clip").unwrap();
        let stream = input.best_video_stream().unwrap();
        let mut decoder = input.open_decoder(&stream, 1).unwrap();
        let mut input = input;
        decoder.send_packet(&next_video(&mut input).unwrap()).unwrap();
        let DecodeStep::Frame(frame) = decoder.receive_frame() else {
            panic!("expected a frame");
        };

        let rgb = backend.convert_to_rgb(&frame).unwrap();
        assert!(rgb.is_complete());
        assert_eq!(rgb.data().len(), 4 * 2 * 3);
        assert!(rgb.data().chunks(3).all(|px| px == [1, 2, 3]));
    }

    #[test]
    fn inputs_are_counted_until_dropped() {
        let backend = MemoryBackend::new().with_clip("clip", MemoryClip::new(8, 8, 20, 1.0));
        let stats = backend.stats();
        {
            let _input = backend.open_media("clip").unwrap();
            assert_eq!(stats.live_inputs(), 1);
        }
        assert_eq!(stats.live_inputs(), 0);
        assert_eq!(stats.opened(), 1);
    }
}
