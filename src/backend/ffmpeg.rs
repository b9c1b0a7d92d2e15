// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` decoding backend.
//!
//! Wraps `ffmpeg-next` demuxing, decoding and software scaling behind the
//! [`DecodingBackend`] port. Only compiled with the `backend-ffmpeg` feature.

use super::{
    DecodeStep, DecodingBackend, MediaInput, PacketRead, Rational, StreamDecoder, StreamInfo,
};
use crate::error::VideoError;
use crate::video_player::frame::pack_rows;
use crate::video_player::{Frame, PixelBuffer, RgbImage};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use std::any::Any;
use std::sync::Once;

static FFMPEG_INIT: Once = Once::new();

/// Initializes `FFmpeg` once per process.
fn init_ffmpeg() -> Result<(), VideoError> {
    let mut init_result = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            init_result = Err(VideoError::Other(format!("FFmpeg initialization failed: {e}")));
            return;
        }

        // SAFETY: av_log_set_level is thread-safe and only affects logging
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR);
        }
    });

    init_result
}

fn rational(value: ffmpeg_next::Rational) -> Rational {
    Rational::new(value.numerator(), value.denominator())
}

/// Backend decoding files and URLs with `FFmpeg`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DecodingBackend for FfmpegBackend {
    type Input = FfmpegInput;

    fn open_media(&self, source: &str) -> Result<FfmpegInput, VideoError> {
        init_ffmpeg()?;

        let context = ffmpeg_next::format::input(source)
            .map_err(|e| VideoError::SourceUnavailable(format!("{source}: {e}")))?;
        Ok(FfmpegInput { context })
    }

    fn convert_to_rgb(&self, frame: &Frame) -> Result<RgbImage, VideoError> {
        let picture = frame.pixels_as::<FfmpegPicture>().ok_or_else(|| {
            VideoError::ConversionFailed("frame was not produced by FFmpeg".into())
        })?;
        let source = &picture.frame;

        // A scaler per call keeps the backend free of per-session state
        let mut scaler = scaling::Context::get(
            source.format(),
            source.width(),
            source.height(),
            Pixel::RGB24,
            source.width(),
            source.height(),
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| VideoError::ConversionFailed(format!("Failed to create scaler: {e}")))?;

        let mut rgb = ffmpeg_next::frame::Video::empty();
        scaler
            .run(source, &mut rgb)
            .map_err(|e| VideoError::ConversionFailed(format!("Scaling failed: {e}")))?;

        let row_bytes = rgb.width() as usize * RgbImage::BYTES_PER_PIXEL;
        let data = pack_rows(rgb.data(0), rgb.stride(0), row_bytes, rgb.height() as usize);
        Ok(RgbImage::new(rgb.width(), rgb.height(), data))
    }

    fn configuration(&self) -> String {
        ffmpeg_next::codec::configuration().to_string()
    }
}

/// An opened `FFmpeg` demuxer.
pub struct FfmpegInput {
    context: ffmpeg_next::format::context::Input,
}

// SAFETY: the format context holds raw pointers but is only ever used by one
// thread at a time; the player moves it between threads under its session lock.
unsafe impl Send for FfmpegInput {}

impl MediaInput for FfmpegInput {
    type Packet = FfmpegPacket;
    type Decoder = FfmpegDecoder;

    fn best_video_stream(&self) -> Result<StreamInfo, VideoError> {
        let stream = self
            .context
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(VideoError::NoVideoStream)?;

        let parameters = stream.parameters();
        // SAFETY: parameters point to the stream's live AVCodecParameters
        let (width, height) = unsafe {
            let raw = parameters.as_ptr();
            ((*raw).width, (*raw).height)
        };

        let time_base = rational(stream.time_base());
        let stream_duration = stream.duration();
        let duration_ticks = if stream_duration > 0 {
            Some(stream_duration)
        } else {
            container_duration_ticks(self.context.duration(), time_base)
        };
        let frame_rate = stream.avg_frame_rate();

        #[allow(clippy::cast_sign_loss)]
        Ok(StreamInfo {
            index: stream.index(),
            width: width.max(0) as u32,
            height: height.max(0) as u32,
            time_base,
            avg_frame_rate: (frame_rate.denominator() != 0).then(|| rational(frame_rate)),
            duration_ticks,
            codec_name: parameters.id().name().to_string(),
        })
    }

    fn open_decoder(
        &self,
        stream: &StreamInfo,
        threads: usize,
    ) -> Result<FfmpegDecoder, VideoError> {
        let av_stream = self
            .context
            .stream(stream.index)
            .ok_or(VideoError::NoVideoStream)?;
        let parameters = av_stream.parameters();
        if ffmpeg_next::decoder::find(parameters.id()).is_none() {
            return Err(VideoError::UnsupportedCodec(stream.codec_name.clone()));
        }

        let mut context = ffmpeg_next::codec::context::Context::from_parameters(parameters)
            .map_err(|e| VideoError::DecoderInit(format!("Failed to create codec context: {e}")))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        // SAFETY: the codec context is not opened yet; thread_count is read on open
        unsafe {
            (*context.as_mut_ptr()).thread_count = threads as i32;
        }

        let decoder = context
            .decoder()
            .video()
            .map_err(|e| VideoError::DecoderInit(format!("Failed to open video decoder: {e}")))?;
        Ok(FfmpegDecoder { decoder })
    }

    fn next_packet(&mut self) -> PacketRead<FfmpegPacket> {
        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(&mut self.context) {
            Ok(()) => PacketRead::Packet {
                stream_index: packet.stream(),
                packet: FfmpegPacket(packet),
            },
            Err(ffmpeg_next::Error::Eof) => PacketRead::EndOfStream,
            Err(e) => PacketRead::Error(VideoError::Demux(e.to_string())),
        }
    }

    fn flush(&mut self) -> Result<(), VideoError> {
        // SAFETY: the context pointer stays valid for the lifetime of `self`
        let status = unsafe { ffmpeg_next::ffi::avformat_flush(self.context.as_mut_ptr()) };
        if status < 0 {
            return Err(VideoError::SeekFailed(format!(
                "Demuxer flush failed: {}",
                ffmpeg_next::Error::from(status)
            )));
        }
        Ok(())
    }

    fn seek_to_preceding_keyframe(
        &mut self,
        stream_index: usize,
        pts: i64,
    ) -> Result<(), VideoError> {
        let time_base = self
            .context
            .stream(stream_index)
            .map(|stream| rational(stream.time_base()))
            .ok_or_else(|| VideoError::SeekFailed(format!("No stream {stream_index}")))?;

        // The container seek expects AV_TIME_BASE units
        let timestamp = rescale_to_av_time_base(pts, time_base);
        self.context
            .seek(timestamp, ..timestamp)
            .map_err(|e| VideoError::SeekFailed(e.to_string()))
    }
}

fn rescale_to_av_time_base(ticks: i64, time_base: Rational) -> i64 {
    if time_base.den == 0 {
        return ticks;
    }
    let scaled = i128::from(ticks)
        * i128::from(time_base.num)
        * i128::from(ffmpeg_next::ffi::AV_TIME_BASE)
        / i128::from(time_base.den);
    i64::try_from(scaled).unwrap_or(if scaled < 0 { i64::MIN } else { i64::MAX })
}

fn container_duration_ticks(av_duration: i64, time_base: Rational) -> Option<i64> {
    if av_duration <= 0 || time_base.num == 0 {
        return None;
    }
    let ticks = i128::from(av_duration) * i128::from(time_base.den)
        / (i128::from(time_base.num) * i128::from(ffmpeg_next::ffi::AV_TIME_BASE));
    i64::try_from(ticks).ok()
}

/// A demuxed `FFmpeg` packet.
pub struct FfmpegPacket(ffmpeg_next::Packet);

// SAFETY: the packet owns its buffer and is never shared between threads.
unsafe impl Send for FfmpegPacket {}

/// An opened `FFmpeg` video decoder.
pub struct FfmpegDecoder {
    decoder: ffmpeg_next::decoder::Video,
}

// SAFETY: same contract as `FfmpegInput`, exclusive use under the session lock.
unsafe impl Send for FfmpegDecoder {}

impl StreamDecoder for FfmpegDecoder {
    type Packet = FfmpegPacket;

    fn send_packet(&mut self, packet: &FfmpegPacket) -> Result<(), VideoError> {
        self.decoder
            .send_packet(&packet.0)
            .map_err(|e| VideoError::DecodingFailed(format!("Packet send failed: {e}")))
    }

    fn send_eof(&mut self) -> Result<(), VideoError> {
        self.decoder
            .send_eof()
            .map_err(|e| VideoError::DecodingFailed(format!("Drain request failed: {e}")))
    }

    fn receive_frame(&mut self) -> DecodeStep {
        let mut decoded = ffmpeg_next::frame::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {
                let pts = decoded.pts().or_else(|| decoded.timestamp()).unwrap_or(0);
                let (width, height) = (decoded.width(), decoded.height());
                let is_key = decoded.is_key();
                let picture = FfmpegPicture::new(decoded);
                DecodeStep::Frame(if is_key {
                    Frame::keyframe(pts, width, height, picture)
                } else {
                    Frame::new(pts, width, height, picture)
                })
            }
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                DecodeStep::NeedMoreInput
            }
            Err(ffmpeg_next::Error::Eof) => DecodeStep::EndOfStream,
            Err(e) => DecodeStep::Failed(VideoError::DecodingFailed(format!(
                "Failed to receive frame: {e}"
            ))),
        }
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }
}

/// Native `FFmpeg` picture in the decoder's pixel format.
pub struct FfmpegPicture {
    frame: ffmpeg_next::frame::Video,
    format_name: String,
}

impl FfmpegPicture {
    fn new(frame: ffmpeg_next::frame::Video) -> Self {
        let format_name = format!("{:?}", frame.format()).to_lowercase();
        Self { frame, format_name }
    }
}

// SAFETY: the picture is never mutated after decoding; all access is
// read-only through shared references.
unsafe impl Send for FfmpegPicture {}
unsafe impl Sync for FfmpegPicture {}

impl PixelBuffer for FfmpegPicture {
    fn plane(&self, index: usize) -> &[u8] {
        self.frame.data(index)
    }

    fn stride(&self, index: usize) -> usize {
        self.frame.stride(index)
    }

    fn format_name(&self) -> &str {
        &self.format_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
