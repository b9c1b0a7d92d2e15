// SPDX-License-Identifier: MPL-2.0
use std::fmt;

#[derive(Debug, Clone)]
pub enum Error {
    Io(String),
    Config(String),
    Video(VideoError),
    /// The player refused an operation in its current state.
    Playback(String),
}

/// Failures reported by a decoding backend.
///
/// These never cross the public playback surface; the player logs them and
/// reports `false`/`None` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoError {
    /// The source could not be opened or probed.
    SourceUnavailable(String),

    /// The source contains no decodable video stream.
    NoVideoStream,

    /// No decoder is available for the stream's codec.
    UnsupportedCodec(String),

    /// The decoder exists but could not be initialized.
    DecoderInit(String),

    /// Reading a packet from the demuxer failed (not end-of-stream).
    Demux(String),

    /// The decoder rejected input or failed to produce a frame.
    DecodingFailed(String),

    /// Flushing or repositioning the demuxer failed.
    SeekFailed(String),

    /// Pixel-format conversion failed.
    ConversionFailed(String),

    /// Generic error with raw message
    Other(String),
}

impl fmt::Display for VideoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoError::SourceUnavailable(msg) => write!(f, "Cannot open source: {}", msg),
            VideoError::NoVideoStream => write!(f, "No video stream found"),
            VideoError::UnsupportedCodec(codec) => {
                write!(f, "Unsupported video codec: {}", codec)
            }
            VideoError::DecoderInit(msg) => write!(f, "Decoder initialization failed: {}", msg),
            VideoError::Demux(msg) => write!(f, "Packet read failed: {}", msg),
            VideoError::DecodingFailed(msg) => write!(f, "Decoding failed: {}", msg),
            VideoError::SeekFailed(msg) => write!(f, "Seek failed: {}", msg),
            VideoError::ConversionFailed(msg) => write!(f, "RGB conversion failed: {}", msg),
            VideoError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for VideoError {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O Error: {}", e),
            Error::Config(e) => write!(f, "Config Error: {}", e),
            Error::Video(e) => write!(f, "Video Error: {}", e),
            Error::Playback(e) => write!(f, "Playback Error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<VideoError> for Error {
    fn from(err: VideoError) -> Self {
        Error::Video(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
