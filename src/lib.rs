// SPDX-License-Identifier: MPL-2.0
//! `vdec_player` is a playback control engine over a pluggable video decoding
//! backend.
//!
//! It opens a media source, paces decoded frames at the stream's (optionally
//! speed-scaled) frame rate on a background thread, delivers them through
//! callbacks, and supports pause, resume and frame-accurate seeking.
//!
//! The [`backend::memory`] backend serves synthetic clips; the `backend-ffmpeg`
//! feature adds an `FFmpeg` backend.

#![doc(html_root_url = "https://docs.rs/vdec_player/0.3.0")]

pub mod backend;
pub mod config;
pub mod error;
pub mod video_player;

pub use video_player::{Frame, RgbImage, Status, VideoPlayer};

#[cfg(test)]
mod test_utils;
