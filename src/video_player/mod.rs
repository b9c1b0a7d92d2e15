// SPDX-License-Identifier: MPL-2.0
//! Video playback engine.
//!
//! Drives a [`DecodingBackend`](crate::backend::DecodingBackend) at the stream's
//! frame rate on a dedicated pump thread, caches the most recent frame and
//! delivers frames and presentation times through host callbacks.

mod dispatch;
pub mod frame;
pub mod pacing;
pub mod playback_speed;
mod player;
mod pump;
mod seek;
mod state;
pub mod time_units;

pub use dispatch::{FrameCallback, TickCallback};
pub use frame::{Frame, PixelBuffer, RgbImage};
pub use pacing::Pacer;
pub use playback_speed::PlaybackSpeed;
pub use player::VideoPlayer;
pub use state::Status;
