// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all configuration constants.
//!
//! This module serves as the single source of truth for default values
//! used across the crate. Constants are organized by category.

// ==========================================================================
// Playback Speed
// ==========================================================================

/// Minimum accepted playback speed multiplier.
pub const MIN_PLAYBACK_SPEED: f64 = 0.1;

/// Maximum accepted playback speed multiplier.
pub const MAX_PLAYBACK_SPEED: f64 = 3.0;

/// Speed applied when a source is opened.
pub const DEFAULT_PLAYBACK_SPEED: f64 = 1.0;

// ==========================================================================
// Pacing
// ==========================================================================

/// Pace interval used when the stream carries no usable frame rate (4 ms).
pub const DEFAULT_FALLBACK_PACE_INTERVAL_MICROS: u64 = 4_000;

/// Smallest pace interval the pump will ever sleep for.
pub const MIN_PACE_INTERVAL_MICROS: u64 = 1;

// ==========================================================================
// Seeking
// ==========================================================================

/// Frames this close before the seek target are considered "at" the target.
pub const DEFAULT_SEEK_TOLERANCE_MS: u32 = 50;

/// Upper bound for the seek tolerance.
pub const MAX_SEEK_TOLERANCE_MS: u32 = 1_000;

// ==========================================================================
// Decoder
// ==========================================================================

/// Worker threads requested from the codec.
pub const DEFAULT_DECODER_THREADS: usize = 4;

/// Upper bound for decoder worker threads.
pub const MAX_DECODER_THREADS: usize = 64;

/// Consecutive non-EOF packet read errors tolerated before giving up.
pub const DEFAULT_MAX_CONSECUTIVE_READ_ERRORS: u32 = 64;

// ==========================================================================
// Timebase
// ==========================================================================

/// Ticks per second assumed when a stream reports an invalid timebase.
pub const FALLBACK_TICKS_PER_SECOND: f64 = 1_000_000.0;
