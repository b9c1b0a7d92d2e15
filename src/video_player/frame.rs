// SPDX-License-Identifier: MPL-2.0
//! Decoded frame handles shared between the pump, the cache and callers.
//!
//! A [`Frame`] is a cheap-to-clone, reference-counted handle. Replacing the
//! player's cached frame never invalidates a clone a caller already holds.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Backend-owned pixel storage of a decoded picture.
///
/// Backends implement this for their native frame type so the player can hand
/// frames around without copying pixels. `as_any` lets the producing backend
/// recover its concrete type (e.g. for pixel-format conversion).
pub trait PixelBuffer: Send + Sync + 'static {
    /// Raw bytes of a plane, including row padding.
    fn plane(&self, index: usize) -> &[u8];

    /// Row length in bytes of a plane, including padding.
    fn stride(&self, index: usize) -> usize;

    /// Short backend-specific name of the pixel layout (e.g. `yuv420p`).
    fn format_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

struct FrameInner {
    pts: i64,
    width: u32,
    height: u32,
    is_key: bool,
    buffer: Box<dyn PixelBuffer>,
}

/// A decoded video picture.
#[derive(Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl Frame {
    pub fn new(pts: i64, width: u32, height: u32, buffer: impl PixelBuffer) -> Self {
        Self {
            inner: Arc::new(FrameInner {
                pts,
                width,
                height,
                is_key: false,
                buffer: Box::new(buffer),
            }),
        }
    }

    /// Same as [`Frame::new`], flagging the picture as a keyframe.
    pub fn keyframe(pts: i64, width: u32, height: u32, buffer: impl PixelBuffer) -> Self {
        Self {
            inner: Arc::new(FrameInner {
                pts,
                width,
                height,
                is_key: true,
                buffer: Box::new(buffer),
            }),
        }
    }

    /// Presentation timestamp in stream timebase ticks.
    pub fn pts(&self) -> i64 {
        self.inner.pts
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn is_key(&self) -> bool {
        self.inner.is_key
    }

    /// True when the picture has no pixels (never cached by the player).
    pub fn is_empty(&self) -> bool {
        self.inner.width == 0 || self.inner.height == 0
    }

    pub fn pixels(&self) -> &dyn PixelBuffer {
        self.inner.buffer.as_ref()
    }

    /// Downcasts the pixel storage to the backend's concrete type.
    pub fn pixels_as<T: PixelBuffer>(&self) -> Option<&T> {
        self.inner.buffer.as_any().downcast_ref::<T>()
    }

    /// Returns true if both handles refer to the same decoded picture.
    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("pts", &self.inner.pts)
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("is_key", &self.inner.is_key)
            .field("format", &self.inner.buffer.format_name())
            .finish()
    }
}

/// Packed 3-byte-per-pixel RGB snapshot owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbImage {
    /// Bytes per pixel of packed RGB24.
    pub const BYTES_PER_PIXEL: usize = 3;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Size in bytes a complete image of the given dimensions occupies.
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::BYTES_PER_PIXEL
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns true if the buffer holds exactly `width × height × 3` bytes.
    pub fn is_complete(&self) -> bool {
        self.data.len() == Self::expected_len(self.width, self.height)
    }
}

/// Copies `rows` rows of `row_bytes` bytes out of a strided plane.
///
/// Stops early if the plane is shorter than advertised, so the result may be
/// smaller than `rows × row_bytes`.
pub fn pack_rows(plane: &[u8], stride: usize, row_bytes: usize, rows: usize) -> Vec<u8> {
    let mut packed = Vec::with_capacity(row_bytes * rows);
    for y in 0..rows {
        let row_start = y * stride;
        let row_end = row_start + row_bytes;
        match plane.get(row_start..row_end) {
            Some(row) => packed.extend_from_slice(row),
            None => break,
        }
    }
    packed
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Packed {
        data: Vec<u8>,
        stride: usize,
    }

    impl PixelBuffer for Packed {
        fn plane(&self, _index: usize) -> &[u8] {
            &self.data
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

    #[test]
    fn clones_share_the_same_picture() {
        let frame = Frame::new(42, 2, 2, Packed { data: vec![0; 12], stride: 6 });
        let copy = frame.clone();

        assert!(frame.ptr_eq(&copy));
        assert_eq!(copy.pts(), 42);
        assert_eq!(copy.width(), 2);
        assert!(!copy.is_key());
    }

    #[test]
    fn clone_outlives_original() {
        let copy = {
            let frame = Frame::keyframe(7, 1, 1, Packed { data: vec![9, 8, 7], stride: 3 });
            frame.clone()
        };
        assert_eq!(copy.pixels().plane(0), &[9, 8, 7]);
        assert!(copy.is_key());
    }

    #[test]
    fn pixels_as_downcasts_to_concrete_buffer() {
        let frame = Frame::new(0, 1, 1, Packed { data: vec![1, 2, 3], stride: 3 });
        assert_eq!(frame.pixels_as::<Packed>().map(|p| p.stride), Some(3));
    }

    #[test]
    fn empty_frame_is_detected() {
        let frame = Frame::new(0, 0, 10, Packed { data: Vec::new(), stride: 0 });
        assert!(frame.is_empty());
    }

    #[test]
    fn pack_rows_drops_stride_padding() {
        // 2x2 RGB image stored with 2 bytes of padding per row
        let plane = [1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12, 0, 0];
        let packed = pack_rows(&plane, 8, 6, 2);
        assert_eq!(packed, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn pack_rows_stops_on_short_plane() {
        let plane = [1, 2, 3];
        let packed = pack_rows(&plane, 3, 3, 4);
        assert_eq!(packed.len(), 3);
    }

    #[test]
    fn rgb_image_completeness() {
        let full = RgbImage::new(2, 1, vec![0; 6]);
        let short = RgbImage::new(2, 2, vec![0; 6]);

        assert!(full.is_complete());
        assert!(!short.is_complete());
        assert_eq!(RgbImage::expected_len(1920, 1080), 1920 * 1080 * 3);
    }
}
