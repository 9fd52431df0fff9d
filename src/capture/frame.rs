//! RGBA frame type with capture metadata.

use std::time::Instant;
use thiserror::Error;

/// Bytes per pixel in the interleaved RGBA layout.
pub const BYTES_PER_PIXEL: usize = 4;

/// Errors for buffers that do not describe a well-formed frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("invalid frame: {len} bytes for {width}x{height} RGBA (expected {expected})")]
    InvalidFrame {
        len: usize,
        width: u32,
        height: u32,
        expected: usize,
    },
}

/// A single captured frame.
///
/// Pixels are row-major, interleaved R,G,B,A, one byte per channel.
#[derive(Clone)]
pub struct Frame {
    /// Raw RGBA bytes.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic sequence number assigned by the source.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame with the given parameters.
    ///
    /// The buffer is not checked here; see [`Frame::validate`].
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Creates a frame filled with a single RGBA colour.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4], sequence: u64) -> Self {
        let count = (width as usize).saturating_mul(height as usize);
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(count.saturating_mul(BYTES_PER_PIXEL))
            .collect();
        Self::new(pixels, width, height, sequence)
    }

    /// Creates a frame and validates its shape.
    pub fn try_new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
    ) -> Result<Self, FrameError> {
        let frame = Self::new(pixels, width, height, sequence);
        frame.validate()?;
        Ok(frame)
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns a mutable reference to the raw pixel data.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Consumes the frame and returns its buffer.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height), saturating.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Returns the length in bytes of one row, saturating.
    #[inline]
    pub fn stride(&self) -> usize {
        (self.width as usize).saturating_mul(BYTES_PER_PIXEL)
    }

    /// Byte length the dimensions call for, or `None` if it overflows.
    fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
    }

    /// Returns the RGBA value at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize)
            .checked_mul(self.stride())?
            .checked_add(x as usize * BYTES_PER_PIXEL)?;
        let px = self.pixels.get(i..i.checked_add(BYTES_PER_PIXEL)?)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Checks that the buffer is whole RGBA pixels matching the dimensions.
    ///
    /// Dimensions whose byte size overflows `usize` are always invalid and
    /// report `expected` as `usize::MAX`.
    pub fn validate(&self) -> Result<(), FrameError> {
        let len = self.pixels.len();
        let expected = self.expected_len();
        if len % BYTES_PER_PIXEL != 0 || expected != Some(len) {
            let expected = expected.unwrap_or(usize::MAX);
            return Err(FrameError::InvalidFrame {
                len,
                width: self.width,
                height: self.height,
                expected,
            });
        }
        Ok(())
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let pixels = vec![0u8; 640 * 480 * 4];
        let frame = Frame::new(pixels, 640, 480, 1);

        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.sequence(), 1);
        assert_eq!(frame.stride(), 2560);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let frame = Frame::new(vec![0u8; 100], 640, 480, 1);
        assert!(matches!(
            frame.validate(),
            Err(FrameError::InvalidFrame { len: 100, .. })
        ));
    }

    #[test]
    fn test_frame_partial_pixel_rejected() {
        // 2x1 frame needs 8 bytes; 7 is not a whole number of pixels
        assert!(Frame::try_new(vec![0u8; 7], 2, 1, 0).is_err());
    }

    #[test]
    fn test_filled_and_pixel_lookup() {
        let frame = Frame::filled(3, 2, [1, 2, 3, 4], 9);
        assert!(frame.is_valid());
        assert_eq!(frame.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(frame.pixel(3, 0), None);
    }

    #[test]
    fn test_overflowing_dimensions_rejected() {
        let frame = Frame::new(Vec::new(), 1 << 31, 1 << 31, 0);
        assert!(matches!(
            frame.validate(),
            Err(FrameError::InvalidFrame {
                len: 0,
                expected: usize::MAX,
                ..
            })
        ));
        assert_eq!(frame.pixel(5, 5), None);
        assert_eq!(frame.pixel(u32::MAX - 1, u32::MAX - 1), None);
    }
}
