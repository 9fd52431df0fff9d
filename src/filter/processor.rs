//! Whole-frame application of the colour transform.

use super::{state::FilterState, transform::ColorTransform};
use crate::capture::{Frame, FrameError};
use rayon::prelude::*;

/// Minimum frame height before rows are split across the rayon pool.
///
/// Below this the scheduling overhead outweighs the per-row work.
pub const PARALLEL_ROW_THRESHOLD: u32 = 64;

/// Applies [`ColorTransform`] to every pixel of a frame.
///
/// The whole buffer is processed before any call returns. Inactive filter
/// states short-circuit and leave the bytes untouched.
#[derive(Debug)]
pub struct FrameProcessor {
    parallel: bool,
    frames_processed: u64,
    frames_passed_through: u64,
}

impl FrameProcessor {
    pub fn new() -> Self {
        Self {
            parallel: true,
            frames_processed: 0,
            frames_passed_through: 0,
        }
    }

    /// Creates a processor that always runs on the calling thread.
    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Self::new()
        }
    }

    /// Filters a frame in place.
    ///
    /// Fails with [`FrameError::InvalidFrame`] before touching any pixel
    /// if the buffer does not match the frame dimensions.
    pub fn process_in_place(
        &mut self,
        frame: &mut Frame,
        state: FilterState,
    ) -> Result<(), FrameError> {
        frame.validate()?;

        if !state.is_active() {
            self.frames_passed_through += 1;
            return Ok(());
        }

        let intensity = state.intensity;
        let stride = frame.stride();
        let rows = frame.height();

        if self.parallel && rows >= PARALLEL_ROW_THRESHOLD && stride > 0 {
            frame
                .pixels_mut()
                .par_chunks_mut(stride)
                .for_each(|row| ColorTransform::apply_slice(row, intensity));
        } else {
            ColorTransform::apply_slice(frame.pixels_mut(), intensity);
        }

        self.frames_processed += 1;
        tracing::trace!(
            sequence = frame.sequence(),
            intensity = intensity.value(),
            "Frame filtered"
        );
        Ok(())
    }

    /// Filters a copy of `frame`, leaving the input untouched.
    pub fn process(&mut self, frame: &Frame, state: FilterState) -> Result<Frame, FrameError> {
        let mut out = frame.clone();
        self.process_in_place(&mut out, state)?;
        Ok(out)
    }

    /// Number of frames that went through the transform.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Number of frames returned untouched because the filter was inactive.
    pub fn frames_passed_through(&self) -> u64 {
        self.frames_passed_through
    }
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Intensity;

    fn gradient(width: u32, height: u32) -> Frame {
        let pixels = (0..width * height)
            .flat_map(|i| {
                let v = (i % 256) as u8;
                [v, 255 - v, v / 2, 200]
            })
            .collect();
        Frame::new(pixels, width, height, 1)
    }

    #[test]
    fn test_disabled_is_byte_identical() {
        let mut processor = FrameProcessor::new();
        let input = gradient(16, 16);
        let out = processor.process(&input, FilterState::disabled()).unwrap();

        assert_eq!(out.pixels(), input.pixels());
        assert_eq!(processor.frames_passed_through(), 1);
        assert_eq!(processor.frames_processed(), 0);
    }

    #[test]
    fn test_zero_intensity_is_byte_identical() {
        let mut processor = FrameProcessor::new();
        let input = gradient(8, 8);
        let out = processor
            .process(&input, FilterState::with_intensity(Intensity::OFF))
            .unwrap();
        assert_eq!(out.pixels(), input.pixels());
    }

    #[test]
    fn test_output_length_matches_and_alpha_kept() {
        let mut processor = FrameProcessor::new();
        let input = gradient(10, 7);
        let out = processor
            .process(&input, FilterState::with_intensity(Intensity::FULL))
            .unwrap();

        assert_eq!(out.pixels().len(), input.pixels().len());
        assert!(out.pixels().chunks_exact(4).all(|px| px[3] == 200));
        assert_ne!(out.pixels(), input.pixels());
    }

    #[test]
    fn test_malformed_buffer_rejected_untouched() {
        let mut processor = FrameProcessor::new();
        let mut frame = Frame::new(vec![255u8; 30], 4, 2, 1);

        let result = processor.process_in_place(&mut frame, FilterState::default());
        assert!(matches!(result, Err(FrameError::InvalidFrame { .. })));
        assert!(frame.pixels().iter().all(|&b| b == 255));
    }

    #[test]
    fn test_overflowing_dimensions_rejected() {
        let frame = Frame::new(Vec::new(), 1 << 31, 1 << 31, 0);
        let mut processor = FrameProcessor::new();

        assert!(matches!(
            processor.process(&frame, FilterState::default()),
            Err(FrameError::InvalidFrame { .. })
        ));
        assert!(processor
            .process(&frame, FilterState::disabled())
            .is_err());
        assert_eq!(processor.frames_processed(), 0);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let input = gradient(33, PARALLEL_ROW_THRESHOLD + 5);
        let state = FilterState::with_intensity(Intensity::new(0.6));

        let parallel = FrameProcessor::new().process(&input, state).unwrap();
        let serial = FrameProcessor::serial().process(&input, state).unwrap();
        assert_eq!(parallel.pixels(), serial.pixels());
    }
}
