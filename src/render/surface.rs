//! Presentation targets for processed frames.

use crate::capture::Frame;

/// Destination for frames leaving the render loop.
pub trait Surface {
    /// Takes ownership of a fully processed frame.
    fn present(&mut self, frame: Frame);
}

/// Keeps the most recently presented frame, standing in for an
/// on-screen preview.
///
/// Exports read from [`PreviewSurface::snapshot`], which always returns a
/// copy so overlay compositing cannot touch the displayed buffer.
#[derive(Debug, Default)]
pub struct PreviewSurface {
    current: Option<Frame>,
    presented: u64,
}

impl PreviewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// The frame currently on display.
    pub fn current(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    /// A detached copy of the frame on display.
    pub fn snapshot(&self) -> Option<Frame> {
        self.current.clone()
    }

    /// Number of frames presented so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Drops the displayed frame.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

impl Surface for PreviewSurface {
    fn present(&mut self, frame: Frame) {
        self.presented += 1;
        self.current = Some(frame);
    }
}
