//! Capture source abstraction.
//!
//! The render loop only sees [`CaptureSource`]; real devices and the
//! synthetic [`MockCamera`] both sit behind it.

use super::{CaptureConfig, Frame};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which physical camera to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// User-facing camera.
    Front,
    /// Environment-facing camera.
    #[default]
    Rear,
}

impl Facing {
    /// Returns the opposite camera.
    pub fn flipped(self) -> Self {
        match self {
            Facing::Front => Facing::Rear,
            Facing::Rear => Facing::Front,
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facing::Front => f.write_str("front"),
            Facing::Rear => f.write_str("rear"),
        }
    }
}

impl std::str::FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(Facing::Front),
            "rear" | "back" | "environment" => Ok(Facing::Rear),
            other => Err(format!("unknown camera facing: {other}")),
        }
    }
}

/// Errors that can occur during capture.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
}

/// A live frame source.
///
/// `poll_frame` must never block: it returns `Ok(None)` when no new frame
/// has arrived since the last call.
pub trait CaptureSource {
    /// Opens the camera facing the given direction.
    fn open(&mut self, facing: Facing) -> Result<(), CaptureError>;

    /// Returns the newest frame if one is ready.
    fn poll_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// The direction the open camera faces, if open.
    fn facing(&self) -> Option<Facing>;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

impl<T: CaptureSource + ?Sized> CaptureSource for Box<T> {
    fn open(&mut self, facing: Facing) -> Result<(), CaptureError> {
        (**self).open(facing)
    }

    fn poll_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        (**self).poll_frame()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn facing(&self) -> Option<Facing> {
        (**self).facing()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Synthetic camera producing a moving RGBA gradient.
///
/// Can be told to refuse permission, to only have a frame ready every
/// few polls, or to lose the device after a number of frames.
#[derive(Debug)]
pub struct MockCamera {
    width: u32,
    height: u32,
    facing: Option<Facing>,
    sequence: u64,
    polls: u64,
    ready_every: u64,
    deny_permission: bool,
    fail_after: Option<u64>,
}

impl MockCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            facing: None,
            sequence: 0,
            polls: 0,
            ready_every: 1,
            deny_permission: false,
            fail_after: None,
        }
    }

    /// Creates a mock matching the configured resolution.
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.width, config.height)
    }

    /// Only every `n`th poll yields a frame.
    pub fn ready_every(mut self, n: u64) -> Self {
        self.ready_every = n.max(1);
        self
    }

    /// Makes `open` fail as if the user refused camera access.
    pub fn deny_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    /// Reports the device as lost once `frames` frames have been delivered.
    pub fn fail_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }

    fn synthesize(&self) -> Frame {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = self.sequence as usize;
        let mut pixels = Vec::with_capacity(w * h * 4);
        for y in 0..h {
            for x in 0..w {
                pixels.push(((x + shift) * 255 / w.max(1)) as u8);
                pixels.push((y * 255 / h.max(1)) as u8);
                pixels.push(((x + y + shift) % 256) as u8);
                pixels.push(255);
            }
        }
        Frame::new(pixels, self.width, self.height, self.sequence)
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        let config = CaptureConfig::default();
        Self::from_config(&config)
    }
}

impl CaptureSource for MockCamera {
    fn open(&mut self, facing: Facing) -> Result<(), CaptureError> {
        if self.deny_permission {
            tracing::warn!(%facing, "MockCamera refusing access");
            return Err(CaptureError::PermissionDenied);
        }
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::ConfigFailed("zero frame dimensions".into()));
        }
        self.facing = Some(facing);
        self.sequence = 0;
        self.polls = 0;
        tracing::info!(%facing, width = self.width, height = self.height, "MockCamera opened");
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.facing.is_none() {
            return Err(CaptureError::NotInitialized);
        }
        if let Some(limit) = self.fail_after {
            if self.sequence >= limit {
                return Err(CaptureError::DeviceUnavailable("mock device lost".into()));
            }
        }

        self.polls += 1;
        if self.polls % self.ready_every != 0 {
            return Ok(None);
        }

        self.sequence += 1;
        Ok(Some(self.synthesize()))
    }

    fn is_open(&self) -> bool {
        self.facing.is_some()
    }

    fn facing(&self) -> Option<Facing> {
        self.facing
    }

    fn close(&mut self) {
        if self.facing.take().is_some() {
            tracing::info!("MockCamera closed");
        }
    }
}
