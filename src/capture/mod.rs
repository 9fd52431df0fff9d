//! Camera input and frame handling.
//!
//! This module provides the [`CaptureSource`] abstraction the render loop
//! pulls frames from, the RGBA [`Frame`] type, and session configuration.

mod camera;
mod config;
#[cfg(feature = "camera")]
mod device;
mod frame;

pub use camera::{CaptureError, CaptureSource, Facing, MockCamera};
pub use config::{
    CaptureConfig, ConfigError, ExportConfig, FileConfig, FilterConfig, MetricsConfig,
    RenderConfig,
};
#[cfg(feature = "camera")]
pub use device::DeviceCamera;
pub use frame::{Frame, FrameError, BYTES_PER_PIXEL};
