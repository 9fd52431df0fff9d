//! Spectral Tint Library
//!
//! A live camera filter that reshapes each frame's colour through a
//! simulated narrow-band optical filter: red and green are suppressed,
//! blue passes, and the result is darkened and pushed toward violet.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → filter → render (surface)
//!                        ↓
//!            controls → export (watermark, recording, sinks)
//! ```
//!
//! # Design Principles
//!
//! - **Pure transform**: the per-pixel colour mapping has no hidden state
//! - **Snapshot reads**: each tick reads the filter state exactly once
//! - **Explicit lifecycle**: the render loop is an Idle/Running/Stopped machine
//! - **Graceful export**: sinks are tried in rank order until one succeeds
//!
//! # Example
//!
//! ```no_run
//! use spectral_tint::{
//!     capture::{Facing, MockCamera},
//!     filter::{Intensity, SharedFilterState},
//!     render::{PreviewSurface, RenderLoop},
//! };
//!
//! let filter = SharedFilterState::default();
//! let mut render = RenderLoop::new(PreviewSurface::new(), filter.clone());
//! render.start(MockCamera::new(640, 480), Facing::Rear).unwrap();
//!
//! for _ in 0..10 {
//!     render.tick().unwrap();
//! }
//!
//! // Takes effect on the next tick
//! filter.set_intensity(Intensity::FULL);
//! render.tick().unwrap();
//! render.stop();
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod controls;
pub mod export;
pub mod filter;
pub mod metrics;
pub mod render;

// Re-export commonly used types at crate root
pub use capture::{CaptureConfig, CaptureSource, Facing, FileConfig, Frame, MockCamera};
pub use controls::{ControlError, Controls};
pub use export::{ExportOutcome, FallbackChain, Watermark};
pub use filter::{ColorTransform, FilterState, FrameProcessor, Intensity, SharedFilterState};
pub use render::{LoopState, PreviewSurface, RenderLoop, StopHandle};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
