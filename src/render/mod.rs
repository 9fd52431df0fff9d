//! Frame-by-frame rendering.
//!
//! [`RenderLoop`] pulls frames from a capture source, filters them and
//! hands them to a [`Surface`]. [`FramePacer`] spaces ticks at the target
//! frame rate.

mod pacing;
mod render_loop;
mod surface;

pub use pacing::{FramePacer, DEFAULT_FPS};
pub use render_loop::{
    LoopAction, LoopState, RenderError, RenderLoop, RenderStats, StopHandle, TickOutcome,
};
pub use surface::{PreviewSurface, Surface};
