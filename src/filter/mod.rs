//! Spectral tint filter.
//!
//! [`ColorTransform`] is the pure per-pixel function, [`FrameProcessor`]
//! applies it across a frame, and [`FilterState`] carries the user's
//! enable/intensity settings between ticks.

mod processor;
mod state;
mod transform;

pub use processor::{FrameProcessor, PARALLEL_ROW_THRESHOLD};
pub use state::{FilterState, SharedFilterState};
pub use transform::{
    blend, clamp_channel, contrast, darken, spectral_pass, ColorTransform, Intensity,
    BLUE_TRANSMISSION, CONTRAST_BOOST, CONTRAST_MIDPOINT, DARKNESS_FACTOR, GREEN_TRANSMISSION,
    RED_TRANSMISSION, VIOLET_MIX,
};
