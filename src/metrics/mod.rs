//! Prometheus metrics for the render pipeline.
//!
//! # Metrics Exposed
//!
//! - `spectral_tint_loop_running` - Render loop state (1=running)
//! - `spectral_tint_ticks_total` - Render ticks executed
//! - `spectral_tint_frames_presented_total` - Frames presented
//! - `spectral_tint_frames_skipped_total` - Ticks with no new frame
//! - `spectral_tint_process_seconds` - Latest per-frame processing time
//! - `spectral_tint_intensity` - Current filter intensity
//! - `spectral_tint_filter_enabled` - Filter toggle
//! - `spectral_tint_exports_total` - Successful exports
//! - `spectral_tint_export_failures_total` - Exports failing on every path
//! - `spectral_tint_recording` - Recording in progress
//!
//! With the `metrics` feature, [`MetricsServer`] serves these at
//! `/metrics` alongside `/health` and `/status`.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{
    MetricsServer, MetricsServerConfig, MetricsState, ServerError, SharedMetricsState,
};
