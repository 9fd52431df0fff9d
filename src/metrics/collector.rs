//! Metrics collection and registry.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of session state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Whether the render loop is running.
    pub loop_running: bool,
    /// Ticks executed.
    pub ticks: u64,
    /// Frames presented.
    pub frames_presented: u64,
    /// Ticks with no new frame.
    pub frames_skipped: u64,
    /// Processing time of the latest frame, in seconds.
    pub process_seconds: f64,
    /// Current filter intensity.
    pub intensity: f64,
    /// Whether the filter is enabled.
    pub filter_enabled: bool,
    /// Successful exports.
    pub exports: u64,
    /// Exports where every path failed.
    pub export_failures: u64,
    /// Whether a recording is in progress.
    pub recording: bool,
}

/// Prometheus metrics registry for the tint pipeline.
pub struct MetricsRegistry {
    registry: Registry,

    // Loop metrics
    loop_running: IntGauge,
    ticks_total: IntCounter,
    frames_presented_total: IntCounter,
    frames_skipped_total: IntCounter,
    process_seconds: Gauge,

    // Filter metrics
    intensity: Gauge,
    filter_enabled: IntGauge,

    // Export metrics
    exports_total: IntCounter,
    export_failures_total: IntCounter,
    recording: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let loop_running = IntGauge::new(
            "spectral_tint_loop_running",
            "Render loop state (1=running, 0=idle or stopped)",
        )?;
        let ticks_total =
            IntCounter::new("spectral_tint_ticks_total", "Total render loop ticks")?;
        let frames_presented_total = IntCounter::new(
            "spectral_tint_frames_presented_total",
            "Total frames presented",
        )?;
        let frames_skipped_total = IntCounter::new(
            "spectral_tint_frames_skipped_total",
            "Ticks where no new frame was ready",
        )?;
        let process_seconds = Gauge::new(
            "spectral_tint_process_seconds",
            "Processing time of the most recent frame",
        )?;

        let intensity = Gauge::new("spectral_tint_intensity", "Current filter intensity (0-1)")?;
        let filter_enabled = IntGauge::new(
            "spectral_tint_filter_enabled",
            "Filter toggle (1=enabled, 0=disabled)",
        )?;

        let exports_total =
            IntCounter::new("spectral_tint_exports_total", "Total successful exports")?;
        let export_failures_total = IntCounter::new(
            "spectral_tint_export_failures_total",
            "Exports that failed on every path",
        )?;
        let recording = IntGauge::new(
            "spectral_tint_recording",
            "Recording state (1=recording, 0=idle)",
        )?;

        registry.register(Box::new(loop_running.clone()))?;
        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(frames_presented_total.clone()))?;
        registry.register(Box::new(frames_skipped_total.clone()))?;
        registry.register(Box::new(process_seconds.clone()))?;
        registry.register(Box::new(intensity.clone()))?;
        registry.register(Box::new(filter_enabled.clone()))?;
        registry.register(Box::new(exports_total.clone()))?;
        registry.register(Box::new(export_failures_total.clone()))?;
        registry.register(Box::new(recording.clone()))?;

        Ok(Self {
            registry,
            loop_running,
            ticks_total,
            frames_presented_total,
            frames_skipped_total,
            process_seconds,
            intensity,
            filter_enabled,
            exports_total,
            export_failures_total,
            recording,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.loop_running.set(i64::from(snapshot.loop_running));

        // Counters only move forward by the difference
        advance(&self.ticks_total, snapshot.ticks);
        advance(&self.frames_presented_total, snapshot.frames_presented);
        advance(&self.frames_skipped_total, snapshot.frames_skipped);
        self.process_seconds.set(snapshot.process_seconds);

        self.intensity.set(snapshot.intensity);
        self.filter_enabled.set(i64::from(snapshot.filter_enabled));

        advance(&self.exports_total, snapshot.exports);
        advance(&self.export_failures_total, snapshot.export_failures);
        self.recording.set(i64::from(snapshot.recording));
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from the current state of session components.
    pub fn from_components(
        state: crate::render::LoopState,
        stats: &crate::render::RenderStats,
        filter: &crate::filter::FilterState,
        exports: &crate::controls::ExportStats,
        recording: bool,
    ) -> Self {
        Self {
            loop_running: state == crate::render::LoopState::Running,
            ticks: stats.ticks,
            frames_presented: stats.frames_presented,
            frames_skipped: stats.frames_skipped,
            process_seconds: stats.last_process_time.as_secs_f64(),
            intensity: f64::from(filter.intensity.value()),
            filter_enabled: filter.enabled,
            exports: exports.exports,
            export_failures: exports.failures,
            recording,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::ExportStats;
    use crate::filter::FilterState;
    use crate::render::{LoopState, RenderStats};

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update_and_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let stats = RenderStats {
            ticks: 12,
            frames_presented: 10,
            frames_skipped: 2,
            ..Default::default()
        };
        let snapshot = MetricsSnapshot::from_components(
            LoopState::Running,
            &stats,
            &FilterState::default(),
            &ExportStats::default(),
            false,
        );
        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("spectral_tint_loop_running 1"));
        assert!(output.contains("spectral_tint_frames_presented_total 10"));
        assert!(output.contains("spectral_tint_frames_skipped_total 2"));
        assert!(output.contains("spectral_tint_filter_enabled 1"));
    }

    #[test]
    fn test_counters_monotonic() {
        let registry = MetricsRegistry::new().unwrap();
        let mut snapshot = MetricsSnapshot {
            ticks: 10,
            ..Default::default()
        };
        registry.update(&snapshot);

        // A lower value never decrements a counter
        snapshot.ticks = 5;
        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("spectral_tint_ticks_total 10"));
    }
}
