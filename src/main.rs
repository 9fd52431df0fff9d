//! Spectral Tint CLI
//!
//! Runs the live filter against a camera (or the synthetic source when
//! built without the `camera` feature), optionally recording a clip and
//! saving a watermarked snapshot of the last frame.

use clap::Parser;
use spectral_tint::{
    capture::{CaptureSource, Facing, FileConfig},
    controls::{ControlError, Controls},
    export::{
        Clip, ExportOutcome, FallbackChain, PngFileSink, RawFileSink, Watermark, MAX_CLIP_MS,
    },
    filter::{Intensity, SharedFilterState},
    metrics::MetricsSnapshot,
    render::{FramePacer, LoopAction, PreviewSurface, RenderLoop, TickOutcome},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "spectral-tint", version, about = "Live spectral tint camera filter")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Filter intensity in percent (0-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    intensity: Option<u8>,

    /// Start with the filter switched off
    #[arg(long)]
    disabled: bool,

    /// Camera to open (front or rear)
    #[arg(long)]
    facing: Option<Facing>,

    /// Stop after presenting this many frames
    #[arg(short, long)]
    frames: Option<u64>,

    /// Save a watermarked snapshot of the last frame
    #[arg(long)]
    snapshot: bool,

    /// Record a clip of up to this many milliseconds (capped at 30000)
    #[arg(long)]
    record_ms: Option<u64>,

    /// Directory exports are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Port for the Prometheus exporter (0 disables)
    #[arg(long)]
    metrics_port: Option<u16>,
}

type BoxError = Box<dyn std::error::Error>;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Spectral Tint v{}", spectral_tint::VERSION);

    if let Err(e) = run(args) {
        error!(error = %e, "Session failed");
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<FileConfig, BoxError> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            FileConfig::from_file(path)?
        }
        None => FileConfig::default(),
    };

    if let Some(facing) = args.facing {
        config.capture.facing = facing;
    }
    if let Some(frames) = args.frames {
        config.render.frame_count = frames;
        config.render.continuous = false;
    }
    if let Some(dir) = &args.output_dir {
        config.export.output_dir = dir.clone();
    }
    if let Some(ms) = args.record_ms {
        config.export.max_clip_ms = ms.min(MAX_CLIP_MS);
    }
    if let Some(port) = args.metrics_port {
        config.metrics.port = port;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "camera")]
fn open_source(config: &FileConfig) -> Box<dyn CaptureSource> {
    info!("Using device camera");
    Box::new(spectral_tint::capture::DeviceCamera::new(config.capture.clone()))
}

#[cfg(not(feature = "camera"))]
fn open_source(config: &FileConfig) -> Box<dyn CaptureSource> {
    info!("Using synthetic camera input");
    Box::new(spectral_tint::capture::MockCamera::from_config(&config.capture))
}

/// Publishes metric snapshots to the HTTP exporter, whose registry is the
/// only one in the process. A no-op when no exporter is running.
struct Metrics {
    #[cfg(feature = "metrics")]
    exporter: Option<Exporter>,
}

#[cfg(feature = "metrics")]
struct Exporter {
    state: spectral_tint::metrics::SharedMetricsState,
    shutdown: tokio::sync::oneshot::Sender<()>,
    thread: std::thread::JoinHandle<()>,
}

impl Metrics {
    #[cfg(feature = "metrics")]
    fn start(port: u16) -> Result<Self, BoxError> {
        let exporter = if port == 0 {
            None
        } else {
            Some(spawn_exporter(port)?)
        };
        Ok(Self { exporter })
    }

    #[cfg(not(feature = "metrics"))]
    fn start(port: u16) -> Result<Self, BoxError> {
        if port != 0 {
            warn!(port, "Built without the metrics feature, exporter disabled");
        }
        Ok(Self {})
    }

    #[cfg(feature = "metrics")]
    fn update(&self, snapshot: &MetricsSnapshot) {
        if let Some(exporter) = &self.exporter {
            exporter.state.blocking_write().update(snapshot);
        }
    }

    #[cfg(not(feature = "metrics"))]
    fn update(&self, _snapshot: &MetricsSnapshot) {}

    #[cfg(feature = "metrics")]
    fn shutdown(self) {
        let Some(exporter) = self.exporter else {
            return;
        };
        let _ = exporter.shutdown.send(());
        if exporter.thread.join().is_err() {
            warn!("Metrics exporter thread panicked");
        }
    }

    #[cfg(not(feature = "metrics"))]
    fn shutdown(self) {}
}

#[cfg(feature = "metrics")]
fn spawn_exporter(port: u16) -> Result<Exporter, BoxError> {
    use spectral_tint::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    let server = MetricsServer::new(MetricsServerConfig::with_port(port), MetricsRegistry::new()?);
    let state = server.state();
    let (shutdown, signal) = tokio::sync::oneshot::channel::<()>();

    let thread = std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "Failed to start metrics runtime");
                return;
            }
        };
        let stop = async move {
            let _ = signal.await;
        };
        if let Err(e) = runtime.block_on(server.run_until(stop)) {
            error!(error = %e, "Metrics exporter exited");
        }
    });

    Ok(Exporter {
        state,
        shutdown,
        thread,
    })
}

fn report_export(kind: &str, outcome: &ExportOutcome) {
    match outcome {
        ExportOutcome::Exported(handle) => {
            println!("{} saved: {} ({} bytes)", kind, handle.location, handle.bytes);
        }
        ExportOutcome::Cancelled => info!(kind, "Export cancelled"),
    }
}

/// Hands a clip that no save path accepted to the share chain instead.
fn salvage_clip(controls: &mut Controls, clip: &Clip) {
    match controls.share_clip(clip) {
        Ok(outcome) => report_export("Clip", &outcome),
        Err(e) => error!(error = %e, bytes = clip.len(), "Clip lost, no export path accepted it"),
    }
}

fn report_clip(
    controls: &mut Controls,
    result: Result<Option<(Clip, ExportOutcome)>, ControlError>,
) {
    match result {
        Ok(Some((clip, outcome))) => {
            info!(
                duration_ms = clip.duration().as_millis() as u64,
                segments = clip.segment_count(),
                "Recording reached its limit"
            );
            report_export("Clip", &outcome);
        }
        Ok(None) => {}
        Err(ControlError::ClipExport { clip, failure }) => {
            warn!(error = %failure, "Saving clip failed, trying share");
            salvage_clip(controls, &clip);
        }
        Err(e) => warn!(error = %e, "Recording failed"),
    }
}

fn run(args: Args) -> Result<(), BoxError> {
    let config = load_config(&args)?;

    let filter = SharedFilterState::new(config.filter.to_state());
    if let Some(percent) = args.intensity {
        filter.set_intensity(Intensity::from_percent(percent));
    }
    if args.disabled {
        filter.set_enabled(false);
    }
    let initial = filter.snapshot();
    info!(
        enabled = initial.enabled,
        intensity = initial.intensity.value(),
        "Filter configured"
    );

    let out_dir = &config.export.output_dir;
    let save = FallbackChain::new()
        .with(PngFileSink::new(out_dir))
        .with(RawFileSink::new(out_dir));
    let share = FallbackChain::new().with(RawFileSink::new(out_dir.join("shared")));
    let mut controls = Controls::new(
        filter.clone(),
        Watermark::new(config.export.caption.clone(), config.export.band_height),
        save,
        share,
    )
    .with_recording_limits(
        Duration::from_millis(config.export.max_clip_ms),
        Duration::from_millis(config.export.segment_interval_ms),
    );

    let metrics = Metrics::start(config.metrics.port)?;

    let mut render: RenderLoop<Box<dyn CaptureSource>, PreviewSurface> =
        RenderLoop::new(PreviewSurface::new(), filter.clone());
    render.start(open_source(&config), config.capture.facing)?;

    let stop = render.stop_handle();
    ctrlc::set_handler(move || stop.stop())?;

    if args.record_ms.is_some() {
        controls.start_recording(Instant::now())?;
        info!(max_ms = config.export.max_clip_ms, "Recording started");
    }

    let frame_budget = (!config.render.continuous).then_some(config.render.frame_count);
    let mut pacer = FramePacer::new(config.capture.fps);

    let stats = render.run(&mut pacer, |render, outcome| {
        let now = Instant::now();
        if let TickOutcome::Presented { .. } = outcome {
            if let Some(frame) = render.surface().current() {
                let result = controls.record_frame(frame, now);
                report_clip(&mut controls, result);
            }
        }
        let result = controls.poll_recording(now);
        report_clip(&mut controls, result);

        let stats = render.stats();
        metrics.update(&MetricsSnapshot::from_components(
            render.state(),
            &stats,
            &render.filter().snapshot(),
            &controls.export_stats(),
            controls.is_recording(),
        ));

        match frame_budget {
            Some(budget) if stats.frames_presented >= budget => LoopAction::Stop,
            _ => LoopAction::Continue,
        }
    })?;

    if controls.is_recording() {
        match controls.stop_recording(Instant::now()) {
            Ok((clip, outcome)) => {
                info!(
                    duration_ms = clip.duration().as_millis() as u64,
                    segments = clip.segment_count(),
                    "Recording stopped"
                );
                report_export("Clip", &outcome);
            }
            Err(ControlError::ClipExport { clip, failure }) => {
                warn!(error = %failure, "Saving clip failed, trying share");
                salvage_clip(&mut controls, &clip);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if args.snapshot {
        let outcome = controls.capture(render.surface())?;
        report_export("Snapshot", &outcome);
    }

    let exports = controls.export_stats();
    metrics.update(&MetricsSnapshot::from_components(
        render.state(),
        &stats,
        &filter.snapshot(),
        &exports,
        false,
    ));

    info!(
        ticks = stats.ticks,
        presented = stats.frames_presented,
        skipped = stats.frames_skipped,
        passed_through = stats.frames_passed_through,
        exports = exports.exports,
        "Done"
    );
    metrics.shutdown();
    Ok(())
}
