//! Export paths: watermarking, file sinks, fallback and recording limits.

use spectral_tint::capture::{Facing, Frame, MockCamera};
use spectral_tint::controls::Controls;
use spectral_tint::export::{
    ExportError, ExportOutcome, ExportSink, FallbackChain, MemoryMode, MemorySink, PngFileSink,
    RawFileSink, SegmentRecorder, StatusGlyph, Watermark, FRAME_HEADER_LEN, MAX_CLIP_DURATION,
};
use spectral_tint::filter::SharedFilterState;
use spectral_tint::render::{PreviewSurface, RenderLoop};
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "spectral-tint-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn exported_path(outcome: &ExportOutcome) -> PathBuf {
    match outcome {
        ExportOutcome::Exported(handle) => PathBuf::from(&handle.location),
        other => panic!("expected an export, got {:?}", other),
    }
}

#[test]
fn png_sink_writes_decodable_file() {
    let dir = scratch_dir("png");
    let mut sink = PngFileSink::new(&dir);
    let frame = Frame::filled(32, 20, [10, 200, 30, 255], 1);

    let handle = sink.export_still(&frame).unwrap();
    assert_eq!(handle.sink, "png-file");

    let decoded = image::open(&handle.location).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (32, 20));
    assert_eq!(decoded.get_pixel(3, 3).0, [10, 200, 30, 255]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn clip_falls_back_to_raw_sink() {
    let dir = scratch_dir("clip");
    let mut chain = FallbackChain::new()
        .with(PngFileSink::new(&dir))
        .with(RawFileSink::new(&dir));

    let t0 = Instant::now();
    let mut recorder = SegmentRecorder::start(t0, Duration::from_secs(2), Duration::from_millis(100));
    let frame = Frame::filled(4, 4, [1, 2, 3, 255], 7);
    recorder.record(&frame, t0).unwrap();
    let clip = recorder.stop(t0 + Duration::from_millis(40)).unwrap();

    let outcome = chain.export_clip(&clip).unwrap();
    let ExportOutcome::Exported(handle) = &outcome else {
        panic!("clip was not exported");
    };
    assert_eq!(handle.sink, "raw-file");

    let written = std::fs::read(exported_path(&outcome)).unwrap();
    assert_eq!(written, clip.to_bytes());
    assert_eq!(written.len(), FRAME_HEADER_LEN + 4 * 4 * 4);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn all_paths_failing_is_reported() {
    let mut chain = FallbackChain::new()
        .with(MemorySink::new("share").with_mode(MemoryMode::Reject))
        .with(MemorySink::new("gallery").with_mode(MemoryMode::Reject));

    let failure = chain
        .export_still(&Frame::filled(2, 2, [0, 0, 0, 255], 1))
        .unwrap_err();
    let names: Vec<&str> = failure.attempts.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["share", "gallery"]);
    assert!(failure
        .attempts
        .iter()
        .all(|(_, e)| matches!(e, ExportError::Rejected(_))));
}

#[test]
fn recording_finalizes_at_exactly_max_duration() {
    let t0 = Instant::now();
    let max = Duration::from_millis(500);
    let mut recorder = SegmentRecorder::start(t0, max, Duration::from_millis(100));

    for i in 0..5u64 {
        let frame = Frame::filled(2, 2, [9, 9, 9, 255], i + 1);
        let at = t0 + Duration::from_millis(i * 100);
        assert!(recorder.record(&frame, at).unwrap().is_none());
    }
    assert!(recorder.poll(t0 + Duration::from_millis(499)).is_none());

    let clip = recorder.poll(t0 + Duration::from_millis(650)).unwrap();
    assert_eq!(clip.duration(), max);
    assert_eq!(recorder.frames_recorded(), 5);
    assert!(recorder.session().is_finalized());

    // Sequence numbers survive in the per-frame headers.
    let first = clip.segments().next().unwrap();
    assert_eq!(&first[8..16], &1u64.to_le_bytes());
}

#[test]
fn recording_request_above_ceiling_is_capped() {
    let t0 = Instant::now();
    let mut recorder = SegmentRecorder::start(t0, Duration::from_secs(120), Duration::from_secs(1));
    assert_eq!(recorder.session().max_duration(), MAX_CLIP_DURATION);
    let clip = recorder.poll(t0 + MAX_CLIP_DURATION).unwrap();
    assert_eq!(clip.duration(), MAX_CLIP_DURATION);
}

#[test]
fn watermark_never_touches_displayed_frame() {
    let filter = SharedFilterState::default();
    let mut render: RenderLoop<MockCamera, PreviewSurface> =
        RenderLoop::new(PreviewSurface::new(), filter.clone());
    render.start(MockCamera::new(64, 64), Facing::Rear).unwrap();
    render.tick().unwrap();

    let displayed = render.surface().snapshot().unwrap();
    let stamped = Watermark::default()
        .apply(render.surface().current().unwrap(), StatusGlyph::Live)
        .unwrap();

    assert_ne!(stamped.pixels(), displayed.pixels());
    assert_eq!(render.surface().current().unwrap().pixels(), displayed.pixels());
}

#[test]
fn capture_from_live_loop_to_disk() {
    let dir = scratch_dir("capture");
    let filter = SharedFilterState::default();
    let mut render: RenderLoop<MockCamera, PreviewSurface> =
        RenderLoop::new(PreviewSurface::new(), filter.clone());
    render.start(MockCamera::new(48, 48), Facing::Rear).unwrap();
    render.tick().unwrap();

    let mut controls = Controls::new(
        filter,
        Watermark::new("TEST", 8),
        FallbackChain::new()
            .with(MemorySink::new("gallery").with_mode(MemoryMode::Reject))
            .with(PngFileSink::new(&dir)),
        FallbackChain::new(),
    );

    let outcome = controls.capture(render.surface()).unwrap();
    let path = exported_path(&outcome);
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
    assert_eq!(image::open(&path).unwrap().width(), 48);
    assert_eq!(controls.export_stats().exports, 1);

    let _ = std::fs::remove_dir_all(&dir);
}
