//! User-facing controls.
//!
//! Each UI gesture maps to one explicit call here: the intensity slider,
//! the enable toggle, camera flip, capture, record start/stop and share.

use crate::capture::{CaptureSource, Facing, Frame, FrameError};
use crate::export::{
    Clip, ExportFailure, ExportOutcome, FallbackChain, RecordingError, SegmentRecorder,
    StatusGlyph, Watermark, MAX_CLIP_DURATION,
};
use crate::filter::{Intensity, SharedFilterState};
use crate::render::{PreviewSurface, RenderError, RenderLoop};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors surfaced to the user by a control action.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("no frame on screen to capture")]
    NoFrame,
    #[error("already recording")]
    AlreadyRecording,
    #[error("not recording")]
    NotRecording,
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error(transparent)]
    Export(#[from] ExportFailure),
    /// A finished clip could not be saved on any path. The clip is handed
    /// back so it can be retried with [`Controls::save_clip`] or shared.
    #[error("clip export failed: {failure}")]
    ClipExport {
        clip: Clip,
        #[source]
        failure: ExportFailure,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Running totals for export activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportStats {
    pub exports: u64,
    pub failures: u64,
    pub cancellations: u64,
}

/// The control surface of a session.
pub struct Controls {
    filter: SharedFilterState,
    watermark: Watermark,
    save: FallbackChain,
    share: FallbackChain,
    recorder: Option<SegmentRecorder>,
    max_clip: Duration,
    segment_interval: Duration,
    stats: ExportStats,
}

impl Controls {
    /// `save` handles capture and recorded clips; `share` handles
    /// explicit share requests.
    pub fn new(
        filter: SharedFilterState,
        watermark: Watermark,
        save: FallbackChain,
        share: FallbackChain,
    ) -> Self {
        Self {
            filter,
            watermark,
            save,
            share,
            recorder: None,
            max_clip: MAX_CLIP_DURATION,
            segment_interval: Duration::from_secs(1),
            stats: ExportStats::default(),
        }
    }

    /// Sets recording limits. The duration is capped at the 30 s ceiling.
    pub fn with_recording_limits(mut self, max_clip: Duration, segment_interval: Duration) -> Self {
        self.max_clip = max_clip.min(MAX_CLIP_DURATION);
        self.segment_interval = segment_interval;
        self
    }

    /// Intensity slider, 0-100.
    pub fn set_intensity_percent(&self, percent: u8) {
        self.filter.set_intensity(Intensity::from_percent(percent));
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.filter.set_enabled(enabled);
    }

    pub fn toggle_enabled(&self) -> bool {
        self.filter.toggle()
    }

    pub fn filter(&self) -> &SharedFilterState {
        &self.filter
    }

    /// Switches between front and rear cameras.
    pub fn flip_camera<C: CaptureSource>(
        &self,
        render: &mut RenderLoop<C, PreviewSurface>,
    ) -> Result<Facing, ControlError> {
        Ok(render.flip_camera()?)
    }

    fn status(&self) -> StatusGlyph {
        if self.is_recording() {
            StatusGlyph::Recording
        } else {
            StatusGlyph::Live
        }
    }

    fn stamped_snapshot(&self, surface: &PreviewSurface) -> Result<Frame, ControlError> {
        let frame = surface.current().ok_or(ControlError::NoFrame)?;
        Ok(self.watermark.apply(frame, self.status())?)
    }

    /// Saves a stamped copy of the frame on screen.
    pub fn capture(&mut self, surface: &PreviewSurface) -> Result<ExportOutcome, ControlError> {
        let still = self.stamped_snapshot(surface)?;
        let result = self.save.export_still(&still);
        self.account(result)
    }

    /// Shares a stamped copy of the frame on screen.
    pub fn share(&mut self, surface: &PreviewSurface) -> Result<ExportOutcome, ControlError> {
        let still = self.stamped_snapshot(surface)?;
        let result = self.share.export_still(&still);
        self.account(result)
    }

    /// Shares an already finalized clip.
    pub fn share_clip(&mut self, clip: &Clip) -> Result<ExportOutcome, ControlError> {
        let result = self.share.export_clip(clip);
        self.account(result)
    }

    /// Saves an already finalized clip, e.g. one returned by a failed stop.
    pub fn save_clip(&mut self, clip: &Clip) -> Result<ExportOutcome, ControlError> {
        let result = self.save.export_clip(clip);
        self.account(result)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn start_recording(&mut self, now: Instant) -> Result<(), ControlError> {
        if self.recorder.is_some() {
            return Err(ControlError::AlreadyRecording);
        }
        self.recorder = Some(SegmentRecorder::start(
            now,
            self.max_clip,
            self.segment_interval,
        ));
        Ok(())
    }

    /// Remaining recording time, if recording.
    pub fn recording_remaining(&self, now: Instant) -> Option<Duration> {
        self.recorder.as_ref().map(|r| r.remaining(now))
    }

    /// Feeds a presented frame to the active recording.
    ///
    /// If the recording hits its ceiling the clip is saved and returned as
    /// `Some`; otherwise `None`. Does nothing when not recording.
    pub fn record_frame(
        &mut self,
        frame: &Frame,
        now: Instant,
    ) -> Result<Option<(Clip, ExportOutcome)>, ControlError> {
        let Some(recorder) = self.recorder.as_mut() else {
            return Ok(None);
        };
        let stamped = self.watermark.apply(frame, StatusGlyph::Recording)?;
        match recorder.record(&stamped, now)? {
            Some(clip) => self.finish_clip(clip).map(Some),
            None => Ok(None),
        }
    }

    /// Auto-stops the recording once its ceiling passes, even without frames.
    pub fn poll_recording(
        &mut self,
        now: Instant,
    ) -> Result<Option<(Clip, ExportOutcome)>, ControlError> {
        let Some(recorder) = self.recorder.as_mut() else {
            return Ok(None);
        };
        match recorder.poll(now) {
            Some(clip) => self.finish_clip(clip).map(Some),
            None => Ok(None),
        }
    }

    /// Stops recording and saves the clip.
    ///
    /// If every save path fails the recording is still over, and the clip
    /// comes back inside [`ControlError::ClipExport`].
    pub fn stop_recording(&mut self, now: Instant) -> Result<(Clip, ExportOutcome), ControlError> {
        let mut recorder = self.recorder.take().ok_or(ControlError::NotRecording)?;
        let clip = recorder.stop(now)?;
        self.save_finished(clip)
    }

    fn finish_clip(&mut self, clip: Clip) -> Result<(Clip, ExportOutcome), ControlError> {
        self.recorder = None;
        self.save_finished(clip)
    }

    fn save_finished(&mut self, clip: Clip) -> Result<(Clip, ExportOutcome), ControlError> {
        let result = self.save.export_clip(&clip);
        match self.tally(result) {
            Ok(outcome) => Ok((clip, outcome)),
            Err(failure) => Err(ControlError::ClipExport { clip, failure }),
        }
    }

    fn account(
        &mut self,
        result: Result<ExportOutcome, ExportFailure>,
    ) -> Result<ExportOutcome, ControlError> {
        self.tally(result).map_err(ControlError::from)
    }

    fn tally(
        &mut self,
        result: Result<ExportOutcome, ExportFailure>,
    ) -> Result<ExportOutcome, ExportFailure> {
        match result {
            Ok(ExportOutcome::Cancelled) => {
                self.stats.cancellations += 1;
                Ok(ExportOutcome::Cancelled)
            }
            Ok(outcome) => {
                self.stats.exports += 1;
                Ok(outcome)
            }
            Err(failure) => {
                self.stats.failures += 1;
                tracing::error!(error = %failure, "Export failed on every path");
                Err(failure)
            }
        }
    }

    pub fn export_stats(&self) -> ExportStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{MemoryMode, MemorySink};
    use crate::render::Surface;

    fn controls(save: FallbackChain) -> Controls {
        Controls::new(
            SharedFilterState::default(),
            Watermark::new("TEST", 4),
            save,
            FallbackChain::new().with(MemorySink::new("share").with_mode(MemoryMode::Cancel)),
        )
    }

    fn surface_with_frame() -> PreviewSurface {
        let mut surface = PreviewSurface::new();
        surface.present(Frame::filled(16, 16, [100, 100, 100, 255], 1));
        surface
    }

    #[test]
    fn test_slider_maps_to_intensity() {
        let c = controls(FallbackChain::new());
        c.set_intensity_percent(40);
        assert_eq!(c.filter().snapshot().intensity.value(), 0.4);
        assert!(!c.toggle_enabled());
    }

    #[test]
    fn test_capture_without_frame() {
        let mut c = controls(FallbackChain::new().with(MemorySink::new("mem")));
        assert!(matches!(
            c.capture(&PreviewSurface::new()),
            Err(ControlError::NoFrame)
        ));
    }

    #[test]
    fn test_capture_leaves_live_frame_untouched() {
        let mut c = controls(FallbackChain::new().with(MemorySink::new("mem")));
        let surface = surface_with_frame();

        let outcome = c.capture(&surface).unwrap();
        assert!(matches!(outcome, ExportOutcome::Exported(_)));
        assert!(surface
            .current()
            .unwrap()
            .pixels()
            .chunks_exact(4)
            .all(|px| px == [100, 100, 100, 255]));
        assert_eq!(c.export_stats().exports, 1);
    }

    #[test]
    fn test_share_cancel_is_not_an_error() {
        let mut c = controls(FallbackChain::new());
        let outcome = c.share(&surface_with_frame()).unwrap();
        assert_eq!(outcome, ExportOutcome::Cancelled);
        assert_eq!(c.export_stats().failures, 0);
        assert_eq!(c.export_stats().cancellations, 1);
    }

    #[test]
    fn test_failure_when_all_paths_fail() {
        let mut c = controls(
            FallbackChain::new().with(MemorySink::new("only").with_mode(MemoryMode::Reject)),
        );
        assert!(matches!(
            c.capture(&surface_with_frame()),
            Err(ControlError::Export(_))
        ));
        assert_eq!(c.export_stats().failures, 1);
    }

    #[test]
    fn test_recording_auto_stops_at_ceiling() {
        let mut c = controls(FallbackChain::new().with(MemorySink::new("mem")))
            .with_recording_limits(Duration::from_millis(200), Duration::from_millis(50));
        let t0 = Instant::now();
        let frame = Frame::filled(4, 4, [1, 2, 3, 255], 1);

        c.start_recording(t0).unwrap();
        assert!(matches!(
            c.start_recording(t0),
            Err(ControlError::AlreadyRecording)
        ));
        assert!(c
            .record_frame(&frame, t0 + Duration::from_millis(60))
            .unwrap()
            .is_none());

        let (clip, outcome) = c
            .poll_recording(t0 + Duration::from_millis(200))
            .unwrap()
            .unwrap();
        assert_eq!(clip.duration(), Duration::from_millis(200));
        assert!(matches!(outcome, ExportOutcome::Exported(_)));
        assert!(!c.is_recording());
        assert!(matches!(
            c.stop_recording(t0 + Duration::from_millis(300)),
            Err(ControlError::NotRecording)
        ));
    }

    #[test]
    fn test_manual_stop_recording() {
        let mut c = controls(FallbackChain::new().with(MemorySink::new("mem")));
        let t0 = Instant::now();
        c.start_recording(t0).unwrap();
        let (clip, _) = c.stop_recording(t0 + Duration::from_millis(750)).unwrap();
        assert_eq!(clip.duration(), Duration::from_millis(750));
    }

    #[test]
    fn test_clip_returned_when_save_fails() {
        let mut c = controls(
            FallbackChain::new().with(MemorySink::new("only").with_mode(MemoryMode::Reject)),
        );
        let t0 = Instant::now();
        let frame = Frame::filled(4, 4, [1, 2, 3, 255], 1);
        c.start_recording(t0).unwrap();
        c.record_frame(&frame, t0 + Duration::from_millis(10)).unwrap();

        let err = c.stop_recording(t0 + Duration::from_millis(400)).unwrap_err();
        let ControlError::ClipExport { clip, failure } = err else {
            panic!("expected the clip back, got {err:?}");
        };
        assert_eq!(clip.duration(), Duration::from_millis(400));
        assert_eq!(clip.segment_count(), 1);
        assert_eq!(failure.attempts.len(), 1);
        assert!(!c.is_recording());
        assert_eq!(c.export_stats().failures, 1);

        assert!(matches!(c.save_clip(&clip), Err(ControlError::Export(_))));
        assert_eq!(c.export_stats().failures, 2);
        assert_eq!(c.share_clip(&clip).unwrap(), ExportOutcome::Cancelled);
    }

    #[test]
    fn test_clip_returned_when_auto_stop_save_fails() {
        let mut c = controls(
            FallbackChain::new().with(MemorySink::new("only").with_mode(MemoryMode::Reject)),
        )
        .with_recording_limits(Duration::from_millis(100), Duration::from_millis(50));
        let t0 = Instant::now();
        c.start_recording(t0).unwrap();

        let err = c.poll_recording(t0 + Duration::from_millis(100)).unwrap_err();
        assert!(matches!(
            err,
            ControlError::ClipExport { ref clip, .. } if clip.duration() == Duration::from_millis(100)
        ));
        assert!(!c.is_recording());
    }
}
