//! The render loop state machine.
//!
//! ```text
//! Idle --start--> Running --stop / capture failure--> Stopped
//!                    ^                                   |
//!                    +--------------start----------------+
//! ```
//!
//! Each tick pulls at most one frame, filters it with the filter state
//! read once at the start of the tick, and presents it. Ticks run one at
//! a time on the thread that owns the loop.

use super::pacing::FramePacer;
use super::surface::Surface;
use crate::capture::{CaptureError, CaptureSource, Facing, FrameError};
use crate::filter::{FilterState, FrameProcessor, SharedFilterState};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Lifecycle state of a [`RenderLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No source attached yet.
    Idle,
    /// Ticks are armed and frames flow.
    Running,
    /// Stopped by request or by a capture failure.
    Stopped,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was processed and presented.
    Presented {
        sequence: u64,
        /// Whether the filter was applied (false for pass-through).
        filtered: bool,
    },
    /// The source had no new frame; nothing was presented.
    NoFrame,
    /// The loop is not running; the tick did nothing.
    Stopped,
}

/// Returned by the per-tick callback of [`RenderLoop::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Errors surfaced by the render loop.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(#[source] CaptureError),
    #[error(transparent)]
    InvalidFrame(#[from] FrameError),
    #[error("render loop already running")]
    AlreadyRunning,
    #[error("no capture source attached")]
    NoSource,
}

/// Counters for one loop instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderStats {
    /// Ticks executed while running.
    pub ticks: u64,
    /// Frames handed to the surface.
    pub frames_presented: u64,
    /// Ticks where the source had nothing new.
    pub frames_skipped: u64,
    /// Presented frames that bypassed the filter.
    pub frames_passed_through: u64,
    /// Processing time of the most recent presented frame.
    pub last_process_time: Duration,
}

type Control = Arc<Mutex<LoopState>>;

fn lock(control: &Control) -> MutexGuard<'_, LoopState> {
    control.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cross-thread handle that stops a [`RenderLoop`].
///
/// A tick holds the loop's state lock from its running check through its
/// present step, so once [`StopHandle::stop`] returns no further frame
/// will be presented.
#[derive(Debug, Clone)]
pub struct StopHandle {
    control: Control,
}

impl StopHandle {
    /// Stops the loop. Idempotent.
    pub fn stop(&self) {
        let mut state = lock(&self.control);
        if *state == LoopState::Running {
            *state = LoopState::Stopped;
            tracing::info!("Render loop stop requested");
        }
    }

    pub fn state(&self) -> LoopState {
        *lock(&self.control)
    }
}

/// Drives capture, filtering and presentation.
pub struct RenderLoop<C, S> {
    control: Control,
    source: Option<C>,
    facing: Facing,
    surface: S,
    processor: FrameProcessor,
    filter: SharedFilterState,
    stats: RenderStats,
}

impl<C: CaptureSource, S: Surface> RenderLoop<C, S> {
    /// Creates an idle loop presenting to `surface` and reading `filter`.
    pub fn new(surface: S, filter: SharedFilterState) -> Self {
        Self::with_processor(surface, filter, FrameProcessor::new())
    }

    pub fn with_processor(surface: S, filter: SharedFilterState, processor: FrameProcessor) -> Self {
        Self {
            control: Arc::new(Mutex::new(LoopState::Idle)),
            source: None,
            facing: Facing::default(),
            surface,
            processor,
            filter,
            stats: RenderStats::default(),
        }
    }

    /// Opens `source` and starts ticking.
    ///
    /// Allowed from `Idle` or `Stopped`. If the camera cannot be opened the
    /// loop ends up `Stopped`, keeps the source for a manual
    /// [`retry`](Self::retry), and returns [`RenderError::CaptureUnavailable`].
    pub fn start(&mut self, source: C, facing: Facing) -> Result<(), RenderError> {
        if self.state() == LoopState::Running {
            return Err(RenderError::AlreadyRunning);
        }
        if let Some(mut old) = self.source.take() {
            old.close();
        }
        self.source = Some(source);
        self.facing = facing;
        self.open_and_run()
    }

    /// Re-opens the retained source after a stop or capture failure.
    pub fn retry(&mut self) -> Result<(), RenderError> {
        if self.state() == LoopState::Running {
            return Err(RenderError::AlreadyRunning);
        }
        if self.source.is_none() {
            return Err(RenderError::NoSource);
        }
        tracing::info!(facing = %self.facing, "Retrying capture");
        self.open_and_run()
    }

    /// Switches to the opposite camera, keeping the loop state.
    pub fn flip_camera(&mut self) -> Result<Facing, RenderError> {
        let facing = self.facing.flipped();
        let control = Arc::clone(&self.control);
        let mut state = lock(&control);
        let source = self.source.as_mut().ok_or(RenderError::NoSource)?;

        source.close();
        self.facing = facing;
        if *state != LoopState::Running {
            return Ok(facing);
        }
        if let Err(e) = source.open(facing) {
            *state = LoopState::Stopped;
            tracing::warn!(%facing, error = %e, "Camera flip failed");
            return Err(RenderError::CaptureUnavailable(e));
        }
        tracing::info!(%facing, "Camera flipped");
        Ok(facing)
    }

    fn open_and_run(&mut self) -> Result<(), RenderError> {
        let control = Arc::clone(&self.control);
        let mut state = lock(&control);
        let source = self.source.as_mut().ok_or(RenderError::NoSource)?;

        if !source.is_open() || source.facing() != Some(self.facing) {
            if let Err(e) = source.open(self.facing) {
                *state = LoopState::Stopped;
                tracing::warn!(facing = %self.facing, error = %e, "Capture unavailable");
                return Err(RenderError::CaptureUnavailable(e));
            }
        }

        *state = LoopState::Running;
        tracing::info!(facing = %self.facing, "Render loop started");
        Ok(())
    }

    /// Stops the loop and closes the source. Idempotent.
    pub fn stop(&mut self) {
        let control = Arc::clone(&self.control);
        let mut state = lock(&control);
        if *state == LoopState::Running {
            *state = LoopState::Stopped;
            tracing::info!(
                presented = self.stats.frames_presented,
                "Render loop stopped"
            );
        }
        self.release_source(*state);
    }

    /// Runs one tick.
    pub fn tick(&mut self) -> Result<TickOutcome, RenderError> {
        let control = Arc::clone(&self.control);
        let mut state = lock(&control);
        if *state != LoopState::Running {
            self.release_source(*state);
            return Ok(TickOutcome::Stopped);
        }

        self.stats.ticks += 1;
        let Some(source) = self.source.as_mut() else {
            *state = LoopState::Stopped;
            return Err(RenderError::NoSource);
        };

        let mut frame = match source.poll_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.stats.frames_skipped += 1;
                return Ok(TickOutcome::NoFrame);
            }
            Err(e) => {
                *state = LoopState::Stopped;
                source.close();
                tracing::warn!(error = %e, "Capture failed, render loop stopped");
                return Err(RenderError::CaptureUnavailable(e));
            }
        };

        let filter: FilterState = self.filter.snapshot();
        let started = Instant::now();
        let filtered = filter.is_active();
        if filtered {
            if let Err(e) = self.processor.process_in_place(&mut frame, filter) {
                *state = LoopState::Stopped;
                source.close();
                tracing::error!(error = %e, "Malformed frame from source");
                return Err(e.into());
            }
        } else {
            frame.validate().map_err(|e| {
                *state = LoopState::Stopped;
                source.close();
                RenderError::from(e)
            })?;
            self.stats.frames_passed_through += 1;
        }
        self.stats.last_process_time = started.elapsed();

        let sequence = frame.sequence();
        self.surface.present(frame);
        self.stats.frames_presented += 1;

        tracing::trace!(sequence, filtered, "Frame presented");
        Ok(TickOutcome::Presented { sequence, filtered })
    }

    /// Ticks until the loop stops or `on_tick` asks it to.
    ///
    /// Sleeps between ticks as directed by `pacer`. A stop from a
    /// [`StopHandle`] ends the run after the current tick.
    pub fn run<F>(&mut self, pacer: &mut FramePacer, mut on_tick: F) -> Result<RenderStats, RenderError>
    where
        F: FnMut(&mut Self, TickOutcome) -> LoopAction,
    {
        pacer.reset();
        loop {
            let outcome = self.tick()?;
            if outcome == TickOutcome::Stopped {
                break;
            }
            if on_tick(self, outcome) == LoopAction::Stop {
                self.stop();
                break;
            }
            let wait = pacer.tick(Instant::now());
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
        }
        Ok(self.stats)
    }

    fn release_source(&mut self, state: LoopState) {
        if state == LoopState::Stopped {
            if let Some(source) = self.source.as_mut() {
                if source.is_open() {
                    source.close();
                }
            }
        }
    }

    pub fn state(&self) -> LoopState {
        *lock(&self.control)
    }

    /// A handle that can stop this loop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            control: Arc::clone(&self.control),
        }
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn filter(&self) -> &SharedFilterState {
        &self.filter
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Detaches the source, closing it first.
    pub fn take_source(&mut self) -> Option<C> {
        let mut source = self.source.take()?;
        source.close();
        Some(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCamera;
    use crate::render::PreviewSurface;

    fn new_loop() -> RenderLoop<MockCamera, PreviewSurface> {
        RenderLoop::new(PreviewSurface::new(), SharedFilterState::default())
    }

    #[test]
    fn test_starts_idle() {
        let mut render = new_loop();
        assert_eq!(render.state(), LoopState::Idle);
        assert_eq!(render.tick().unwrap(), TickOutcome::Stopped);
        assert_eq!(render.surface().presented(), 0);
    }

    #[test]
    fn test_start_tick_present() {
        let mut render = new_loop();
        render.start(MockCamera::new(4, 4), Facing::Rear).unwrap();
        assert_eq!(render.state(), LoopState::Running);

        let outcome = render.tick().unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Presented {
                sequence: 1,
                filtered: true
            }
        );
        assert_eq!(render.surface().presented(), 1);
    }

    #[test]
    fn test_no_frame_does_not_present() {
        let mut render = new_loop();
        render
            .start(MockCamera::new(4, 4).ready_every(2), Facing::Rear)
            .unwrap();

        assert_eq!(render.tick().unwrap(), TickOutcome::NoFrame);
        assert_eq!(render.surface().presented(), 0);
        assert!(matches!(
            render.tick().unwrap(),
            TickOutcome::Presented { .. }
        ));
        assert_eq!(render.stats().frames_skipped, 1);
    }

    #[test]
    fn test_stop_is_idempotent_and_closes_source() {
        let mut render = new_loop();
        render.start(MockCamera::new(4, 4), Facing::Rear).unwrap();
        render.stop();
        render.stop();

        assert_eq!(render.state(), LoopState::Stopped);
        let source = render.take_source().unwrap();
        assert!(!source.is_open());
    }

    #[test]
    fn test_start_while_running_rejected() {
        let mut render = new_loop();
        render.start(MockCamera::new(4, 4), Facing::Rear).unwrap();
        assert!(matches!(
            render.start(MockCamera::new(4, 4), Facing::Rear),
            Err(RenderError::AlreadyRunning)
        ));
    }

    #[test]
    fn test_disabled_filter_passes_raw_frame() {
        let filter = SharedFilterState::new(FilterState::disabled());
        let mut render = RenderLoop::new(PreviewSurface::new(), filter);
        render.start(MockCamera::new(4, 4), Facing::Rear).unwrap();

        let mut reference = MockCamera::new(4, 4);
        reference.open(Facing::Rear).unwrap();
        let raw = reference.poll_frame().unwrap().unwrap();

        assert_eq!(
            render.tick().unwrap(),
            TickOutcome::Presented {
                sequence: 1,
                filtered: false
            }
        );
        assert_eq!(render.surface().current().unwrap().pixels(), raw.pixels());
        assert_eq!(render.stats().frames_passed_through, 1);
    }

    #[test]
    fn test_flip_camera_reopens_source() {
        let mut render = new_loop();
        render.start(MockCamera::new(4, 4), Facing::Rear).unwrap();

        assert_eq!(render.flip_camera().unwrap(), Facing::Front);
        assert_eq!(render.facing(), Facing::Front);
        assert!(matches!(
            render.tick().unwrap(),
            TickOutcome::Presented { .. }
        ));
    }
}
