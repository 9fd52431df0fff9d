//! Tick pacing for the render loop.
//!
//! The pacer only computes how long to wait; the caller does the sleeping.

use std::time::{Duration, Instant};

/// Default target tick rate.
pub const DEFAULT_FPS: u32 = 30;

/// Spaces ticks at a fixed rate with drift correction.
///
/// If the loop falls more than two frames behind, the schedule restarts
/// from now instead of bursting to catch up.
#[derive(Debug, Clone)]
pub struct FramePacer {
    frame_duration: Duration,
    next_frame: Option<Instant>,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        let fps = fps.clamp(1, 1000);
        Self {
            frame_duration: Duration::from_secs(1) / fps,
            next_frame: None,
        }
    }

    /// The interval between scheduled ticks.
    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Records a tick at `now` and returns how long to wait before the next.
    pub fn tick(&mut self, now: Instant) -> Duration {
        let max_drift = self.frame_duration * 2;
        let scheduled = match self.next_frame {
            Some(next) if now <= next + max_drift => next,
            _ => now,
        };

        let next = scheduled + self.frame_duration;
        self.next_frame = Some(next);
        next.saturating_duration_since(now)
    }

    /// Forgets the schedule, e.g. after the loop was stopped.
    pub fn reset(&mut self) {
        self.next_frame = None;
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}
