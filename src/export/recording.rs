//! Short clip recording.
//!
//! A [`RecordingSession`] collects binary segments and is finalized exactly
//! once into a [`Clip`], either on request or automatically when it
//! reaches its maximum duration. [`SegmentRecorder`] feeds a session from
//! presented frames, flushing a segment on its own cadence.

use crate::capture::Frame;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Hard ceiling for a recording, in milliseconds.
pub const MAX_CLIP_MS: u64 = 30_000;

/// Hard ceiling for a recording.
pub const MAX_CLIP_DURATION: Duration = Duration::from_millis(MAX_CLIP_MS);

/// Errors from recording sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordingError {
    #[error("recording session already finalized")]
    AlreadyFinalized,
    #[error("recording session reached its maximum duration")]
    DeadlinePassed,
}

/// A finalized recording ready for export.
///
/// Segments are kept as flushed; nothing is copied at finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    segments: Vec<Vec<u8>>,
    duration: Duration,
}

impl Clip {
    /// Builds a clip from segments in recording order. Empty segments are
    /// dropped.
    pub fn new(mut segments: Vec<Vec<u8>>, duration: Duration) -> Self {
        segments.retain(|s| !s.is_empty());
        Self { segments, duration }
    }

    /// Recorded duration, never above the session maximum.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Iterates the segments in recording order.
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.segments.iter().map(Vec::as_slice)
    }

    /// Total size in bytes across all segments.
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Streams every segment, in order, into `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for segment in &self.segments {
            writer.write_all(segment)?;
        }
        Ok(())
    }

    /// All segments joined into one buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.segments.concat()
    }
}

/// An in-progress recording.
#[derive(Debug)]
pub struct RecordingSession {
    chunks: Vec<Vec<u8>>,
    started_at: Instant,
    max_duration: Duration,
    finalized: bool,
}

impl RecordingSession {
    /// Starts a session. `max_duration` is capped at [`MAX_CLIP_DURATION`].
    pub fn start(now: Instant, max_duration: Duration) -> Self {
        let max_duration = max_duration.min(MAX_CLIP_DURATION);
        tracing::info!(max_ms = max_duration.as_millis() as u64, "Recording started");
        Self {
            chunks: Vec::new(),
            started_at: now,
            max_duration,
            finalized: false,
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// The instant at which the session finalizes itself.
    pub fn deadline(&self) -> Instant {
        self.started_at + self.max_duration
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Appends one segment captured at `now`. Empty chunks are ignored.
    ///
    /// Rejected once finalized, and for anything at or past the deadline.
    pub fn append(&mut self, chunk: Vec<u8>, now: Instant) -> Result<(), RecordingError> {
        if self.finalized {
            return Err(RecordingError::AlreadyFinalized);
        }
        if now >= self.deadline() {
            return Err(RecordingError::DeadlinePassed);
        }
        if !chunk.is_empty() {
            tracing::debug!(bytes = chunk.len(), index = self.chunks.len(), "Segment appended");
            self.chunks.push(chunk);
        }
        Ok(())
    }

    /// Finalizes the session if its maximum duration has elapsed.
    ///
    /// The returned clip's duration is exactly the maximum. Returns `None`
    /// before the deadline and after the session has been finalized.
    pub fn poll(&mut self, now: Instant) -> Option<Clip> {
        if self.finalized || now < self.deadline() {
            return None;
        }
        tracing::info!("Recording reached maximum duration");
        Some(self.seal(self.max_duration))
    }

    /// Finalizes the session on request.
    pub fn finalize(&mut self, now: Instant) -> Result<Clip, RecordingError> {
        if self.finalized {
            return Err(RecordingError::AlreadyFinalized);
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        Ok(self.seal(elapsed.min(self.max_duration)))
    }

    fn seal(&mut self, duration: Duration) -> Clip {
        self.finalized = true;
        let clip = Clip::new(std::mem::take(&mut self.chunks), duration);
        tracing::info!(
            segments = clip.segment_count(),
            bytes = clip.len(),
            duration_ms = duration.as_millis() as u64,
            "Recording finalized"
        );
        clip
    }
}

/// Size of the per-frame header written into segments.
pub const FRAME_HEADER_LEN: usize = 16;

/// Buffers frames and flushes them into a [`RecordingSession`].
///
/// Each frame in a segment is a 16-byte little-endian header (width u32,
/// height u32, sequence u64) followed by its RGBA bytes.
#[derive(Debug)]
pub struct SegmentRecorder {
    session: RecordingSession,
    interval: Duration,
    pending: Vec<u8>,
    pending_frames: u32,
    last_frame_at: Instant,
    last_flush: Instant,
    frames_recorded: u64,
}

impl SegmentRecorder {
    pub fn start(now: Instant, max_duration: Duration, interval: Duration) -> Self {
        Self {
            session: RecordingSession::start(now, max_duration),
            interval: interval.max(Duration::from_millis(1)),
            pending: Vec::new(),
            pending_frames: 0,
            last_frame_at: now,
            last_flush: now,
            frames_recorded: 0,
        }
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn frames_recorded(&self) -> u64 {
        self.frames_recorded
    }

    /// Remaining time before the session auto-finalizes.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.session.deadline().saturating_duration_since(now)
    }

    /// Buffers a frame. Returns the clip if this call hit the deadline.
    ///
    /// Frames arriving at or after the deadline are not recorded.
    pub fn record(&mut self, frame: &Frame, now: Instant) -> Result<Option<Clip>, RecordingError> {
        if self.session.is_finalized() {
            return Err(RecordingError::AlreadyFinalized);
        }
        if now >= self.session.deadline() {
            return Ok(self.poll(now));
        }

        self.pending.extend_from_slice(&frame.width().to_le_bytes());
        self.pending.extend_from_slice(&frame.height().to_le_bytes());
        self.pending.extend_from_slice(&frame.sequence().to_le_bytes());
        self.pending.extend_from_slice(frame.pixels());
        self.pending_frames += 1;
        self.frames_recorded += 1;
        self.last_frame_at = now;

        if now.saturating_duration_since(self.last_flush) >= self.interval {
            self.flush()?;
            self.last_flush = now;
        }
        Ok(None)
    }

    /// Flushes pending frames and auto-finalizes at the deadline.
    pub fn poll(&mut self, now: Instant) -> Option<Clip> {
        if self.session.is_finalized() || now < self.session.deadline() {
            return None;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Dropping pending frames at deadline");
        }
        self.session.poll(now)
    }

    /// Flushes pending frames and finalizes on request.
    pub fn stop(&mut self, now: Instant) -> Result<Clip, RecordingError> {
        self.flush()?;
        self.session.finalize(now)
    }

    // Pending frames were all recorded before the deadline, so the segment
    // is stamped with the newest frame's time rather than the flush time.
    fn flush(&mut self) -> Result<(), RecordingError> {
        if self.pending_frames == 0 {
            return Ok(());
        }
        let segment = std::mem::take(&mut self.pending);
        self.pending_frames = 0;
        self.session.append(segment, self.last_frame_at)
    }
}
