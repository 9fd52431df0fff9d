//! Still and clip export.
//!
//! Exports always work on copies of the displayed frame. A [`Watermark`]
//! stamps the copy, and a [`FallbackChain`] of [`ExportSink`]s delivers
//! it, trying each sink in rank order.

mod font;
mod overlay;
mod recording;
mod sink;

pub use overlay::{StatusGlyph, Watermark};
pub use recording::{
    Clip, RecordingError, RecordingSession, SegmentRecorder, FRAME_HEADER_LEN, MAX_CLIP_DURATION,
    MAX_CLIP_MS,
};
pub use sink::{
    ExportError, ExportFailure, ExportHandle, ExportOutcome, ExportSink, FallbackChain,
    MemoryMode, MemorySink, PngFileSink, RawFileSink,
};
