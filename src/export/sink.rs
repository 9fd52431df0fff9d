//! Export destinations and the ranked fallback chain.

use super::recording::Clip;
use crate::capture::Frame;
use image::{ImageFormat, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors returned by a single export sink.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export rejected: {0}")]
    Rejected(String),
    #[error("export kind not supported by this sink")]
    Unsupported,
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding failed: {0}")]
    Encode(String),
    /// The user backed out of the save/share dialog.
    #[error("export cancelled")]
    Cancelled,
}

/// Every sink in a chain failed.
#[derive(Debug, Error)]
#[error("all {} export paths failed", .attempts.len())]
pub struct ExportFailure {
    /// Sink name and error, in the order tried.
    pub attempts: Vec<(String, ExportError)>,
}

/// Opaque reference to an exported artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportHandle {
    /// Name of the sink that accepted the export.
    pub sink: String,
    /// Where the artifact went (file path or in-memory slot).
    pub location: String,
    /// Bytes written.
    pub bytes: usize,
}

/// Result of a successful chain run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Exported(ExportHandle),
    /// The user cancelled; nothing to report.
    Cancelled,
}

/// A destination for finished stills and clips.
pub trait ExportSink: Send {
    /// Short name used in logs and handles.
    fn name(&self) -> &str;

    fn export_still(&mut self, frame: &Frame) -> Result<ExportHandle, ExportError>;

    fn export_clip(&mut self, clip: &Clip) -> Result<ExportHandle, ExportError>;
}

/// Ranked list of sinks; the first to succeed wins.
///
/// A cancellation stops the chain without trying lower-ranked sinks.
#[derive(Default)]
pub struct FallbackChain {
    sinks: Vec<Box<dyn ExportSink>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sink with lower priority than those already present.
    pub fn with(mut self, sink: impl ExportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn ExportSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn export_still(&mut self, frame: &Frame) -> Result<ExportOutcome, ExportFailure> {
        self.run(|sink| sink.export_still(frame))
    }

    pub fn export_clip(&mut self, clip: &Clip) -> Result<ExportOutcome, ExportFailure> {
        self.run(|sink| sink.export_clip(clip))
    }

    fn run<F>(&mut self, mut attempt: F) -> Result<ExportOutcome, ExportFailure>
    where
        F: FnMut(&mut dyn ExportSink) -> Result<ExportHandle, ExportError>,
    {
        let mut attempts = Vec::new();
        for sink in self.sinks.iter_mut() {
            let name = sink.name().to_string();
            match attempt(&mut **sink) {
                Ok(handle) => {
                    tracing::info!(sink = %name, location = %handle.location, "Export succeeded");
                    return Ok(ExportOutcome::Exported(handle));
                }
                Err(ExportError::Cancelled) => {
                    tracing::debug!(sink = %name, "Export cancelled by user");
                    return Ok(ExportOutcome::Cancelled);
                }
                Err(e) => {
                    tracing::warn!(sink = %name, error = %e, "Export path failed, falling back");
                    attempts.push((name, e));
                }
            }
        }
        Err(ExportFailure { attempts })
    }
}

/// Monotonic filename stem based on local time plus a counter.
fn file_stem(prefix: &str, counter: &mut u64) -> String {
    *counter += 1;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}_{:04}", prefix, timestamp, counter)
}

fn write_file(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, data)?;
    Ok(path)
}

fn write_segments(dir: &Path, name: &str, clip: &Clip) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let mut out = BufWriter::new(File::create(&path)?);
    clip.write_to(&mut out)?;
    out.flush()?;
    Ok(path)
}

/// Writes stills as PNG files. Does not handle clips.
#[derive(Debug)]
pub struct PngFileSink {
    dir: PathBuf,
    counter: u64,
}

impl PngFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: 0,
        }
    }

    /// Encodes a frame as PNG bytes.
    pub fn encode(frame: &Frame) -> Result<Vec<u8>, ExportError> {
        let image = RgbaImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
            .ok_or_else(|| ExportError::Encode("frame buffer does not match dimensions".into()))?;
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| ExportError::Encode(e.to_string()))?;
        Ok(buffer)
    }
}

impl ExportSink for PngFileSink {
    fn name(&self) -> &str {
        "png-file"
    }

    fn export_still(&mut self, frame: &Frame) -> Result<ExportHandle, ExportError> {
        let data = Self::encode(frame)?;
        let name = format!("{}.png", file_stem("IMG", &mut self.counter));
        let path = write_file(&self.dir, &name, &data)?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "Wrote PNG");
        Ok(ExportHandle {
            sink: self.name().to_string(),
            location: path.display().to_string(),
            bytes: data.len(),
        })
    }

    fn export_clip(&mut self, _clip: &Clip) -> Result<ExportHandle, ExportError> {
        Err(ExportError::Unsupported)
    }
}

/// Writes raw RGBA stills and raw segment clips. Lowest-tier fallback.
#[derive(Debug)]
pub struct RawFileSink {
    dir: PathBuf,
    counter: u64,
}

impl RawFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: 0,
        }
    }
}

impl ExportSink for RawFileSink {
    fn name(&self) -> &str {
        "raw-file"
    }

    fn export_still(&mut self, frame: &Frame) -> Result<ExportHandle, ExportError> {
        let name = format!(
            "{}_{}x{}.rgba",
            file_stem("IMG", &mut self.counter),
            frame.width(),
            frame.height()
        );
        let path = write_file(&self.dir, &name, frame.pixels())?;
        Ok(ExportHandle {
            sink: self.name().to_string(),
            location: path.display().to_string(),
            bytes: frame.pixels().len(),
        })
    }

    fn export_clip(&mut self, clip: &Clip) -> Result<ExportHandle, ExportError> {
        let name = format!(
            "{}_{}ms.seg",
            file_stem("CLIP", &mut self.counter),
            clip.duration().as_millis()
        );
        let path = write_segments(&self.dir, &name, clip)?;
        Ok(ExportHandle {
            sink: self.name().to_string(),
            location: path.display().to_string(),
            bytes: clip.len(),
        })
    }
}

/// Behaviour of a [`MemorySink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryMode {
    #[default]
    Accept,
    Reject,
    Cancel,
}

/// Keeps exports in memory, standing in for a share target.
#[derive(Debug, Default)]
pub struct MemorySink {
    name: String,
    mode: MemoryMode,
    items: Vec<Vec<u8>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: MemoryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Exported payloads in order.
    pub fn items(&self) -> &[Vec<u8>] {
        &self.items
    }

    fn store(&mut self, data: Vec<u8>) -> Result<ExportHandle, ExportError> {
        match self.mode {
            MemoryMode::Reject => Err(ExportError::Rejected(format!("{} refused", self.name))),
            MemoryMode::Cancel => Err(ExportError::Cancelled),
            MemoryMode::Accept => {
                let bytes = data.len();
                self.items.push(data);
                Ok(ExportHandle {
                    sink: self.name.clone(),
                    location: format!("memory:{}", self.items.len() - 1),
                    bytes,
                })
            }
        }
    }
}

impl ExportSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn export_still(&mut self, frame: &Frame) -> Result<ExportHandle, ExportError> {
        self.store(frame.pixels().to_vec())
    }

    fn export_clip(&mut self, clip: &Clip) -> Result<ExportHandle, ExportError> {
        self.store(clip.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame() -> Frame {
        Frame::filled(2, 2, [1, 2, 3, 255], 1)
    }

    #[test]
    fn test_first_success_wins() {
        let mut chain = FallbackChain::new()
            .with(MemorySink::new("primary").with_mode(MemoryMode::Reject))
            .with(MemorySink::new("secondary"))
            .with(MemorySink::new("tertiary"));

        match chain.export_still(&frame()).unwrap() {
            ExportOutcome::Exported(handle) => {
                assert_eq!(handle.sink, "secondary");
                assert_eq!(handle.bytes, 16);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_cancel_stops_chain_without_error() {
        let mut chain = FallbackChain::new()
            .with(MemorySink::new("share").with_mode(MemoryMode::Cancel))
            .with(MemorySink::new("fallback"));

        assert_eq!(
            chain.export_still(&frame()).unwrap(),
            ExportOutcome::Cancelled
        );
    }

    #[test]
    fn test_all_fail_reports_every_attempt() {
        let mut chain = FallbackChain::new()
            .with(MemorySink::new("a").with_mode(MemoryMode::Reject))
            .with(MemorySink::new("b").with_mode(MemoryMode::Reject));

        let failure = chain.export_still(&frame()).unwrap_err();
        assert_eq!(failure.attempts.len(), 2);
        assert_eq!(failure.attempts[0].0, "a");
        assert_eq!(failure.to_string(), "all 2 export paths failed");
    }

    #[test]
    fn test_empty_chain_fails() {
        let mut chain = FallbackChain::new();
        assert!(chain.export_still(&frame()).is_err());
    }

    #[test]
    fn test_png_encode_header() {
        let data = PngFileSink::encode(&frame()).unwrap();
        assert_eq!(&data[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_png_sink_rejects_clips() {
        let mut sink = PngFileSink::new(std::env::temp_dir());
        let clip = Clip::new(vec![vec![1]], Duration::from_millis(10));
        assert!(matches!(
            sink.export_clip(&clip),
            Err(ExportError::Unsupported)
        ));
    }
}
