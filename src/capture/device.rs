//! Native camera capture via `nokhwa`.
//!
//! `nokhwa` delivers frames with a blocking call, so capture runs on its
//! own thread and parks the newest frame in a slot that
//! [`CaptureSource::poll_frame`] drains without waiting.

use super::{CaptureConfig, CaptureError, CaptureSource, Facing, Frame};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

#[derive(Default)]
struct Slot {
    frame: Option<Frame>,
    error: Option<CaptureError>,
}

/// Camera backed by the platform's native capture API.
pub struct DeviceCamera {
    config: CaptureConfig,
    facing: Option<Facing>,
    slot: Arc<Mutex<Slot>>,
    stop_signal: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DeviceCamera {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            facing: None,
            slot: Arc::new(Mutex::new(Slot::default())),
            stop_signal: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }
}

impl CaptureSource for DeviceCamera {
    fn open(&mut self, facing: Facing) -> Result<(), CaptureError> {
        self.close();

        let index = self.config.device_for(facing);
        let stop_signal = Arc::new(AtomicBool::new(false));
        let slot = Arc::new(Mutex::new(Slot::default()));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();

        let thread_stop = Arc::clone(&stop_signal);
        let thread_slot = Arc::clone(&slot);
        let handle = thread::spawn(move || {
            let requested =
                RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut camera = match nokhwa::Camera::new(CameraIndex::Index(index), requested) {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(CaptureError::DeviceUnavailable(e.to_string())));
                    return;
                }
            };
            if let Err(e) = camera.open_stream() {
                let _ = ready_tx.send(Err(CaptureError::DeviceUnavailable(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            let mut sequence = 0u64;
            while !thread_stop.load(Ordering::SeqCst) {
                let decoded = camera
                    .frame()
                    .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))
                    .and_then(|buffer| {
                        buffer
                            .decode_image::<RgbAFormat>()
                            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))
                    });
                let mut slot = thread_slot.lock().unwrap_or_else(|e| e.into_inner());
                match decoded {
                    Ok(image) => {
                        sequence += 1;
                        let (width, height) = (image.width(), image.height());
                        slot.frame = Some(Frame::new(image.into_raw(), width, height, sequence));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Device capture failed");
                        slot.error = Some(e);
                        break;
                    }
                }
            }

            let _ = camera.stop_stream();
            tracing::debug!(index, "Capture thread exiting");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                tracing::warn!(%facing, index, error = %e, "Failed to open camera");
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::DeviceUnavailable(
                    "capture thread exited before opening".into(),
                ));
            }
        }

        self.slot = slot;
        self.stop_signal = stop_signal;
        self.thread_handle = Some(handle);
        self.facing = Some(facing);
        tracing::info!(%facing, index, "Camera opened");
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.facing.is_none() {
            return Err(CaptureError::NotInitialized);
        }
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(error) = slot.error.take() {
            return Err(error);
        }
        Ok(slot.frame.take())
    }

    fn is_open(&self) -> bool {
        self.facing.is_some()
    }

    fn facing(&self) -> Option<Facing> {
        self.facing
    }

    fn close(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Capture thread panicked");
            }
        }
        if self.facing.take().is_some() {
            tracing::info!("Camera closed");
        }
    }
}

impl Drop for DeviceCamera {
    fn drop(&mut self) {
        self.close();
    }
}
