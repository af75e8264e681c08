//! Webcam capture via nokhwa
//!
//! The camera is opened and read on a dedicated thread, which keeps only the
//! most recent decoded frame. `next_frame` takes that frame without waiting,
//! so a slow or stalled device never blocks the capture tick. A closed stream
//! or a reader thread that has died reports `DeviceUnavailable`; an open
//! stream with no new frame since the last tick reports `NoFrameAvailable`.

use super::{CaptureConfig, DeviceReadiness, FrameSource, ReadinessWatcher};
use crate::error::{MediaError, MediaResult};
use chrono::{DateTime, Utc};
use framecast_core::{Frame, PixelFormat, Resolution, SequenceCounter};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const REOPEN_DELAY: Duration = Duration::from_secs(1);

struct CapturedImage {
    captured_at: DateTime<Utc>,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

struct Shared {
    latest: Mutex<Option<CapturedImage>>,
    readiness: DeviceReadiness,
    running: AtomicBool,
}

/// Hardware webcam source delivering RGB24 frames
pub struct CameraSource {
    name: String,
    shared: Arc<Shared>,
    sequence: SequenceCounter,
    reader: Option<thread::JoinHandle<()>>,
}

impl CameraSource {
    /// Start reading from the camera selected by `config.device_index`
    pub fn open(config: CaptureConfig) -> MediaResult<Self> {
        config.validate()?;
        let name = format!("camera-{}", config.device_index);
        let shared = Arc::new(Shared {
            latest: Mutex::new(None),
            readiness: DeviceReadiness::new(false),
            running: AtomicBool::new(true),
        });

        let reader = {
            let shared = shared.clone();
            let name = name.clone();
            thread::Builder::new()
                .name(format!("framecast-{name}"))
                .spawn(move || read_loop(config.device_index, &name, &shared))?
        };

        info!(device = %name, "Camera reader started");
        Ok(Self {
            name,
            shared,
            sequence: SequenceCounter::new(),
            reader: Some(reader),
        })
    }
}

fn read_loop(index: u32, name: &str, shared: &Shared) {
    while shared.running.load(Ordering::Relaxed) {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
            Ok(camera) => camera,
            Err(e) => {
                warn!(device = %name, "Failed to open camera: {}", e);
                thread::sleep(REOPEN_DELAY);
                continue;
            }
        };

        if let Err(e) = camera.open_stream() {
            warn!(device = %name, "Failed to open camera stream: {}", e);
            thread::sleep(REOPEN_DELAY);
            continue;
        }

        shared.readiness.set_ready(true);
        debug!(device = %name, "Camera stream open");

        while shared.running.load(Ordering::Relaxed) {
            let decoded = camera
                .frame()
                .and_then(|buffer| buffer.decode_image::<RgbFormat>());
            match decoded {
                Ok(image) => {
                    let (width, height) = (image.width(), image.height());
                    *shared.latest.lock() = Some(CapturedImage {
                        captured_at: Utc::now(),
                        width,
                        height,
                        data: image.into_raw(),
                    });
                }
                Err(e) => {
                    warn!(device = %name, "Camera read failed: {}", e);
                    break;
                }
            }
        }

        shared.readiness.set_ready(false);
        shared.latest.lock().take();
        let _ = camera.stop_stream();
        if shared.running.load(Ordering::Relaxed) {
            thread::sleep(REOPEN_DELAY);
        }
    }
}

impl CameraSource {
    fn reader_alive(&self) -> bool {
        self.reader.as_ref().is_some_and(|reader| !reader.is_finished())
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> MediaResult<Frame> {
        if !self.reader_alive() {
            // A panicking reader never clears readiness itself
            self.shared.readiness.set_ready(false);
            return Err(MediaError::device_unavailable(
                &self.name,
                "camera reader thread exited",
            ));
        }
        if !self.shared.readiness.is_ready() {
            return Err(MediaError::device_unavailable(
                &self.name,
                "camera stream not open",
            ));
        }

        let image = self
            .shared
            .latest
            .lock()
            .take()
            .ok_or_else(|| MediaError::NoFrameAvailable {
                device: self.name.clone(),
            })?;

        Ok(Frame {
            sequence: self.sequence.next(),
            captured_at: image.captured_at,
            resolution: Resolution::new(image.width, image.height),
            format: PixelFormat::Rgb24,
            data: image.data,
        })
    }

    fn readiness(&self) -> ReadinessWatcher {
        self.shared.readiness.subscribe()
    }

    fn device_name(&self) -> &str {
        &self.name
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        // Dropped on an async task: detach the reader, it exits on its own
        self.shared.running.store(false, Ordering::Relaxed);
        if self.reader.take().is_some() {
            debug!(device = %self.name, "Camera reader detached");
        }
    }
}
