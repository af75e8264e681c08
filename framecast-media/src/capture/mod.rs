//! Frame capture sources
//!
//! A [`FrameSource`] hands out one raw frame per call without blocking. When
//! the device cannot deliver, it fails with [`MediaError::DeviceUnavailable`]
//! and announces recovery through its [`DeviceReadiness`] signal, which the
//! supervisor waits on while the pipeline is suspended.

#[cfg(feature = "camera")]
pub mod camera;
pub mod synthetic;

use crate::error::{MediaError, MediaResult};
use framecast_core::{Frame, PixelFormat, Resolution};
use tokio::sync::watch;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use synthetic::{SyntheticControl, SyntheticSource};

/// Producer of raw frames at the capture tick
pub trait FrameSource: Send {
    /// Take the next frame. Must return promptly.
    fn next_frame(&mut self) -> MediaResult<Frame>;

    /// Watcher that flips to ready when the device can deliver again
    fn readiness(&self) -> ReadinessWatcher;

    /// Human readable device name for logs
    fn device_name(&self) -> &str;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> MediaResult<Frame> {
        (**self).next_frame()
    }

    fn readiness(&self) -> ReadinessWatcher {
        (**self).readiness()
    }

    fn device_name(&self) -> &str {
        (**self).device_name()
    }
}

/// Device-side half of the readiness signal
#[derive(Debug)]
pub struct DeviceReadiness {
    tx: watch::Sender<bool>,
}

impl DeviceReadiness {
    pub fn new(ready: bool) -> Self {
        let (tx, _rx) = watch::channel(ready);
        Self { tx }
    }

    /// Publish the device state; a change to `true` wakes suspended waiters
    pub fn set_ready(&self, ready: bool) {
        self.tx.send_if_modified(|current| {
            if *current == ready {
                false
            } else {
                *current = ready;
                true
            }
        });
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> ReadinessWatcher {
        ReadinessWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

/// Consumer-side half of the readiness signal
#[derive(Debug, Clone)]
pub struct ReadinessWatcher {
    rx: watch::Receiver<bool>,
}

impl ReadinessWatcher {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the device reports ready.
    ///
    /// Returns `false` if the device side was dropped before becoming ready.
    pub async fn wait_ready(&mut self) -> bool {
        self.rx.wait_for(|ready| *ready).await.is_ok()
    }
}

/// Capture parameters shared by every source
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub resolution: Resolution,
    pub pixel_format: PixelFormat,
    /// Device index for hardware sources
    pub device_index: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::VGA,
            pixel_format: PixelFormat::Rgb24,
            device_index: 0,
        }
    }
}

impl CaptureConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.resolution.is_empty() {
            return Err(MediaError::InvalidConfiguration {
                message: format!("Invalid resolution {}", self.resolution),
            });
        }
        Ok(())
    }
}
