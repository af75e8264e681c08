//! Synthetic test-pattern source
//!
//! Produces a moving gradient without any hardware. A [`SyntheticControl`]
//! handle can unplug and replug the virtual device, or make it emit malformed
//! frames, so the rest of the pipeline can be exercised deterministically.

use super::{CaptureConfig, DeviceReadiness, FrameSource, ReadinessWatcher};
use crate::error::{MediaError, MediaResult};
use chrono::Utc;
use framecast_core::{Frame, PixelFormat, Resolution, SequenceCounter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

const DEVICE_NAME: &str = "synthetic-pattern";

#[derive(Debug)]
struct SyntheticState {
    readiness: DeviceReadiness,
    malformed_pending: AtomicU32,
}

/// Remote control for a [`SyntheticSource`]
#[derive(Debug, Clone)]
pub struct SyntheticControl {
    state: Arc<SyntheticState>,
}

impl SyntheticControl {
    /// Simulate the device going away
    pub fn disconnect(&self) {
        debug!("Synthetic device disconnected");
        self.state.readiness.set_ready(false);
    }

    /// Simulate the device coming back
    pub fn reconnect(&self) {
        debug!("Synthetic device reconnected");
        self.state.readiness.set_ready(true);
    }

    /// Make the next `count` frames carry zero dimensions
    pub fn emit_malformed(&self, count: u32) {
        self.state.malformed_pending.fetch_add(count, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.state.readiness.is_ready()
    }
}

/// Hardware-free frame source
#[derive(Debug)]
pub struct SyntheticSource {
    config: CaptureConfig,
    state: Arc<SyntheticState>,
    sequence: SequenceCounter,
}

impl SyntheticSource {
    pub fn new(config: CaptureConfig) -> MediaResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Small RGB source, handy for tests
    pub fn qvga() -> Self {
        Self::build(CaptureConfig {
            resolution: Resolution::QVGA,
            pixel_format: PixelFormat::Rgb24,
            device_index: 0,
        })
    }

    fn build(config: CaptureConfig) -> Self {
        Self {
            config,
            state: Arc::new(SyntheticState {
                readiness: DeviceReadiness::new(true),
                malformed_pending: AtomicU32::new(0),
            }),
            sequence: SequenceCounter::new(),
        }
    }

    pub fn control(&self) -> SyntheticControl {
        SyntheticControl {
            state: self.state.clone(),
        }
    }

    fn take_malformed(&self) -> bool {
        self.state
            .malformed_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                pending.checked_sub(1)
            })
            .is_ok()
    }

    fn render(&self, sequence: u64) -> Vec<u8> {
        let Resolution { width, height } = self.config.resolution;
        let bpp = self.config.pixel_format.bytes_per_pixel();
        let shift = (sequence * 4) as usize;
        let mut data = Vec::with_capacity(width as usize * height as usize * bpp);

        for y in 0..height as usize {
            for x in 0..width as usize {
                let value = ((x + y + shift) & 0xff) as u8;
                match self.config.pixel_format {
                    PixelFormat::Gray8 => data.push(value),
                    PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
                        data.extend_from_slice(&[value, value.wrapping_mul(2), 255 - value])
                    }
                    PixelFormat::Rgba32 => {
                        data.extend_from_slice(&[value, value.wrapping_mul(2), 255 - value, 255])
                    }
                }
            }
        }
        data
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> MediaResult<Frame> {
        if !self.state.readiness.is_ready() {
            return Err(MediaError::device_unavailable(
                DEVICE_NAME,
                "device disconnected",
            ));
        }

        let sequence = self.sequence.next();
        if self.take_malformed() {
            return Ok(Frame {
                sequence,
                captured_at: Utc::now(),
                resolution: Resolution::new(0, 0),
                format: self.config.pixel_format,
                data: Vec::new(),
            });
        }

        Ok(Frame {
            sequence,
            captured_at: Utc::now(),
            resolution: self.config.resolution,
            format: self.config.pixel_format,
            data: self.render(sequence),
        })
    }

    fn readiness(&self) -> ReadinessWatcher {
        self.state.readiness.subscribe()
    }

    fn device_name(&self) -> &str {
        DEVICE_NAME
    }
}
