//! # framecast media
//!
//! Frame capture and image encoding for framecast. Capture sources turn a
//! device into a lazy stream of raw frames; encoders turn raw frames into
//! compressed images ready for upload.

#![warn(clippy::all)]

pub mod capture;
pub mod encoder;
pub mod error;

// Re-export main types
#[cfg(feature = "camera")]
pub use capture::CameraSource;
pub use capture::{
    CaptureConfig, DeviceReadiness, FrameSource, ReadinessWatcher, SyntheticControl,
    SyntheticSource,
};
pub use encoder::{AsyncEncoder, EncoderConfig, FrameEncoder, ImageEncoder};
pub use error::{ErrorCategory, MediaError, MediaResult};
