//! # framecast - bounded live-frame uploader
//!
//! framecast captures frames from a camera (or a synthetic test pattern),
//! encodes each one as JPEG or PNG, and uploads it to an HTTP endpoint.
//! A bounded queue with an explicit drop policy sits between encoding and
//! upload, so a slow server costs frames, never memory.
//!
//! ## Key Features
//!
//! - **Backpressure**: fixed-capacity upload queue, drop-oldest or drop-newest
//! - **Retry**: transient failures (timeouts, 5xx) retried with exponential backoff
//! - **Worker pool**: configurable number of concurrent uploaders
//! - **Device recovery**: capture suspends while the device is unavailable
//! - **Scoped shutdown**: `stop()` drains or discards, then joins every task
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use framecast::{PipelineConfig, Supervisor, SyntheticSource};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig {
//!         endpoint: "http://127.0.0.1:5000/receive_frame".into(),
//!         target_frame_rate: 5.0,
//!         ..PipelineConfig::default()
//!     };
//!
//!     let supervisor = Supervisor::start(config, SyntheticSource::qvga())?;
//!     tokio::time::sleep(Duration::from_secs(10)).await;
//!
//!     let metrics = supervisor.stop().await;
//!     println!("uploaded {} frames", metrics.uploads_succeeded);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use framecast_core::{
    DropPolicy, EncodedFrame, Frame, FramecastError, FramecastResult, ImageFormat,
    MetricsSnapshot, PipelineMetrics, PixelFormat, PushOutcome, Resolution, RetryPolicy,
    UploadQueue,
};

pub use framecast_media::{
    AsyncEncoder, CaptureConfig, DeviceReadiness, EncoderConfig, FrameEncoder, FrameSource,
    ImageEncoder, MediaError, ReadinessWatcher, SyntheticControl, SyntheticSource,
};

#[cfg(feature = "camera")]
pub use framecast_media::CameraSource;

pub use framecast_upload::{
    BodyMode, Delivery, HttpTransport, HttpTransportConfig, ServerReply, UploadError,
    UploadErrorKind, UploadResult, UploadTransport, UploadWorker,
};

pub use framecast_diagnostics::{init_logging, MetricsReporter, PipelineHealth, PipelineReport};

// Public API modules
pub mod config;
pub mod event;
pub mod supervisor;

// Re-export main API types
pub use config::{PipelineConfig, ShutdownPolicy};
pub use event::{DropReason, EventStream, PipelineEvent};
pub use supervisor::{Supervisor, SupervisorBuilder};
