//! # framecast core
//!
//! Data model and shared plumbing for the framecast live-frame uploader:
//! raw and encoded frames, the bounded upload queue with its drop policy,
//! retry/backoff policy, and lock-free pipeline metrics.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod frame;
pub mod metrics;
pub mod queue;
pub mod retry;

// Re-export main types
pub use error::{FramecastError, FramecastResult};
pub use frame::{EncodedFrame, Frame, ImageFormat, PixelFormat, Resolution, SequenceCounter};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use queue::{DropPolicy, PushOutcome, UploadQueue};
pub use retry::RetryPolicy;
