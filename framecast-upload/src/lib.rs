//! # framecast upload
//!
//! Delivery side of the framecast pipeline: the [`UploadTransport`] seam, an
//! HTTP transport built on reqwest, the server acknowledgement model, and the
//! [`UploadWorker`] that drains the upload queue with retry and backoff.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod protocol;
pub mod transport;
pub mod worker;

// Re-export main types
pub use error::{UploadError, UploadErrorKind};
pub use protocol::{BodyMode, ServerReply, UploadResult};
pub use transport::{Delivery, HttpTransport, HttpTransportConfig, UploadTransport};
pub use worker::{UploadWorker, WorkerSummary};
