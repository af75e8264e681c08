//! Upload wire conventions and result records

use crate::error::UploadErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Multipart form field that carries the image
pub const FRAME_FIELD: &str = "frame";

/// Header carrying the frame sequence number
pub const SEQUENCE_HEADER: &str = "x-frame-sequence";

/// Header carrying the RFC 3339 capture timestamp
pub const CAPTURED_AT_HEADER: &str = "x-frame-captured-at";

/// How the encoded image is placed in the request body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyMode {
    /// `multipart/form-data` with the image in the `frame` field
    #[default]
    Multipart,
    /// Image bytes as the whole body, typed by the image MIME type
    Raw,
}

impl std::str::FromStr for BodyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "multipart" => Ok(BodyMode::Multipart),
            "raw" => Ok(BodyMode::Raw),
            other => Err(format!("unknown body mode '{other}'")),
        }
    }
}

/// JSON acknowledgement returned by the receiving server.
///
/// Known shapes are `{"status":"success","name":"..."}` and
/// `{"status":"error","message":"..."}`; anything else the server adds is
/// kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerReply {
    /// `success` or `error`; empty when absent
    #[serde(default)]
    pub status: String,
    /// Stored file name on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Error description on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Any other fields in the reply
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerReply {
    /// Parse a response body; `None` if it is not a JSON object
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// True when the server reported success
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// Final outcome of uploading one frame, after all attempts
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    /// Sequence of the uploaded frame
    pub sequence: u64,
    /// True when the frame was delivered
    pub success: bool,
    /// Status of the last HTTP response received, if any
    pub http_status: Option<u16>,
    /// Failure of the last attempt when `success` is false
    pub error: Option<UploadErrorKind>,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Worker that handled the frame
    pub worker_id: usize,
    /// Server acknowledgement, when it was JSON
    pub reply: Option<ServerReply>,
    /// Time from the first attempt to the final outcome
    pub elapsed: Duration,
}

impl UploadResult {
    /// Retries spent on this frame
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}
