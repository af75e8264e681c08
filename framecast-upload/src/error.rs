//! Upload error taxonomy
//!
//! Every failed attempt is either [`UploadError::Transient`] (worth another
//! try after a backoff) or [`UploadError::Permanent`] (reported at once).

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// What went wrong with an upload attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UploadErrorKind {
    /// Request exceeded the configured timeout
    Timeout,
    /// Could not reach the endpoint
    Connect(String),
    /// Endpoint answered 5xx
    ServerError(u16),
    /// Endpoint answered with a non-2xx status that is not a server error
    ClientError(u16),
    /// Request could not be built, sent or read
    Request(String),
    /// Shutdown interrupted the upload
    Cancelled,
}

impl UploadErrorKind {
    /// HTTP status carried by this failure, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            UploadErrorKind::ServerError(status) | UploadErrorKind::ClientError(status) => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl fmt::Display for UploadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadErrorKind::Timeout => write!(f, "request timed out"),
            UploadErrorKind::Connect(reason) => write!(f, "connection failed: {reason}"),
            UploadErrorKind::ServerError(status) => write!(f, "server error {status}"),
            UploadErrorKind::ClientError(status) => write!(f, "rejected with status {status}"),
            UploadErrorKind::Request(reason) => write!(f, "request failed: {reason}"),
            UploadErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure of a single upload attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Retryable failure
    #[error("Transient upload failure: {kind}")]
    Transient {
        /// Failure detail
        kind: UploadErrorKind,
    },

    /// Non-retryable failure
    #[error("Permanent upload failure: {kind}")]
    Permanent {
        /// Failure detail
        kind: UploadErrorKind,
    },
}

impl UploadError {
    /// Build a retryable error
    pub fn transient(kind: UploadErrorKind) -> Self {
        UploadError::Transient { kind }
    }

    /// Build a non-retryable error
    pub fn permanent(kind: UploadErrorKind) -> Self {
        UploadError::Permanent { kind }
    }

    /// Classify an HTTP status. Returns `None` for 2xx.
    ///
    /// 5xx, 408 and 429 are transient; any other non-2xx status is permanent.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            500..=599 => Some(Self::transient(UploadErrorKind::ServerError(status))),
            408 | 429 => Some(Self::transient(UploadErrorKind::ClientError(status))),
            _ => Some(Self::permanent(UploadErrorKind::ClientError(status))),
        }
    }

    /// Classify a client-side failure from reqwest
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::transient(UploadErrorKind::Timeout)
        } else if err.is_connect() {
            Self::transient(UploadErrorKind::Connect(err.to_string()))
        } else if err.is_builder() {
            Self::permanent(UploadErrorKind::Request(err.to_string()))
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16())
                .unwrap_or_else(|| Self::transient(UploadErrorKind::Request(err.to_string())))
        } else {
            Self::transient(UploadErrorKind::Request(err.to_string()))
        }
    }

    /// True when a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, UploadError::Transient { .. })
    }

    /// Failure detail
    pub fn kind(&self) -> &UploadErrorKind {
        match self {
            UploadError::Transient { kind } | UploadError::Permanent { kind } => kind,
        }
    }

    /// Take the failure detail
    pub fn into_kind(self) -> UploadErrorKind {
        match self {
            UploadError::Transient { kind } | UploadError::Permanent { kind } => kind,
        }
    }
}
