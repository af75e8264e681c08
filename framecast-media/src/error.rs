//! Capture and encoding error types
//!
//! Capture failures are recoverable and suspend the pipeline; encoding
//! failures are per-frame and only cost the frame that caused them.

use thiserror::Error;

/// Main error type for capture and encoding operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Capture device is not ready to produce frames
    #[error("Device unavailable: {device} - {reason}")]
    DeviceUnavailable {
        /// Device identifier
        device: String,
        /// Why the device is unavailable
        reason: String,
    },

    /// Device is ready but has not produced a new frame since the last poll
    #[error("No new frame available from {device}")]
    NoFrameAvailable {
        /// Device identifier
        device: String,
    },

    /// Encoding operation failed
    #[error("Encoding failed: {format} - {reason}")]
    EncodeFailed {
        /// Target image format
        format: String,
        /// Failure reason
        reason: String,
    },

    /// Frame has a zero-sized dimension
    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Frame width
        width: u32,
        /// Frame height
        height: u32,
    },

    /// Invalid frame data error
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrameData {
        /// Expected data size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Shorthand for a [`MediaError::DeviceUnavailable`]
    pub fn device_unavailable(device: impl Into<String>, reason: impl Into<String>) -> Self {
        MediaError::DeviceUnavailable {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::Io { .. } => true,
            MediaError::DeviceUnavailable { .. } => true,
            MediaError::NoFrameAvailable { .. } => true,
            MediaError::EncodeFailed { .. } => false,
            MediaError::InvalidDimensions { .. } => false,
            MediaError::InvalidFrameData { .. } => false,
            MediaError::InvalidConfiguration { .. } => false,
        }
    }

    /// True for failures that only affect the frame being encoded
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Codec | ErrorCategory::Data
        )
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::Io { .. } => ErrorCategory::System,
            MediaError::DeviceUnavailable { .. } => ErrorCategory::Device,
            MediaError::NoFrameAvailable { .. } => ErrorCategory::Device,
            MediaError::EncodeFailed { .. } => ErrorCategory::Codec,
            MediaError::InvalidDimensions { .. } => ErrorCategory::Data,
            MediaError::InvalidFrameData { .. } => ErrorCategory::Data,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// System-level errors (I/O, permissions, etc.)
    System,
    /// Capture device errors
    Device,
    /// Image codec errors
    Codec,
    /// Frame buffer validation errors
    Data,
    /// Configuration and parameter errors
    Configuration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let unavailable = MediaError::device_unavailable("camera-0", "unplugged");
        assert_eq!(unavailable.category(), ErrorCategory::Device);
        assert!(unavailable.is_recoverable());
        assert!(!unavailable.is_encode_error());

        let encode = MediaError::InvalidDimensions {
            width: 0,
            height: 480,
        };
        assert_eq!(encode.category(), ErrorCategory::Data);
        assert!(!encode.is_recoverable());
        assert!(encode.is_encode_error());
    }

    #[test]
    fn test_error_display() {
        let error = MediaError::InvalidFrameData {
            expected: 1024,
            actual: 512,
        };
        assert_eq!(
            error.to_string(),
            "Invalid frame data: expected 1024 bytes, got 512"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        match MediaError::from(io_error) {
            MediaError::Io { .. } => (),
            other => panic!("Expected Io error variant, got {other:?}"),
        }
    }
}
