//! Error types for framecast

use thiserror::Error;

/// Main error type for pipeline-level operations
#[derive(Error, Debug)]
pub enum FramecastError {
    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration {
        /// Offending configuration field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Configuration file could not be read
    #[error("Failed to read configuration from {path}: {source}")]
    ConfigRead {
        /// Path that was read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration document could not be parsed
    #[error("Failed to parse configuration: {reason}")]
    ConfigParse {
        /// Parser message
        reason: String,
    },
}

impl FramecastError {
    /// Shorthand for an [`FramecastError::InvalidConfiguration`]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FramecastError::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the operation may succeed when retried
    pub fn is_recoverable(&self) -> bool {
        match self {
            FramecastError::Initialization { .. } => true,
            FramecastError::ConfigRead { .. } => true,
            FramecastError::InvalidConfiguration { .. } => false,
            FramecastError::ConfigParse { .. } => false,
        }
    }
}

/// Result type alias for pipeline operations
pub type FramecastResult<T> = Result<T, FramecastError>;
