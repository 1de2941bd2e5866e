//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Calibration blob file not found
    #[error("Calibration file not found: {path}")]
    CalibrationNotFound { path: String },

    /// Calibration blob rejected by the parser
    #[error("Invalid calibration: {message}")]
    CalibrationInvalid { message: String },

    /// Streaming pipeline failure
    #[error("Stream execution failed: {message}")]
    StreamExecution { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn calibration_not_found(path: impl Into<String>) -> Self {
        Self::CalibrationNotFound { path: path.into() }
    }

    pub fn calibration_invalid(message: impl Into<String>) -> Self {
        Self::CalibrationInvalid {
            message: message.into(),
        }
    }

    pub fn stream_execution(message: impl Into<String>) -> Self {
        Self::StreamExecution {
            message: message.into(),
        }
    }
}
