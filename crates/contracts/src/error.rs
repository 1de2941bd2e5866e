//! Unified error definitions
//!
//! One taxonomy for the whole runtime. `Timeout` and `Stopped` are flow
//! outcomes of blocking waits, not failures; callers are expected to match
//! on them. Geometric invalidity (a projection with no solution) is never an
//! error; it surfaces as per-call `Option` results in the transform crate.

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed geometry, format, or parameter. State is never partially
    /// mutated when this is returned.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation failure. No partial resource is leaked.
    #[error("allocation of {requested} bytes failed")]
    OutOfMemory { requested: usize },

    /// The supplied output buffer is too small. Retry with `required` bytes.
    #[error("buffer too small: {required} bytes required")]
    BufferTooSmall { required: usize },

    /// A blocking wait elapsed without data. Valid "no data yet" outcome.
    #[error("timed out waiting for a capture")]
    Timeout,

    /// A blocking wait was aborted because the synchronizer was stopped.
    #[error("wait aborted: capture streaming stopped")]
    Stopped,

    /// The factory calibration blob is structurally invalid.
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    /// Operation rejected by the current state machine state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Create an InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an InvalidCalibration error
    pub fn invalid_calibration(message: impl Into<String>) -> Self {
        Self::InvalidCalibration(message.into())
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

/// Workspace-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
