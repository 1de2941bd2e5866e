//! # Contracts
//!
//! Frozen interface contracts shared across the workspace: pixel formats,
//! camera operating modes, device configuration, and the unified error type.
//! All other crates depend on this one; reverse dependencies are prohibited.
//!
//! ## Time model
//! - Device timestamps are microseconds from the device's center-of-exposure
//!   clock and drive all capture matching.
//! - System timestamps are nanoseconds from the host monotonic clock and are
//!   used for latency diagnostics only.

mod config;
mod error;
mod format;
mod modality;
mod modes;
mod sync_config;

pub use config::DeviceConfig;
pub use error::{Error, Result};
pub use format::ImageFormat;
pub use modality::Modality;
pub use modes::{ColorResolution, DepthMode, Fps};
pub use sync_config::SyncConfig;
