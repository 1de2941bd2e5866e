//! # Calibration
//!
//! Parses the factory calibration blob and projects it onto a concrete
//! operating mode.
//!
//! The device ships a JSON blob with full-sensor-resolution intrinsics
//! (normalized to [0, 1]) and per-sensor extrinsics relative to the depth
//! camera. [`Calibration::from_raw`] validates the blob, rescales the
//! intrinsics to the pixel grid of the requested depth mode and color
//! resolution, and precomposes the extrinsic transform for every ordered
//! pair of sensor coordinate systems.

mod camera;
mod mode;
mod raw;
mod store;

pub use camera::{CameraCalibration, Extrinsics, Intrinsics, SensorSpace};
pub use raw::RawCalibration;
pub use store::Calibration;
