//! # Transform
//!
//! Geometric transforms over calibrated cameras: 2D/3D projection,
//! cross-camera point transfer and whole-image reprojection.
//!
//! Point operations are pure functions of an immutable
//! [`calibration::Calibration`]. Image operations go through a
//! [`Transformation`], which precomputes per-pixel ray tables once per
//! calibration so the per-frame cost of unprojection is a multiply-add
//! instead of an iterative distortion inversion.
//!
//! Geometric failure is a per-point outcome, not an error: operations
//! return `Ok(None)` (or write the invalid sentinel 0 for image pixels)
//! when a point has no valid image under the model, and reserve `Err` for
//! malformed arguments and buffer sizing.

mod engine;
mod image;
mod intrinsics;
mod point;

pub use engine::{InterpolationType, Transformation};
pub use image::ImageDescriptor;
pub use intrinsics::{project, unproject};
pub use point::{
    transform_2d_to_2d, transform_2d_to_3d, transform_3d_to_2d, transform_3d_to_3d,
};

pub use calibration::SensorSpace;
