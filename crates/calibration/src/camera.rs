//! Mode-specific camera calibration types.

use nalgebra::{Matrix3, Vector3};

/// Sensor coordinate systems that can appear as the source or target of an
/// extrinsic transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorSpace {
    Depth,
    Color,
    Gyro,
    Accel,
}

impl SensorSpace {
    pub const ALL: [SensorSpace; 4] = [
        SensorSpace::Depth,
        SensorSpace::Color,
        SensorSpace::Gyro,
        SensorSpace::Accel,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            SensorSpace::Depth => 0,
            SensorSpace::Color => 1,
            SensorSpace::Gyro => 2,
            SensorSpace::Accel => 3,
        }
    }
}

/// Brown-Conrady intrinsic parameters in pixel units.
///
/// Produced from the normalized factory parameters by
/// [`crate::Calibration::from_raw`]; all coordinates here are in the pixel
/// grid of the selected operating mode, with pixel centers at integer
/// coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Intrinsics {
    /// Principal point
    pub cx: f32,
    pub cy: f32,
    /// Focal lengths in pixels
    pub fx: f32,
    pub fy: f32,
    /// Radial distortion coefficients
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub k4: f32,
    pub k5: f32,
    pub k6: f32,
    /// Center of distortion offset
    pub codx: f32,
    pub cody: f32,
    /// Tangential distortion coefficients
    pub p1: f32,
    pub p2: f32,
    /// Calibrated field-of-view radius in normalized image coordinates;
    /// points beyond it have no valid projection
    pub metric_radius: f32,
}

/// Rigid transform from one sensor coordinate system to another.
///
/// Maps a point `x` in the source system to `R * x + t` in the target
/// system. Translations are in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrinsics {
    pub rotation: Matrix3<f32>,
    pub translation_mm: Vector3<f32>,
}

impl Extrinsics {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation_mm: Vector3::zeros(),
        }
    }

    /// Apply the transform to a point in the source system (millimeters).
    #[inline]
    pub fn transform_point(&self, point: Vector3<f32>) -> Vector3<f32> {
        self.rotation * point + self.translation_mm
    }

    /// Transform taking `source`-system points to `target`-system points,
    /// where both arguments map points from a shared reference system.
    pub fn between(source: &Extrinsics, target: &Extrinsics) -> Self {
        let rotation = target.rotation * source.rotation.transpose();
        let translation_mm = target.translation_mm - rotation * source.translation_mm;
        Self {
            rotation,
            translation_mm,
        }
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::identity()
    }
}

/// One camera's calibration at a concrete operating mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraCalibration {
    /// Output image width in pixels; zero when the camera is disabled
    pub width: u32,
    /// Output image height in pixels; zero when the camera is disabled
    pub height: u32,
    pub intrinsics: Intrinsics,
    /// Transform from the shared reference system (the depth camera at the
    /// factory rig) into this camera's system
    pub extrinsics: Extrinsics,
}

impl CameraCalibration {
    /// Whether this camera participates in the current mode
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
