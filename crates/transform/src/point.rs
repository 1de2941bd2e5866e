//! Cross-camera point transforms composed from project/unproject and the
//! extrinsics table.

use calibration::{Calibration, CameraCalibration, SensorSpace};
use contracts::{Error, Result};
use nalgebra::{Vector2, Vector3};

use crate::intrinsics::{project, unproject};

/// Transform a 3D point (millimeters) between sensor coordinate systems.
pub fn transform_3d_to_3d(
    calibration: &Calibration,
    point_mm: Vector3<f32>,
    source: SensorSpace,
    target: SensorSpace,
) -> Vector3<f32> {
    calibration.extrinsics(source, target).transform_point(point_mm)
}

/// Map a pixel in `source` plus its depth to a 3D point in `target`
/// coordinates. `Ok(None)` when the pixel has no valid unprojection.
pub fn transform_2d_to_3d(
    calibration: &Calibration,
    pixel: Vector2<f32>,
    depth_mm: f32,
    source: SensorSpace,
    target: SensorSpace,
) -> Result<Option<Vector3<f32>>> {
    let camera = enabled_camera(calibration, source)?;
    Ok(unproject(camera, pixel, depth_mm)
        .map(|point| transform_3d_to_3d(calibration, point, source, target)))
}

/// Project a 3D point in `source` coordinates into the `target` camera's
/// image. `Ok(None)` when the transformed point does not project.
pub fn transform_3d_to_2d(
    calibration: &Calibration,
    point_mm: Vector3<f32>,
    source: SensorSpace,
    target: SensorSpace,
) -> Result<Option<Vector2<f32>>> {
    let camera = enabled_camera(calibration, target)?;
    let in_target = transform_3d_to_3d(calibration, point_mm, source, target);
    Ok(project(camera, in_target))
}

/// Map a pixel plus depth in the `source` camera to the corresponding
/// pixel in the `target` camera.
pub fn transform_2d_to_2d(
    calibration: &Calibration,
    pixel: Vector2<f32>,
    depth_mm: f32,
    source: SensorSpace,
    target: SensorSpace,
) -> Result<Option<Vector2<f32>>> {
    let Some(point) = transform_2d_to_3d(calibration, pixel, depth_mm, source, source)? else {
        return Ok(None);
    };
    transform_3d_to_2d(calibration, point, source, target)
}

pub(crate) fn enabled_camera(
    calibration: &Calibration,
    space: SensorSpace,
) -> Result<&CameraCalibration> {
    let camera = calibration
        .camera(space)
        .ok_or_else(|| Error::invalid_argument(format!("{space:?} is not a camera")))?;
    if !camera.is_enabled() {
        return Err(Error::invalid_argument(format!(
            "{space:?} camera is disabled in this calibration"
        )));
    }
    Ok(camera)
}
