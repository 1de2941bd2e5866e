//! Brown-Conrady projection and its iterative inverse.

use calibration::{CameraCalibration, Intrinsics};
use nalgebra::{Matrix2, Vector2, Vector3};

/// Gauss-Newton iteration cap for distortion inversion
const MAX_INVERSE_ITERATIONS: usize = 20;
/// Squared residual below which the inversion is considered converged
const CONVERGENCE_THRESHOLD_SQ: f32 = 1e-14;

/// Project a 3D point in the camera's own frame (millimeters) to a pixel.
///
/// Returns `None` when the point is behind the camera or lies outside the
/// calibrated field-of-view radius.
pub fn project(camera: &CameraCalibration, point_mm: Vector3<f32>) -> Option<Vector2<f32>> {
    if point_mm.z <= 0.0 {
        return None;
    }
    let normalized = Vector2::new(point_mm.x / point_mm.z, point_mm.y / point_mm.z);
    distort(&camera.intrinsics, normalized).map(|(pixel, _)| pixel)
}

/// Map a pixel plus a depth (millimeters along the camera z axis) to a 3D
/// point in the camera's own frame.
///
/// Inverts the distortion model by Gauss-Newton iteration on normalized
/// coordinates. Returns `None` for non-positive depth, for pixels whose ray
/// leaves the calibrated radius, and when the iteration fails to converge.
pub fn unproject(
    camera: &CameraCalibration,
    pixel: Vector2<f32>,
    depth_mm: f32,
) -> Option<Vector3<f32>> {
    if depth_mm <= 0.0 {
        return None;
    }
    let ray = unproject_normalized(&camera.intrinsics, pixel)?;
    Some(Vector3::new(ray.x * depth_mm, ray.y * depth_mm, depth_mm))
}

/// Unit-depth ray direction for a pixel: the 3D point at depth 1.
pub(crate) fn unproject_normalized(
    intrinsics: &Intrinsics,
    pixel: Vector2<f32>,
) -> Option<Vector2<f32>> {
    if intrinsics.fx == 0.0 || intrinsics.fy == 0.0 {
        return None;
    }
    let target = Vector2::new(
        (pixel.x - intrinsics.cx) / intrinsics.fx,
        (pixel.y - intrinsics.cy) / intrinsics.fy,
    );

    // Undistorted coordinates seed the iteration.
    let mut estimate = target;
    let mut best = estimate;
    let mut best_error_sq = f32::INFINITY;

    for _ in 0..MAX_INVERSE_ITERATIONS {
        let (distorted, jacobian) = distort_normalized(intrinsics, estimate)?;
        let residual = target - distorted;
        let error_sq = residual.norm_squared();
        if error_sq < best_error_sq {
            best_error_sq = error_sq;
            best = estimate;
        }
        if error_sq < CONVERGENCE_THRESHOLD_SQ {
            return Some(best);
        }

        let det = jacobian.determinant();
        if det.abs() < f32::MIN_POSITIVE {
            break;
        }
        let step = jacobian.try_inverse()? * residual;
        estimate += step;
    }

    if best_error_sq < CONVERGENCE_THRESHOLD_SQ.sqrt() {
        Some(best)
    } else {
        None
    }
}

/// Forward distortion in pixel coordinates, with the Jacobian of the
/// normalized distortion.
fn distort(
    intrinsics: &Intrinsics,
    normalized: Vector2<f32>,
) -> Option<(Vector2<f32>, Matrix2<f32>)> {
    let (distorted, jacobian) = distort_normalized(intrinsics, normalized)?;
    let pixel = Vector2::new(
        distorted.x * intrinsics.fx + intrinsics.cx,
        distorted.y * intrinsics.fy + intrinsics.cy,
    );
    Some((pixel, jacobian))
}

/// Rational radial plus tangential distortion on normalized coordinates.
///
/// Returns the distorted normalized coordinates (principal-offset included)
/// and the 2x2 Jacobian used by the inverse iteration. `None` when the
/// radius exceeds the calibrated field of view or the rational denominator
/// vanishes.
fn distort_normalized(
    intrinsics: &Intrinsics,
    normalized: Vector2<f32>,
) -> Option<(Vector2<f32>, Matrix2<f32>)> {
    let i = intrinsics;
    let xp = normalized.x - i.codx;
    let yp = normalized.y - i.cody;
    let rs = xp * xp + yp * yp;

    let max_radius_sq = i.metric_radius * i.metric_radius;
    if rs > max_radius_sq {
        return None;
    }

    let rss = rs * rs;
    let rsc = rss * rs;
    let a = 1.0 + i.k1 * rs + i.k2 * rss + i.k3 * rsc;
    let b = 1.0 + i.k4 * rs + i.k5 * rss + i.k6 * rsc;
    let d = if b != 0.0 { a / b } else { 1.0 };

    let xp_d = xp * d + (rs + 2.0 * xp * xp) * i.p2 + 2.0 * xp * yp * i.p1;
    let yp_d = yp * d + (rs + 2.0 * yp * yp) * i.p1 + 2.0 * xp * yp * i.p2;

    let dudrs = i.k1 + 2.0 * i.k2 * rs + 3.0 * i.k3 * rss;
    let dvdrs = i.k4 + 2.0 * i.k5 * rs + 3.0 * i.k6 * rss;
    let dddrs = if b != 0.0 {
        (dudrs * b - a * dvdrs) / (b * b)
    } else {
        0.0
    };

    let j00 = d + xp * xp * 2.0 * dddrs + 6.0 * xp * i.p2 + 2.0 * yp * i.p1;
    let j01 = 2.0 * xp * yp * dddrs + 2.0 * yp * i.p2 + 2.0 * xp * i.p1;
    let j11 = d + yp * yp * 2.0 * dddrs + 6.0 * yp * i.p1 + 2.0 * xp * i.p2;
    let jacobian = Matrix2::new(j00, j01, j01, j11);

    Some((Vector2::new(xp_d + i.codx, yp_d + i.cody), jacobian))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calibration::Extrinsics;

    fn distorted_camera() -> CameraCalibration {
        CameraCalibration {
            width: 640,
            height: 576,
            intrinsics: Intrinsics {
                cx: 319.5,
                cy: 287.5,
                fx: 502.0,
                fy: 502.5,
                k1: 0.1,
                k2: 0.01,
                k3: 0.001,
                k4: 0.12,
                k5: 0.02,
                k6: 0.002,
                codx: 0.0,
                cody: 0.0,
                p1: 2.0e-4,
                p2: 1.0e-4,
                metric_radius: 1.7,
            },
            extrinsics: Extrinsics::identity(),
        }
    }

    #[test]
    fn test_project_center_ray() {
        let camera = distorted_camera();
        let pixel = project(&camera, Vector3::new(0.0, 0.0, 1000.0)).unwrap();
        assert!((pixel.x - camera.intrinsics.cx).abs() < 1e-3);
        assert!((pixel.y - camera.intrinsics.cy).abs() < 1e-3);
    }

    #[test]
    fn test_project_rejects_behind_camera() {
        let camera = distorted_camera();
        assert!(project(&camera, Vector3::new(0.0, 0.0, -100.0)).is_none());
        assert!(project(&camera, Vector3::new(10.0, 10.0, 0.0)).is_none());
    }

    #[test]
    fn test_project_rejects_outside_metric_radius() {
        let camera = distorted_camera();
        // Normalized radius sqrt(3^2 + 3^2) well beyond 1.7.
        assert!(project(&camera, Vector3::new(3000.0, 3000.0, 1000.0)).is_none());
    }

    #[test]
    fn test_unproject_rejects_invalid_depth() {
        let camera = distorted_camera();
        let center = Vector2::new(camera.intrinsics.cx, camera.intrinsics.cy);
        assert!(unproject(&camera, center, 0.0).is_none());
        assert!(unproject(&camera, center, -5.0).is_none());
    }

    #[test]
    fn test_round_trip_project_unproject() {
        let camera = distorted_camera();
        for &(x, y, z) in &[
            (0.0, 0.0, 1000.0),
            (100.0, 50.0, 1000.0),
            (-250.0, 180.0, 2000.0),
            (400.0, -400.0, 1500.0),
        ] {
            let point = Vector3::new(x, y, z);
            let pixel = project(&camera, point).unwrap();
            let back = unproject(&camera, pixel, z).unwrap();
            assert!(
                (back - point).norm() < 0.1,
                "round trip failed for {point:?}: got {back:?}"
            );
        }
    }

    #[test]
    fn test_round_trip_unproject_project() {
        let camera = distorted_camera();
        for &(u, v) in &[(319.5, 287.5), (100.0, 80.0), (600.0, 500.0), (10.0, 560.0)] {
            let pixel = Vector2::new(u, v);
            let point = unproject(&camera, pixel, 1200.0).unwrap();
            let back = project(&camera, point).unwrap();
            assert!(
                (back - pixel).norm() < 0.05,
                "round trip failed for {pixel:?}: got {back:?}"
            );
        }
    }
}
