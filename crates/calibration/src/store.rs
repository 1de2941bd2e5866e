//! Mode-specific calibration assembled from the factory blob.

use contracts::{ColorResolution, DepthMode, Error, Result};
use nalgebra::{Matrix3, Vector3};
use tracing::instrument;

use crate::camera::{CameraCalibration, Extrinsics, Intrinsics, SensorSpace};
use crate::mode::{color_resolution_info, depth_mode_info, ModeInfo};
use crate::raw::{
    RawCalibration, RawCamera, RawRigidTransform, ACCEL_SENSOR_TYPE, COLOR_CAMERA_LOCATION,
    DEPTH_CAMERA_LOCATION, GYRO_SENSOR_TYPE,
};

/// Field-of-view radius used when the factory left the field zeroed
const DEFAULT_METRIC_RADIUS: f32 = 1.7;

/// Calibration for one device at one operating mode.
///
/// Holds pixel-grid intrinsics for both cameras and a precomposed extrinsic
/// transform for every ordered pair of sensor coordinate systems.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub depth_camera: CameraCalibration,
    pub color_camera: CameraCalibration,
    pub depth_mode: DepthMode,
    pub color_resolution: ColorResolution,
    extrinsics: [[Extrinsics; 4]; 4],
}

impl Calibration {
    /// Parse a factory blob and project it onto the given operating mode.
    #[instrument(name = "calibration_from_raw", skip(blob), fields(blob_len = blob.len()))]
    pub fn from_raw(
        blob: &str,
        depth_mode: DepthMode,
        color_resolution: ColorResolution,
    ) -> Result<Self> {
        let raw = RawCalibration::parse(blob)?;
        Self::from_parsed(&raw, depth_mode, color_resolution)
    }

    /// Project an already-parsed blob onto the given operating mode.
    pub fn from_parsed(
        raw: &RawCalibration,
        depth_mode: DepthMode,
        color_resolution: ColorResolution,
    ) -> Result<Self> {
        if depth_mode == DepthMode::Off && color_resolution == ColorResolution::Off {
            return Err(Error::invalid_argument(
                "calibration requires at least one enabled camera",
            ));
        }

        let depth_raw = raw.camera(DEPTH_CAMERA_LOCATION)?;
        let color_raw = raw.camera(COLOR_CAMERA_LOCATION)?;
        let depth_camera = mode_specific_calibration(depth_raw, depth_mode_info(depth_mode));
        let color_camera =
            mode_specific_calibration(color_raw, color_resolution_info(color_resolution));

        let gyro = inertial_extrinsics(raw, GYRO_SENSOR_TYPE)?;
        let accel = inertial_extrinsics(raw, ACCEL_SENSOR_TYPE)?;

        // World-to-sensor poses, indexed by SensorSpace.
        let poses = [
            depth_camera.extrinsics,
            color_camera.extrinsics,
            gyro,
            accel,
        ];
        let mut extrinsics = [[Extrinsics::identity(); 4]; 4];
        for source in SensorSpace::ALL {
            for target in SensorSpace::ALL {
                extrinsics[source.index()][target.index()] =
                    Extrinsics::between(&poses[source.index()], &poses[target.index()]);
            }
        }

        Ok(Self {
            depth_camera,
            color_camera,
            depth_mode,
            color_resolution,
            extrinsics,
        })
    }

    /// Transform taking points in `source` coordinates to `target`
    /// coordinates.
    #[inline]
    pub fn extrinsics(&self, source: SensorSpace, target: SensorSpace) -> &Extrinsics {
        &self.extrinsics[source.index()][target.index()]
    }

    /// Camera calibration for a camera coordinate system; IMU spaces have
    /// no camera model.
    pub fn camera(&self, space: SensorSpace) -> Option<&CameraCalibration> {
        match space {
            SensorSpace::Depth => Some(&self.depth_camera),
            SensorSpace::Color => Some(&self.color_camera),
            SensorSpace::Gyro | SensorSpace::Accel => None,
        }
    }
}

/// Rescale normalized full-sensor intrinsics to the pixel grid of one
/// operating mode.
///
/// Principal points land on the cropped grid with pixel centers at integer
/// coordinates, hence the half-pixel shift. A zeroed metric radius means
/// the factory did not constrain the field of view; a conservative default
/// is substituted.
fn mode_specific_calibration(camera: &RawCamera, info: Option<ModeInfo>) -> CameraCalibration {
    let extrinsics = rigid_transform(&camera.rt);
    let Some(info) = info else {
        return CameraCalibration {
            width: 0,
            height: 0,
            intrinsics: Intrinsics::default(),
            extrinsics,
        };
    };

    let metric_radius = camera.parameter(14);
    let intrinsics = Intrinsics {
        cx: camera.parameter(0) * info.binned_width as f32 - info.crop_x as f32 - 0.5,
        cy: camera.parameter(1) * info.binned_height as f32 - info.crop_y as f32 - 0.5,
        fx: camera.parameter(2) * info.binned_width as f32,
        fy: camera.parameter(3) * info.binned_height as f32,
        k1: camera.parameter(4),
        k2: camera.parameter(5),
        k3: camera.parameter(6),
        k4: camera.parameter(7),
        k5: camera.parameter(8),
        k6: camera.parameter(9),
        codx: camera.parameter(10),
        cody: camera.parameter(11),
        p2: camera.parameter(12),
        p1: camera.parameter(13),
        metric_radius: if metric_radius == 0.0 {
            DEFAULT_METRIC_RADIUS
        } else {
            metric_radius
        },
    };

    CameraCalibration {
        width: info.output_width,
        height: info.output_height,
        intrinsics,
        extrinsics,
    }
}

fn inertial_extrinsics(raw: &RawCalibration, sensor_type: &str) -> Result<Extrinsics> {
    let sensor = raw.inertial_sensor(sensor_type).ok_or_else(|| {
        Error::invalid_calibration(format!("missing inertial sensor {sensor_type}"))
    })?;
    Ok(rigid_transform(&sensor.rt))
}

/// Blob poses are row-major rotations with translations in meters.
fn rigid_transform(rt: &RawRigidTransform) -> Extrinsics {
    Extrinsics {
        rotation: Matrix3::from_row_slice(&rt.rotation),
        translation_mm: Vector3::from(rt.translation) * 1000.0,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_blob() -> String {
        let identity = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        json!({
            "CalibrationInformation": {
                "Cameras": [
                    {
                        "Location": "CALIBRATION_CameraLocationD0",
                        "Intrinsics": {
                            "ModelType": "CALIBRATION_LensDistortionModelBrownConrady",
                            "ModelParameterCount": 15,
                            "ModelParameters": [
                                0.5, 0.5, 0.49, 0.49,
                                0.1, 0.01, 0.001, 0.12, 0.02, 0.002,
                                0.0, 0.0, 1.0e-4, 2.0e-4, 0.0
                            ]
                        },
                        "Rt": { "Rotation": identity, "Translation": [0.0, 0.0, 0.0] },
                        "SensorWidth": 1024,
                        "SensorHeight": 1024
                    },
                    {
                        "Location": "CALIBRATION_CameraLocationPV0",
                        "Intrinsics": {
                            "ModelType": "CALIBRATION_LensDistortionModelBrownConrady",
                            "ModelParameterCount": 15,
                            "ModelParameters": [
                                0.5, 0.5, 0.61, 0.81,
                                0.05, 0.005, 0.0005, 0.06, 0.006, 0.0006,
                                0.0, 0.0, 5.0e-5, 8.0e-5, 1.2
                            ]
                        },
                        "Rt": {
                            "Rotation": identity,
                            "Translation": [-0.032, 0.002, 0.004]
                        },
                        "SensorWidth": 4096,
                        "SensorHeight": 3072
                    }
                ],
                "InertialSensors": [
                    {
                        "SensorType": "CALIBRATION_InertialSensorType_Gyro",
                        "Rt": { "Rotation": identity, "Translation": [0.001, -0.002, 0.003] }
                    },
                    {
                        "SensorType": "CALIBRATION_InertialSensorType_Accelerometer",
                        "Rt": { "Rotation": identity, "Translation": [0.004, 0.005, -0.006] }
                    }
                ]
            }
        })
        .to_string()
    }

    #[test]
    fn test_depth_mode_scaling() {
        let calibration = Calibration::from_raw(
            &sample_blob(),
            DepthMode::NfovUnbinned,
            ColorResolution::R720p,
        )
        .unwrap();

        let depth = &calibration.depth_camera;
        assert_eq!((depth.width, depth.height), (640, 576));
        assert!((depth.intrinsics.cx - (0.5 * 1024.0 - 192.0 - 0.5)).abs() < 1e-4);
        assert!((depth.intrinsics.cy - (0.5 * 1024.0 - 180.0 - 0.5)).abs() < 1e-4);
        assert!((depth.intrinsics.fx - 0.49 * 1024.0).abs() < 1e-3);
        // Zeroed radius falls back to the default.
        assert_eq!(depth.intrinsics.metric_radius, DEFAULT_METRIC_RADIUS);
    }

    #[test]
    fn test_color_mode_scaling() {
        let calibration = Calibration::from_raw(
            &sample_blob(),
            DepthMode::NfovUnbinned,
            ColorResolution::R720p,
        )
        .unwrap();

        let color = &calibration.color_camera;
        assert_eq!((color.width, color.height), (1280, 720));
        assert!((color.intrinsics.cx - (0.5 * 1280.0 - 0.5)).abs() < 1e-4);
        assert!((color.intrinsics.cy - (0.5 * 960.0 - 120.0 - 0.5)).abs() < 1e-4);
        assert!((color.intrinsics.fy - 0.81 * 960.0).abs() < 1e-3);
        assert_eq!(color.intrinsics.metric_radius, 1.2);
    }

    #[test]
    fn test_extrinsics_table() {
        let calibration = Calibration::from_raw(
            &sample_blob(),
            DepthMode::NfovUnbinned,
            ColorResolution::R720p,
        )
        .unwrap();

        let depth_to_color = calibration.extrinsics(SensorSpace::Depth, SensorSpace::Color);
        assert!((depth_to_color.translation_mm - Vector3::new(-32.0, 2.0, 4.0)).norm() < 1e-3);

        let identity = calibration.extrinsics(SensorSpace::Depth, SensorSpace::Depth);
        assert!((identity.translation_mm).norm() < 1e-6);

        // Composing a transform with its inverse returns the input point.
        let color_to_depth = calibration.extrinsics(SensorSpace::Color, SensorSpace::Depth);
        let p = Vector3::new(100.0, -50.0, 1500.0);
        let roundtrip = color_to_depth.transform_point(depth_to_color.transform_point(p));
        assert!((roundtrip - p).norm() < 1e-3);
    }

    #[test]
    fn test_disabled_color_camera() {
        let calibration = Calibration::from_raw(
            &sample_blob(),
            DepthMode::Wfov2x2Binned,
            ColorResolution::Off,
        )
        .unwrap();
        assert!(!calibration.color_camera.is_enabled());
        assert!(calibration.depth_camera.is_enabled());
    }

    #[test]
    fn test_both_cameras_off_rejected() {
        let err =
            Calibration::from_raw(&sample_blob(), DepthMode::Off, ColorResolution::Off)
                .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_inertial_sensor_rejected() {
        let blob = sample_blob().replace(
            "CALIBRATION_InertialSensorType_Gyro",
            "CALIBRATION_InertialSensorType_Other",
        );
        let err = Calibration::from_raw(&blob, DepthMode::NfovUnbinned, ColorResolution::Off)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCalibration(_)));
    }
}
