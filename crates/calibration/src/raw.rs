//! Factory calibration blob parsing and structural validation.
//!
//! The blob is JSON produced at factory calibration time. Intrinsic
//! parameters are stored normalized to the full sensor, in the order
//! `[cx, cy, fx, fy, k1..k6, codx, cody, p2, p1, metric_radius]`; camera
//! and inertial-sensor poses are stored relative to the depth camera with
//! translations in meters.

use contracts::{Error, Result};
use serde::{Deserialize, Serialize};

pub(crate) const DEPTH_CAMERA_LOCATION: &str = "CALIBRATION_CameraLocationD0";
pub(crate) const COLOR_CAMERA_LOCATION: &str = "CALIBRATION_CameraLocationPV0";
pub(crate) const GYRO_SENSOR_TYPE: &str = "CALIBRATION_InertialSensorType_Gyro";
pub(crate) const ACCEL_SENSOR_TYPE: &str = "CALIBRATION_InertialSensorType_Accelerometer";

const BROWN_CONRADY_MODEL: &str = "CALIBRATION_LensDistortionModelBrownConrady";

/// The only distortion model this runtime evaluates; blobs carrying older
/// rational-6KT calibrations are rejected rather than misinterpreted.
const MIN_MODEL_PARAMETER_COUNT: u32 = 14;

/// Deserialized factory calibration blob
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawCalibration {
    pub calibration_information: CalibrationInformation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CalibrationInformation {
    pub cameras: Vec<RawCamera>,
    #[serde(default)]
    pub inertial_sensors: Vec<RawInertialSensor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawCamera {
    pub location: String,
    pub intrinsics: RawIntrinsics,
    pub rt: RawRigidTransform,
    pub sensor_width: u32,
    pub sensor_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawIntrinsics {
    pub model_type: String,
    pub model_parameter_count: u32,
    pub model_parameters: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawRigidTransform {
    /// Row-major 3x3 rotation
    pub rotation: [f32; 9],
    /// Translation in meters
    pub translation: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawInertialSensor {
    pub sensor_type: String,
    pub rt: RawRigidTransform,
}

impl RawCalibration {
    /// Parse and structurally validate a calibration blob.
    pub fn parse(blob: &str) -> Result<Self> {
        let raw: RawCalibration = serde_json::from_str(blob)
            .map_err(|e| Error::invalid_calibration(format!("malformed blob: {e}")))?;
        raw.validate()?;
        Ok(raw)
    }

    /// Check model tags, parameter counts and required sensors.
    pub fn validate(&self) -> Result<()> {
        for camera in &self.calibration_information.cameras {
            camera.validate()?;
        }
        self.camera(DEPTH_CAMERA_LOCATION)?;
        self.camera(COLOR_CAMERA_LOCATION)?;
        Ok(())
    }

    pub(crate) fn camera(&self, location: &str) -> Result<&RawCamera> {
        self.calibration_information
            .cameras
            .iter()
            .find(|camera| camera.location == location)
            .ok_or_else(|| Error::invalid_calibration(format!("missing camera {location}")))
    }

    pub(crate) fn inertial_sensor(&self, sensor_type: &str) -> Option<&RawInertialSensor> {
        self.calibration_information
            .inertial_sensors
            .iter()
            .find(|sensor| sensor.sensor_type == sensor_type)
    }
}

impl RawCamera {
    fn validate(&self) -> Result<()> {
        if self.intrinsics.model_type != BROWN_CONRADY_MODEL {
            return Err(Error::invalid_calibration(format!(
                "unsupported distortion model {:?} for {}",
                self.intrinsics.model_type, self.location
            )));
        }
        if self.intrinsics.model_parameter_count < MIN_MODEL_PARAMETER_COUNT {
            return Err(Error::invalid_calibration(format!(
                "camera {} has {} model parameters, expected at least {}",
                self.location, self.intrinsics.model_parameter_count, MIN_MODEL_PARAMETER_COUNT
            )));
        }
        if self.intrinsics.model_parameters.len() < self.intrinsics.model_parameter_count as usize {
            return Err(Error::invalid_calibration(format!(
                "camera {} declares {} parameters but carries {}",
                self.location,
                self.intrinsics.model_parameter_count,
                self.intrinsics.model_parameters.len()
            )));
        }
        if self.sensor_width == 0 || self.sensor_height == 0 {
            return Err(Error::invalid_calibration(format!(
                "camera {} has zero sensor resolution",
                self.location
            )));
        }
        Ok(())
    }

    /// Model parameter by index, zero when the blob omits it.
    pub(crate) fn parameter(&self, index: usize) -> f32 {
        self.intrinsics
            .model_parameters
            .get(index)
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_blob;

    #[test]
    fn test_parse_sample_blob() {
        let raw = RawCalibration::parse(&sample_blob()).unwrap();
        assert_eq!(raw.calibration_information.cameras.len(), 2);
        assert!(raw.inertial_sensor(GYRO_SENSOR_TYPE).is_some());
        assert!(raw.inertial_sensor(ACCEL_SENSOR_TYPE).is_some());
    }

    #[test]
    fn test_rejects_unknown_model() {
        let blob = sample_blob().replace(
            "CALIBRATION_LensDistortionModelBrownConrady",
            "CALIBRATION_LensDistortionModelRational6KT",
        );
        let err = RawCalibration::parse(&blob).unwrap_err();
        assert!(matches!(err, Error::InvalidCalibration(_)));
    }

    #[test]
    fn test_rejects_missing_camera() {
        let blob = sample_blob().replace("CALIBRATION_CameraLocationPV0", "OtherLocation");
        assert!(RawCalibration::parse(&blob).is_err());
    }

    #[test]
    fn test_rejects_short_parameter_list() {
        let mut raw = RawCalibration::parse(&sample_blob()).unwrap();
        raw.calibration_information.cameras[0]
            .intrinsics
            .model_parameters
            .truncate(10);
        assert!(raw.validate().is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(RawCalibration::parse("not json").is_err());
        assert!(RawCalibration::parse("{}").is_err());
    }
}
