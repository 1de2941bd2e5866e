//! `validate` command implementation.

use anyhow::{Context, Result};
use calibration::{Calibration, RawCalibration};
use contracts::{ColorResolution, DepthMode};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

const METRIC_RADIUS_INDEX: usize = 14;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    calibration_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<BlobSummary>,
}

#[derive(Serialize)]
struct BlobSummary {
    camera_count: usize,
    inertial_sensor_count: usize,
    depth_sensor: String,
    color_sensor: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(calibration = %args.calibration.display(), "Validating calibration blob");

    let result = validate_blob(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Calibration validation failed")
    }
}

fn validate_blob(args: &ValidateArgs) -> ValidationResult {
    let calibration_path = args.calibration.display().to_string();

    // Check file exists
    if !args.calibration.exists() {
        return ValidationResult {
            valid: false,
            calibration_path,
            error: Some(format!("File not found: {}", args.calibration.display())),
            warnings: None,
            summary: None,
        };
    }

    let blob = match std::fs::read_to_string(&args.calibration) {
        Ok(blob) => blob,
        Err(e) => {
            return ValidationResult {
                valid: false,
                calibration_path,
                error: Some(e.to_string()),
                warnings: None,
                summary: None,
            }
        }
    };

    // Parse, then exercise mode adjustment to catch blobs that parse but
    // cannot serve a running configuration.
    match RawCalibration::parse(&blob) {
        Ok(raw) => {
            if let Err(e) =
                Calibration::from_parsed(&raw, DepthMode::NfovUnbinned, ColorResolution::R720p)
            {
                return ValidationResult {
                    valid: false,
                    calibration_path,
                    error: Some(e.to_string()),
                    warnings: None,
                    summary: None,
                };
            }

            let warnings = collect_warnings(&raw);
            ValidationResult {
                valid: true,
                calibration_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(build_summary(&raw)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            calibration_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn build_summary(raw: &RawCalibration) -> BlobSummary {
    let sensor_desc = |location: &str| {
        raw.calibration_information
            .cameras
            .iter()
            .find(|camera| camera.location == location)
            .map(|camera| format!("{}x{}", camera.sensor_width, camera.sensor_height))
            .unwrap_or_else(|| "missing".to_string())
    };

    BlobSummary {
        camera_count: raw.calibration_information.cameras.len(),
        inertial_sensor_count: raw.calibration_information.inertial_sensors.len(),
        depth_sensor: sensor_desc("CALIBRATION_CameraLocationD0"),
        color_sensor: sensor_desc("CALIBRATION_CameraLocationPV0"),
    }
}

/// Collect blob warnings (non-fatal issues)
fn collect_warnings(raw: &RawCalibration) -> Vec<String> {
    let mut warnings = Vec::new();

    for camera in &raw.calibration_information.cameras {
        let metric_radius = camera
            .intrinsics
            .model_parameters
            .get(METRIC_RADIUS_INDEX)
            .copied()
            .unwrap_or(0.0);
        if metric_radius == 0.0 {
            warnings.push(format!(
                "Camera {} has zero metric radius - the default valid-projection \
                 radius will be applied",
                camera.location
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Calibration is valid: {}", result.calibration_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Cameras: {}", summary.camera_count);
            println!("  Inertial sensors: {}", summary.inertial_sensor_count);
            println!("  Depth sensor: {}", summary.depth_sensor);
            println!("  Color sensor: {}", summary.color_sensor);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Calibration is invalid: {}", result.calibration_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ValidateArgs;
    use device::mock_calibration_blob;
    use std::io::Write;

    fn blob_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_validate_mock_blob() {
        let file = blob_file(&mock_calibration_blob());
        let args = ValidateArgs {
            calibration: file.path().to_path_buf(),
            json: false,
        };
        assert!(run_validate(&args).is_ok());
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let file = blob_file("not a calibration blob");
        let args = ValidateArgs {
            calibration: file.path().to_path_buf(),
            json: true,
        };
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_validate_missing_file() {
        let args = ValidateArgs {
            calibration: "/nonexistent/blob.json".into(),
            json: false,
        };
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_zero_metric_radius_warns() {
        let raw = RawCalibration::parse(&mock_calibration_blob()).unwrap();
        let warnings = collect_warnings(&raw);
        // The mock depth camera ships a zero metric radius.
        assert!(warnings.iter().any(|w| w.contains("D0")));
    }
}
