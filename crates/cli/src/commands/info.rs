//! `info` command implementation.

use anyhow::{Context, Result};
use calibration::{Calibration, CameraCalibration, SensorSpace};
use serde::Serialize;

use crate::cli::InfoArgs;

/// Mode-specific calibration info for JSON output
#[derive(Serialize)]
struct CalibrationInfo {
    depth_mode: String,
    color_resolution: String,
    depth_camera: CameraInfo,
    color_camera: CameraInfo,
    depth_to_color: ExtrinsicsInfo,
}

#[derive(Serialize)]
struct CameraInfo {
    enabled: bool,
    width: u32,
    height: u32,
    fx: f32,
    fy: f32,
    cx: f32,
    cy: f32,
    metric_radius: f32,
}

#[derive(Serialize)]
struct ExtrinsicsInfo {
    /// Row-major 3x3 rotation
    rotation: [f32; 9],
    /// Translation in millimeters
    translation_mm: [f32; 3],
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let blob = super::load_calibration_blob(args.calibration.as_ref())?;

    let depth_mode = args.depth_mode.into();
    let color_resolution = args.color_resolution.into();
    let calibration = Calibration::from_raw(&blob, depth_mode, color_resolution)
        .context("Failed to build mode-specific calibration")?;

    if args.json {
        let info = build_calibration_info(&calibration);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize calibration info")?;
        println!("{}", json);
    } else {
        print_calibration_info(&calibration);
    }

    Ok(())
}

fn build_calibration_info(calibration: &Calibration) -> CalibrationInfo {
    let depth_to_color = calibration.extrinsics(SensorSpace::Depth, SensorSpace::Color);
    let mut rotation = [0.0f32; 9];
    for row in 0..3 {
        for col in 0..3 {
            rotation[row * 3 + col] = depth_to_color.rotation[(row, col)];
        }
    }

    CalibrationInfo {
        depth_mode: format!("{:?}", calibration.depth_mode),
        color_resolution: format!("{:?}", calibration.color_resolution),
        depth_camera: build_camera_info(&calibration.depth_camera),
        color_camera: build_camera_info(&calibration.color_camera),
        depth_to_color: ExtrinsicsInfo {
            rotation,
            translation_mm: [
                depth_to_color.translation_mm.x,
                depth_to_color.translation_mm.y,
                depth_to_color.translation_mm.z,
            ],
        },
    }
}

fn build_camera_info(camera: &CameraCalibration) -> CameraInfo {
    CameraInfo {
        enabled: camera.is_enabled(),
        width: camera.width,
        height: camera.height,
        fx: camera.intrinsics.fx,
        fy: camera.intrinsics.fy,
        cx: camera.intrinsics.cx,
        cy: camera.intrinsics.cy,
        metric_radius: camera.intrinsics.metric_radius,
    }
}

fn print_calibration_info(calibration: &Calibration) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Mode-specific Calibration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Mode");
    println!("   ├─ Depth: {:?}", calibration.depth_mode);
    println!("   └─ Color: {:?}", calibration.color_resolution);

    print_camera("Depth camera", &calibration.depth_camera);
    print_camera("Color camera", &calibration.color_camera);

    let depth_to_color = calibration.extrinsics(SensorSpace::Depth, SensorSpace::Color);
    println!("\nDepth -> Color");
    println!(
        "   ├─ Translation (mm): [{:.3}, {:.3}, {:.3}]",
        depth_to_color.translation_mm.x,
        depth_to_color.translation_mm.y,
        depth_to_color.translation_mm.z
    );
    for row in 0..3 {
        let prefix = if row == 2 { "└─" } else { "├─" };
        println!(
            "   {} Rotation row {}: [{:.6}, {:.6}, {:.6}]",
            prefix,
            row,
            depth_to_color.rotation[(row, 0)],
            depth_to_color.rotation[(row, 1)],
            depth_to_color.rotation[(row, 2)]
        );
    }

    println!();
}

fn print_camera(label: &str, camera: &CameraCalibration) {
    println!("\n{}", label);
    if !camera.is_enabled() {
        println!("   └─ Disabled");
        return;
    }
    println!("   ├─ Resolution: {}x{}", camera.width, camera.height);
    println!(
        "   ├─ Focal length: fx={:.3}, fy={:.3}",
        camera.intrinsics.fx, camera.intrinsics.fy
    );
    println!(
        "   ├─ Principal point: cx={:.3}, cy={:.3}",
        camera.intrinsics.cx, camera.intrinsics.cy
    );
    println!("   └─ Metric radius: {:.3}", camera.intrinsics.metric_radius);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ColorResolutionArg, DepthModeArg, InfoArgs};

    #[test]
    fn test_info_with_mock_blob() {
        let args = InfoArgs {
            calibration: None,
            depth_mode: DepthModeArg::NfovUnbinned,
            color_resolution: ColorResolutionArg::R720p,
            json: true,
        };
        assert!(run_info(&args).is_ok());
    }

    #[test]
    fn test_info_missing_calibration_file() {
        let args = InfoArgs {
            calibration: Some(std::path::PathBuf::from("/nonexistent/calibration.json")),
            depth_mode: DepthModeArg::NfovUnbinned,
            color_resolution: ColorResolutionArg::R720p,
            json: true,
        };
        let err = run_info(&args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::CliError>(),
            Some(crate::error::CliError::CalibrationNotFound { .. })
        ));
    }

    #[test]
    fn test_info_rejects_both_cameras_off() {
        let args = InfoArgs {
            calibration: None,
            depth_mode: DepthModeArg::Off,
            color_resolution: ColorResolutionArg::Off,
            json: false,
        };
        assert!(run_info(&args).is_err());
    }
}
