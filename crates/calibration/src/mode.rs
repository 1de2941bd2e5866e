//! Crop and binning geometry for each operating mode.
//!
//! Factory intrinsics are normalized to the full sensor. Each mode reads
//! out a binned and cropped window of the sensor; these tables describe
//! that window so intrinsics can be rescaled to output pixels.

use contracts::{ColorResolution, DepthMode};

#[derive(Debug, Clone, Copy)]
pub(crate) struct ModeInfo {
    /// Sensor resolution after binning, the grid the normalized intrinsics
    /// scale onto
    pub binned_width: u32,
    pub binned_height: u32,
    /// Top-left corner of the readout window within the binned grid
    pub crop_x: u32,
    pub crop_y: u32,
    /// Output image resolution
    pub output_width: u32,
    pub output_height: u32,
}

/// Depth sensor is 1024x1024; NFOV modes crop the center, WFOV modes read
/// the full array.
pub(crate) fn depth_mode_info(mode: DepthMode) -> Option<ModeInfo> {
    let info = match mode {
        DepthMode::Off => return None,
        DepthMode::Nfov2x2Binned => ModeInfo {
            binned_width: 512,
            binned_height: 512,
            crop_x: 96,
            crop_y: 90,
            output_width: 320,
            output_height: 288,
        },
        DepthMode::NfovUnbinned => ModeInfo {
            binned_width: 1024,
            binned_height: 1024,
            crop_x: 192,
            crop_y: 180,
            output_width: 640,
            output_height: 576,
        },
        DepthMode::Wfov2x2Binned => ModeInfo {
            binned_width: 512,
            binned_height: 512,
            crop_x: 0,
            crop_y: 0,
            output_width: 512,
            output_height: 512,
        },
        DepthMode::WfovUnbinned | DepthMode::PassiveIr => ModeInfo {
            binned_width: 1024,
            binned_height: 1024,
            crop_x: 0,
            crop_y: 0,
            output_width: 1024,
            output_height: 1024,
        },
    };
    Some(info)
}

/// Color sensor is 4096x3072 (4:3); 16:9 modes scale to the output width
/// and crop the letterboxed rows.
pub(crate) fn color_resolution_info(resolution: ColorResolution) -> Option<ModeInfo> {
    let info = match resolution {
        ColorResolution::Off => return None,
        ColorResolution::R720p => ModeInfo {
            binned_width: 1280,
            binned_height: 960,
            crop_x: 0,
            crop_y: 120,
            output_width: 1280,
            output_height: 720,
        },
        ColorResolution::R1080p => ModeInfo {
            binned_width: 1920,
            binned_height: 1440,
            crop_x: 0,
            crop_y: 180,
            output_width: 1920,
            output_height: 1080,
        },
        ColorResolution::R1440p => ModeInfo {
            binned_width: 2560,
            binned_height: 1920,
            crop_x: 0,
            crop_y: 240,
            output_width: 2560,
            output_height: 1440,
        },
        ColorResolution::R1536p => ModeInfo {
            binned_width: 2048,
            binned_height: 1536,
            crop_x: 0,
            crop_y: 0,
            output_width: 2048,
            output_height: 1536,
        },
        ColorResolution::R2160p => ModeInfo {
            binned_width: 3840,
            binned_height: 2880,
            crop_x: 0,
            crop_y: 360,
            output_width: 3840,
            output_height: 2160,
        },
        ColorResolution::R3072p => ModeInfo {
            binned_width: 4096,
            binned_height: 3072,
            crop_x: 0,
            crop_y: 0,
            output_width: 4096,
            output_height: 3072,
        },
    };
    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_crop_fits_binned_grid() {
        for mode in [
            DepthMode::Nfov2x2Binned,
            DepthMode::NfovUnbinned,
            DepthMode::Wfov2x2Binned,
            DepthMode::WfovUnbinned,
            DepthMode::PassiveIr,
        ] {
            let info = depth_mode_info(mode).unwrap();
            assert!(info.crop_x + info.output_width <= info.binned_width);
            assert!(info.crop_y + info.output_height <= info.binned_height);
            assert_eq!(
                (info.output_width, info.output_height),
                mode.resolution().unwrap()
            );
        }
    }

    #[test]
    fn test_color_modes_match_declared_resolution() {
        for resolution in [
            ColorResolution::R720p,
            ColorResolution::R1080p,
            ColorResolution::R1440p,
            ColorResolution::R1536p,
            ColorResolution::R2160p,
            ColorResolution::R3072p,
        ] {
            let info = color_resolution_info(resolution).unwrap();
            assert!(info.crop_y + info.output_height <= info.binned_height);
            assert_eq!(
                (info.output_width, info.output_height),
                resolution.resolution().unwrap()
            );
            // Binned grid keeps the 4:3 sensor aspect.
            assert_eq!(info.binned_width * 3, info.binned_height * 4);
        }
    }

    #[test]
    fn test_off_modes_have_no_geometry() {
        assert!(depth_mode_info(DepthMode::Off).is_none());
        assert!(color_resolution_info(ColorResolution::Off).is_none());
    }
}
