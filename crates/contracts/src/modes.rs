//! Camera operating modes: depth mode, color resolution, frame rate.

use serde::{Deserialize, Serialize};

/// Depth sensor capture mode.
///
/// NFOV/WFOV denote narrow and wide field-of-view configurations; binned
/// modes combine 2x2 sensor pixels into one output pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    /// Depth sensor turned off
    #[default]
    Off,
    /// Depth and passive IR at 320x288
    Nfov2x2Binned,
    /// Depth and passive IR at 640x576
    NfovUnbinned,
    /// Depth and passive IR at 512x512
    Wfov2x2Binned,
    /// Depth and passive IR at 1024x1024
    WfovUnbinned,
    /// Passive IR only at 1024x1024
    PassiveIr,
}

impl DepthMode {
    /// Output resolution (width, height) for this mode, `None` when off
    pub fn resolution(self) -> Option<(u32, u32)> {
        match self {
            DepthMode::Off => None,
            DepthMode::Nfov2x2Binned => Some((320, 288)),
            DepthMode::NfovUnbinned => Some((640, 576)),
            DepthMode::Wfov2x2Binned => Some((512, 512)),
            DepthMode::WfovUnbinned => Some((1024, 1024)),
            DepthMode::PassiveIr => Some((1024, 1024)),
        }
    }

    /// Whether this mode produces depth frames
    pub fn has_depth(self) -> bool {
        !matches!(self, DepthMode::Off | DepthMode::PassiveIr)
    }

    /// Whether this mode produces IR frames
    pub fn has_ir(self) -> bool {
        self != DepthMode::Off
    }
}

/// Color sensor resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorResolution {
    /// Color camera turned off
    #[default]
    Off,
    /// 1280x720 16:9
    R720p,
    /// 1920x1080 16:9
    R1080p,
    /// 2560x1440 16:9
    R1440p,
    /// 2048x1536 4:3
    R1536p,
    /// 3840x2160 16:9
    R2160p,
    /// 4096x3072 4:3
    R3072p,
}

impl ColorResolution {
    /// Output resolution (width, height), `None` when off
    pub fn resolution(self) -> Option<(u32, u32)> {
        match self {
            ColorResolution::Off => None,
            ColorResolution::R720p => Some((1280, 720)),
            ColorResolution::R1080p => Some((1920, 1080)),
            ColorResolution::R1440p => Some((2560, 1440)),
            ColorResolution::R1536p => Some((2048, 1536)),
            ColorResolution::R2160p => Some((3840, 2160)),
            ColorResolution::R3072p => Some((4096, 3072)),
        }
    }

    /// Whether the sensor's native 4:3 image is cropped to 16:9 in this mode
    pub fn is_16_9(self) -> bool {
        matches!(
            self,
            ColorResolution::R720p
                | ColorResolution::R1080p
                | ColorResolution::R1440p
                | ColorResolution::R2160p
        )
    }
}

/// Camera frame rate for both the color and depth cameras
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fps {
    /// 5 frames per second
    Fps5,
    /// 15 frames per second
    Fps15,
    /// 30 frames per second
    #[default]
    Fps30,
}

impl Fps {
    /// Nominal frame period in microseconds
    pub fn period_usec(self) -> u64 {
        match self {
            Fps::Fps5 => 200_000,
            Fps::Fps15 => 66_667,
            Fps::Fps30 => 33_333,
        }
    }

    /// Frames per second as an integer
    pub fn as_u32(self) -> u32 {
        match self {
            Fps::Fps5 => 5,
            Fps::Fps15 => 15,
            Fps::Fps30 => 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_mode_resolutions() {
        assert_eq!(DepthMode::NfovUnbinned.resolution(), Some((640, 576)));
        assert_eq!(DepthMode::Off.resolution(), None);
        assert!(!DepthMode::PassiveIr.has_depth());
        assert!(DepthMode::PassiveIr.has_ir());
    }

    #[test]
    fn test_fps_period() {
        assert_eq!(Fps::Fps30.period_usec(), 33_333);
        assert_eq!(Fps::Fps5.period_usec(), 200_000);
    }
}
