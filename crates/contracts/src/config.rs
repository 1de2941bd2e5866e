//! Device configuration passed to `start_cameras`.

use serde::{Deserialize, Serialize};

use crate::{ColorResolution, DepthMode, Error, Fps, ImageFormat, Result};

/// Configuration for one capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Image format to capture with the color camera
    pub color_format: ImageFormat,

    /// Color camera resolution, `Off` to disable the color camera
    pub color_resolution: ColorResolution,

    /// Depth camera mode, `Off` to disable the depth camera
    pub depth_mode: DepthMode,

    /// Frame rate for both cameras
    pub fps: Fps,

    /// Only emit captures containing both a synchronized depth (or IR) and
    /// color frame. When false, frames whose partner was dropped are emitted
    /// as partial captures.
    pub synchronized_only: bool,

    /// Desired delay between the color and the depth exposure, microseconds.
    /// Negative means the depth image is captured before the color image.
    /// Valid range is plus/minus one frame period.
    pub depth_delay_off_color_usec: i64,
}

impl Default for DeviceConfig {
    /// All sensors disabled, mirroring the factory "init disable all" value.
    fn default() -> Self {
        Self {
            color_format: ImageFormat::ColorMjpg,
            color_resolution: ColorResolution::Off,
            depth_mode: DepthMode::Off,
            fps: Fps::Fps30,
            synchronized_only: false,
            depth_delay_off_color_usec: 0,
        }
    }
}

impl DeviceConfig {
    /// Validate mode combinations before starting cameras.
    pub fn validate(&self) -> Result<()> {
        if self.color_resolution == ColorResolution::Off && self.depth_mode == DepthMode::Off {
            return Err(Error::invalid_argument(
                "at least one of color or depth must be enabled",
            ));
        }
        if self.color_resolution != ColorResolution::Off && !self.color_format.is_color() {
            return Err(Error::invalid_argument(format!(
                "{} is not a color camera format",
                self.color_format
            )));
        }
        let period = self.fps.period_usec() as i64;
        if self.depth_delay_off_color_usec.abs() > period {
            return Err(Error::invalid_argument(format!(
                "depth_delay_off_color_usec {} exceeds one frame period ({} usec)",
                self.depth_delay_off_color_usec, period
            )));
        }
        // WFOV unbinned and 3072p are sensor-bandwidth limited to 15 fps.
        if self.fps == Fps::Fps30
            && (self.depth_mode == DepthMode::WfovUnbinned
                || self.color_resolution == ColorResolution::R3072p)
        {
            return Err(Error::invalid_argument(
                "WFOV unbinned depth and 3072p color do not support 30 fps",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disabled() {
        let config = DeviceConfig::default();
        assert_eq!(config.color_resolution, ColorResolution::Off);
        assert_eq!(config.depth_mode, DepthMode::Off);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delay_bounds() {
        let config = DeviceConfig {
            color_resolution: ColorResolution::R720p,
            depth_mode: DepthMode::NfovUnbinned,
            depth_delay_off_color_usec: 50_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DeviceConfig {
            depth_delay_off_color_usec: -20_000,
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wfov_unbinned_30fps_rejected() {
        let config = DeviceConfig {
            depth_mode: DepthMode::WfovUnbinned,
            fps: Fps::Fps30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
