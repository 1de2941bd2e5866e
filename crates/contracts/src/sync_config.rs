//! Capture synchronizer configuration shared across crates.

use serde::{Deserialize, Serialize};

use crate::DeviceConfig;

/// Configuration for the capture synchronizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Only emit captures with a matched depth/IR and color pair
    pub synchronized_only: bool,

    /// Configured delay between color and depth exposures (microseconds,
    /// signed; negative means depth precedes color)
    pub depth_delay_off_color_usec: i64,

    /// Nominal frame period of the running cameras (microseconds)
    pub frame_period_usec: u64,

    /// Matching tolerance around the configured delay (microseconds).
    /// `None` uses the default of one frame period.
    #[serde(default)]
    pub tolerance_usec: Option<u64>,

    /// Capacity of the matched-capture queue. When full, the oldest
    /// unconsumed capture is dropped to make room.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Whether a color producer is running
    pub expect_color: bool,

    /// Whether a depth producer is running
    pub expect_depth: bool,

    /// Whether an IR producer is running
    pub expect_ir: bool,
}

fn default_queue_capacity() -> usize {
    32
}

impl SyncConfig {
    /// Derive the synchronizer configuration from a device configuration.
    pub fn from_device_config(config: &DeviceConfig) -> Self {
        Self {
            synchronized_only: config.synchronized_only,
            depth_delay_off_color_usec: config.depth_delay_off_color_usec,
            frame_period_usec: config.fps.period_usec(),
            tolerance_usec: None,
            queue_capacity: default_queue_capacity(),
            expect_color: config.color_resolution.resolution().is_some(),
            expect_depth: config.depth_mode.has_depth(),
            expect_ir: config.depth_mode.has_ir(),
        }
    }

    /// Effective matching tolerance in microseconds.
    ///
    /// Defaults to one frame period: a candidate pair matches when its
    /// timestamp difference deviates from the configured delay by less than
    /// one frame period.
    pub fn tolerance_usec(&self) -> u64 {
        self.tolerance_usec.unwrap_or(self.frame_period_usec)
    }

    /// Whether pairing is possible at all (both sides of a pair enabled)
    pub fn pairing_enabled(&self) -> bool {
        self.expect_color && (self.expect_depth || self.expect_ir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorResolution, DepthMode, Fps};

    #[test]
    fn test_from_device_config() {
        let device = DeviceConfig {
            color_resolution: ColorResolution::R720p,
            depth_mode: DepthMode::PassiveIr,
            fps: Fps::Fps15,
            synchronized_only: true,
            ..Default::default()
        };
        let sync = SyncConfig::from_device_config(&device);
        assert!(sync.expect_color);
        assert!(!sync.expect_depth);
        assert!(sync.expect_ir);
        assert_eq!(sync.frame_period_usec, 66_667);
        assert_eq!(sync.tolerance_usec(), 66_667);
        assert!(sync.pairing_enabled());
    }
}
