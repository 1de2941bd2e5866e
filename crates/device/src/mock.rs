//! Mock frame sources and calibration for development without hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use calibration::RawCalibration;
use capture::Frame;
use contracts::{DeviceConfig, ImageFormat, Modality};
use tracing::{debug, trace};

use crate::source::{FrameCallback, FrameDelivery, FrameSource};

/// Mock source configuration
#[derive(Debug, Clone)]
pub struct MockSourceConfig {
    /// Pixel format of generated frames
    pub format: ImageFormat,
    /// Generated frame geometry
    pub width: u32,
    pub height: u32,
    /// Device-timestamp step between frames, also the real-time pacing
    pub frame_period_usec: u64,
    /// Constant offset applied to every device timestamp (microseconds)
    pub timestamp_offset_usec: i64,
    /// Depth value written into DEPTH16 frames, millimeters
    pub depth_mm: u16,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            format: ImageFormat::Depth16,
            width: 640,
            height: 576,
            frame_period_usec: 33_333,
            timestamp_offset_usec: 0,
            depth_mm: 1000,
        }
    }
}

/// Software camera generating deterministic frames at a fixed cadence.
///
/// Device timestamps are `frame_id * period + offset`, so concurrently
/// running mock sources produce streams the synchronizer can pair exactly.
pub struct MockFrameSource {
    modality: Modality,
    config: MockSourceConfig,
    listening: Arc<AtomicBool>,
}

impl MockFrameSource {
    pub fn new(modality: Modality, config: MockSourceConfig) -> Self {
        Self {
            modality,
            config,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    fn generate_frame(config: &MockSourceConfig, frame_id: u64) -> Option<Frame> {
        let bpp = config.format.bytes_per_pixel()? as u32;
        let stride = bpp * config.width;
        let mut frame = Frame::create(config.format, config.width, config.height, stride).ok()?;
        if config.format == ImageFormat::Depth16 || config.format == ImageFormat::Ir16 {
            let value = config.depth_mm.to_ne_bytes();
            if let Some(data) = frame.data_mut() {
                for chunk in data.chunks_exact_mut(2) {
                    chunk.copy_from_slice(&value);
                }
            }
        } else if let Some(data) = frame.data_mut() {
            // Shifting pattern so consecutive color frames differ.
            data.fill((frame_id % 251) as u8);
        }
        Some(frame)
    }
}

impl FrameSource for MockFrameSource {
    fn modality(&self) -> Modality {
        self.modality
    }

    fn listen(&self, callback: FrameCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let modality = self.modality;
        let config = self.config.clone();
        let listening = Arc::clone(&self.listening);
        let interval = Duration::from_micros(config.frame_period_usec);

        thread::spawn(move || {
            debug!(%modality, period_usec = config.frame_period_usec, "mock source started");
            let mut frame_id: u64 = 0;
            while listening.load(Ordering::Relaxed) {
                frame_id += 1;
                let timestamp = frame_id as i64 * config.frame_period_usec as i64
                    + config.timestamp_offset_usec;
                match Self::generate_frame(&config, frame_id) {
                    Some(frame) => {
                        frame.set_device_timestamp_usec(timestamp.max(0) as u64);
                        frame.apply_system_timestamp();
                        trace!(%modality, frame_id, timestamp, "mock frame delivered");
                        callback(FrameDelivery::ok(frame));
                    }
                    None => callback(FrameDelivery::failed()),
                }
                thread::sleep(interval);
            }
            callback(FrameDelivery::stopped());
            debug!(%modality, "mock source stopped");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

/// Build one mock source per modality the configuration enables.
pub fn mock_sources(config: &DeviceConfig) -> Vec<Box<dyn FrameSource>> {
    let period = config.fps.period_usec();
    let mut sources: Vec<Box<dyn FrameSource>> = Vec::new();

    if let Some((width, height)) = config.color_resolution.resolution() {
        sources.push(Box::new(MockFrameSource::new(
            Modality::Color,
            MockSourceConfig {
                format: if config.color_format.bytes_per_pixel().is_some() {
                    config.color_format
                } else {
                    ImageFormat::ColorBgra32
                },
                width,
                height,
                frame_period_usec: period,
                timestamp_offset_usec: 0,
                depth_mm: 0,
            },
        )));
    }
    if let Some((width, height)) = config.depth_mode.resolution() {
        let depth_offset = config.depth_delay_off_color_usec;
        if config.depth_mode.has_depth() {
            sources.push(Box::new(MockFrameSource::new(
                Modality::Depth,
                MockSourceConfig {
                    format: ImageFormat::Depth16,
                    width,
                    height,
                    frame_period_usec: period,
                    timestamp_offset_usec: depth_offset,
                    depth_mm: 1000,
                },
            )));
        }
        if config.depth_mode.has_ir() {
            sources.push(Box::new(MockFrameSource::new(
                Modality::Ir,
                MockSourceConfig {
                    format: ImageFormat::Ir16,
                    width,
                    height,
                    frame_period_usec: period,
                    timestamp_offset_usec: depth_offset,
                    depth_mm: 500,
                },
            )));
        }
    }
    sources
}

/// A plausible factory calibration blob for the mock device.
///
/// Pinhole-free Brown-Conrady parameters with mild distortion and a color
/// camera offset 32 mm from the depth camera, shaped exactly like a real
/// factory blob.
pub fn mock_calibration_blob() -> String {
    let identity = [1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
    let blob = serde_json::json!({
        "CalibrationInformation": {
            "Cameras": [
                {
                    "Location": "CALIBRATION_CameraLocationD0",
                    "Intrinsics": {
                        "ModelType": "CALIBRATION_LensDistortionModelBrownConrady",
                        "ModelParameterCount": 15,
                        "ModelParameters": [
                            0.5, 0.5, 0.49, 0.49,
                            0.08, 0.006, 0.0004, 0.1, 0.009, 0.0008,
                            0.0, 0.0, 6.0e-5, 9.0e-5, 0.0
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
                            0.04, 0.003, 0.0002, 0.05, 0.004, 0.0003,
                            0.0, 0.0, 3.0e-5, 5.0e-5, 1.2
                        ]
                    },
                    "Rt": { "Rotation": identity, "Translation": [-0.032, 0.002, 0.004] },
                    "SensorWidth": 4096,
                    "SensorHeight": 3072
                }
            ],
            "InertialSensors": [
                {
                    "SensorType": "CALIBRATION_InertialSensorType_Gyro",
                    "Rt": { "Rotation": identity, "Translation": [0.0, 0.0, 0.002] }
                },
                {
                    "SensorType": "CALIBRATION_InertialSensorType_Accelerometer",
                    "Rt": { "Rotation": identity, "Translation": [0.0, 0.005, 0.001] }
                }
            ]
        }
    })
    .to_string();

    debug_assert!(RawCalibration::parse(&blob).is_ok());
    blob
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_mock_source_delivers_monotonic_timestamps() {
        let source = MockFrameSource::new(
            Modality::Depth,
            MockSourceConfig {
                frame_period_usec: 1_000,
                ..Default::default()
            },
        );
        let delivered: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        source.listen(Arc::new(move |delivery: FrameDelivery| {
            if let Some(frame) = delivery.frame {
                sink.lock().unwrap().push(frame.device_timestamp_usec());
            }
        }));
        assert!(source.is_listening());

        thread::sleep(Duration::from_millis(20));
        source.stop();
        thread::sleep(Duration::from_millis(10));

        let timestamps = delivered.lock().unwrap();
        assert!(timestamps.len() >= 3);
        assert!(timestamps.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(timestamps[0], 1_000);
    }

    #[test]
    fn test_listen_is_idempotent() {
        let source = MockFrameSource::new(Modality::Ir, MockSourceConfig::default());
        let count = Arc::new(Mutex::new(0usize));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            source.listen(Arc::new(move |_| {
                *count.lock().unwrap() += 1;
            }));
        }
        source.stop();
        // A second stop is harmless.
        source.stop();
    }

    #[test]
    fn test_mock_sources_follow_device_config() {
        let config = DeviceConfig {
            color_resolution: contracts::ColorResolution::R720p,
            color_format: ImageFormat::ColorBgra32,
            depth_mode: contracts::DepthMode::NfovUnbinned,
            ..Default::default()
        };
        let sources = mock_sources(&config);
        let modalities: Vec<Modality> = sources.iter().map(|s| s.modality()).collect();
        assert!(modalities.contains(&Modality::Color));
        assert!(modalities.contains(&Modality::Depth));
        assert!(modalities.contains(&Modality::Ir));

        let passive = DeviceConfig {
            depth_mode: contracts::DepthMode::PassiveIr,
            ..Default::default()
        };
        let modalities: Vec<Modality> =
            mock_sources(&passive).iter().map(|s| s.modality()).collect();
        assert_eq!(modalities, vec![Modality::Ir]);
    }

    #[test]
    fn test_mock_blob_is_valid() {
        assert!(RawCalibration::parse(&mock_calibration_blob()).is_ok());
    }
}
