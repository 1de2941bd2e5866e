//! # Integration Tests
//!
//! End-to-end tests spanning the whole workspace:
//! - Mock device pipeline (sources -> synchronizer -> captures)
//! - Capture-to-geometry chain (captures -> point cloud -> reprojection)
//! - Randomized projection round trips against the factory calibration

#[cfg(test)]
mod contract_tests {
    use contracts::{ColorResolution, DepthMode, DeviceConfig, Fps, ImageFormat};

    #[test]
    fn test_default_config_validates() {
        let config = DeviceConfig {
            color_format: ImageFormat::ColorBgra32,
            color_resolution: ColorResolution::R720p,
            depth_mode: DepthMode::NfovUnbinned,
            fps: Fps::Fps30,
            synchronized_only: false,
            depth_delay_off_color_usec: 0,
        };
        assert!(config.validate().is_ok());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use calibration::Calibration;
    use contracts::{ColorResolution, DepthMode, DeviceConfig, Error, Fps, ImageFormat};
    use device::{mock_calibration_blob, mock_sources, DeviceSession};
    use transform::{SensorSpace, Transformation};

    fn streaming_config() -> DeviceConfig {
        DeviceConfig {
            color_format: ImageFormat::ColorBgra32,
            color_resolution: ColorResolution::R720p,
            depth_mode: DepthMode::NfovUnbinned,
            fps: Fps::Fps30,
            synchronized_only: true,
            depth_delay_off_color_usec: 0,
        }
    }

    fn collect_captures(session: &DeviceSession, count: usize) -> Vec<capture::Capture> {
        let mut captures = Vec::with_capacity(count);
        while captures.len() < count {
            match session.get_capture(Some(Duration::from_secs(5))) {
                Ok(capture) => captures.push(capture),
                Err(e) => panic!("capture pipeline stalled: {e:?}"),
            }
        }
        captures
    }

    /// End-to-end: mock sources -> synchronizer -> ordered captures.
    #[test]
    fn test_e2e_mock_pipeline() {
        let mut session = DeviceSession::open(mock_calibration_blob()).unwrap();
        let config = streaming_config();
        session
            .start_cameras(&config, mock_sources(&config))
            .unwrap();

        let captures = collect_captures(&session, 5);
        session.stop_cameras();

        // Every synchronized capture carries both paired frames.
        for capture in &captures {
            assert!(capture.depth_frame().is_some());
            assert!(capture.color_frame().is_some());
        }

        // Output timestamps never move backwards.
        let timestamps: Vec<u64> = captures
            .iter()
            .map(|c| c.device_timestamp_usec().unwrap())
            .collect();
        assert!(timestamps.windows(2).all(|w| w[1] >= w[0]));

        // The consumer observes the stop after the queue drains.
        loop {
            match session.get_capture(Some(Duration::from_millis(200))) {
                Ok(_) => continue,
                Err(Error::Stopped) => break,
                Err(other) => panic!("expected Stopped, got {other:?}"),
            }
        }
    }

    /// End-to-end: a captured depth frame flows through the geometry engine.
    #[test]
    fn test_e2e_capture_to_geometry() {
        let blob = mock_calibration_blob();
        let mut session = DeviceSession::open(blob.clone()).unwrap();
        let config = streaming_config();
        session
            .start_cameras(&config, mock_sources(&config))
            .unwrap();

        let capture = collect_captures(&session, 1).remove(0);
        session.stop_cameras();
        let depth = capture.depth_frame().unwrap();
        assert_eq!((depth.width(), depth.height()), (640, 576));

        let calibration =
            Calibration::from_raw(&blob, config.depth_mode, config.color_resolution).unwrap();
        let transformation = Transformation::new(calibration).unwrap();

        // Point cloud: mock depth is a constant 1000 mm, so every valid
        // pixel lands at z = 1000.
        let cloud = transformation
            .depth_image_to_point_cloud(&depth, SensorSpace::Depth)
            .unwrap();
        assert_eq!((cloud.width(), cloud.height()), (640, 576));
        assert_eq!(cloud.stride(), 6 * 640);

        let data = cloud.data();
        let center = ((288 * 640) + 320) * 6;
        let z = i16::from_ne_bytes([data[center + 4], data[center + 5]]);
        assert_eq!(z, 1000);

        // Reprojection into the color camera keeps the depth value.
        let mapped = transformation.depth_image_to_color_camera(&depth).unwrap();
        assert_eq!((mapped.width(), mapped.height()), (1280, 720));
        let mapped_data = mapped.data();
        let hit = mapped_data
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .filter(|&v| v != 0)
            .count();
        assert!(hit > 0, "no depth pixels landed in the color image");
    }

    /// Restarting the cameras after a stop reuses the session cleanly.
    #[test]
    fn test_e2e_restart_after_stop() {
        let mut session = DeviceSession::open(mock_calibration_blob()).unwrap();
        let config = streaming_config();

        for _ in 0..2 {
            session
                .start_cameras(&config, mock_sources(&config))
                .unwrap();
            let capture = collect_captures(&session, 1).remove(0);
            assert!(capture.depth_frame().is_some());
            session.stop_cameras();
            assert!(!session.is_running());
        }
    }
}

#[cfg(test)]
mod geometry_tests {
    use approx::assert_abs_diff_eq;
    use calibration::Calibration;
    use contracts::{ColorResolution, DepthMode};
    use device::mock_calibration_blob;
    use nalgebra::Vector3;
    use rand::Rng;
    use transform::{project, transform_3d_to_3d, unproject, SensorSpace};

    fn mock_calibration() -> Calibration {
        Calibration::from_raw(
            &mock_calibration_blob(),
            DepthMode::NfovUnbinned,
            ColorResolution::R720p,
        )
        .unwrap()
    }

    /// Project then unproject random points through the distorted depth
    /// camera; the iterative inverse must land back on the source point.
    #[test]
    fn test_project_unproject_round_trip() {
        let calibration = mock_calibration();
        let camera = &calibration.depth_camera;
        let mut rng = rand::rng();

        for _ in 0..200 {
            let z: f32 = rng.random_range(500.0..4000.0);
            let point = Vector3::new(
                rng.random_range(-0.25..0.25) * z,
                rng.random_range(-0.25..0.25) * z,
                z,
            );

            let pixel = project(camera, point).expect("point inside valid radius");
            let back = unproject(camera, pixel, z).expect("pixel inside valid radius");

            assert_abs_diff_eq!(back.x, point.x, epsilon = 0.5);
            assert_abs_diff_eq!(back.y, point.y, epsilon = 0.5);
            assert_abs_diff_eq!(back.z, point.z, epsilon = 1e-3);
        }
    }

    /// Mapping a point depth -> color -> depth returns the original.
    #[test]
    fn test_extrinsics_round_trip() {
        let calibration = mock_calibration();
        let mut rng = rand::rng();

        for _ in 0..100 {
            let point = Vector3::new(
                rng.random_range(-500.0..500.0),
                rng.random_range(-500.0..500.0),
                rng.random_range(500.0..4000.0),
            );
            let in_color =
                transform_3d_to_3d(&calibration, point, SensorSpace::Depth, SensorSpace::Color);
            let back =
                transform_3d_to_3d(&calibration, in_color, SensorSpace::Color, SensorSpace::Depth);

            assert_abs_diff_eq!(back.x, point.x, epsilon = 1e-2);
            assert_abs_diff_eq!(back.y, point.y, epsilon = 1e-2);
            assert_abs_diff_eq!(back.z, point.z, epsilon = 1e-2);
        }
    }
}
