//! `stream` command implementation.

use anyhow::{Context, Result};
use contracts::DeviceConfig;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::StreamArgs;
use crate::pipeline::{StreamConfig, StreamRunner};

/// Execute the `stream` command
pub fn run_stream(args: &StreamArgs) -> Result<()> {
    let blob = super::load_calibration_blob(args.calibration.as_ref())?;

    let device_config = DeviceConfig {
        color_format: args.color_format.into(),
        color_resolution: args.color_resolution.into(),
        depth_mode: args.depth_mode.into(),
        fps: args.fps.into(),
        synchronized_only: args.synchronized_only,
        depth_delay_off_color_usec: args.depth_delay_usec,
    };
    device_config
        .validate()
        .context("Invalid camera configuration")?;

    info!(
        depth_mode = ?device_config.depth_mode,
        color_resolution = ?device_config.color_resolution,
        fps = device_config.fps.as_u32(),
        synchronized_only = device_config.synchronized_only,
        "Starting capture stream"
    );

    let stream_config = StreamConfig {
        device_config,
        calibration_blob: blob,
        max_captures: if args.max_captures == 0 {
            None
        } else {
            Some(args.max_captures)
        },
        duration: if args.duration == 0 {
            None
        } else {
            Some(Duration::from_secs(args.duration))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let runner = StreamRunner::new(stream_config);

    // Ctrl+C requests a graceful stop; the loop notices on its next poll.
    let shutdown = runner.shutdown_handle();
    ctrlc::set_handler(move || {
        warn!("Received shutdown signal, stopping stream...");
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let stats = runner.run().context("Stream execution failed")?;

    info!(
        captures = stats.captures,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Stream completed"
    );
    stats.print_summary();

    Ok(())
}
