//! Stream runner: device session lifecycle and the capture loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use capture::Capture;
use contracts::{DeviceConfig, Error};
use device::{mock_sources, DeviceSession};
use observability::{
    record_capture_emitted, record_capture_interval_ms, record_sync_stats,
    CaptureMetricsAggregator,
};
use tracing::{debug, info};

use crate::error::CliError;
use crate::pipeline::StreamStats;

/// How long one `get_capture` poll blocks before re-checking shutdown
const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Stream configuration
#[derive(Debug)]
pub struct StreamConfig {
    pub device_config: DeviceConfig,
    pub calibration_blob: String,
    /// Stop after this many captures, `None` for unlimited
    pub max_captures: Option<u64>,
    /// Stop after this wall-clock duration, `None` for unlimited
    pub duration: Option<Duration>,
    /// Prometheus listener port, `None` to disable
    pub metrics_port: Option<u16>,
}

/// Runs a mock capture session to completion.
pub struct StreamRunner {
    config: StreamConfig,
    shutdown: Arc<AtomicBool>,
}

impl StreamRunner {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the capture loop on its next poll
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn run(&self) -> Result<StreamStats, CliError> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        let mut session = DeviceSession::open(self.config.calibration_blob.clone())
            .map_err(|e| CliError::calibration_invalid(e.to_string()))?;
        session
            .start_cameras(
                &self.config.device_config,
                mock_sources(&self.config.device_config),
            )
            .map_err(|e| CliError::stream_execution(e.to_string()))?;

        let started = Instant::now();
        let deadline = self.config.duration.map(|d| started + d);
        let mut aggregator = CaptureMetricsAggregator::new();
        let mut captures: u64 = 0;
        let mut last_capture: Option<Instant> = None;

        while !self.shutdown.load(Ordering::SeqCst) {
            if self.config.max_captures.is_some_and(|max| captures >= max) {
                info!(captures, "Capture limit reached");
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Stream duration elapsed");
                break;
            }

            match session.get_capture(Some(POLL_TIMEOUT)) {
                Ok(capture) => {
                    captures += 1;
                    let now = Instant::now();
                    let interval_ms = last_capture
                        .map(|previous| now.duration_since(previous).as_secs_f64() * 1000.0)
                        .unwrap_or(0.0);
                    last_capture = Some(now);

                    let complete = self.is_complete(&capture);
                    record_capture_emitted(complete);
                    record_capture_interval_ms(interval_ms);
                    let stats = session.sync_stats().unwrap_or_default();
                    record_sync_stats(&stats);
                    aggregator.update(complete, interval_ms, &stats);

                    debug!(
                        captures,
                        complete,
                        timestamp_usec = capture.device_timestamp_usec(),
                        "Capture received"
                    );
                }
                Err(Error::Timeout) => continue,
                Err(Error::Stopped) => break,
                Err(e) => return Err(CliError::stream_execution(e.to_string())),
            }
        }

        session.stop_cameras();

        Ok(StreamStats {
            captures,
            duration: started.elapsed(),
            metrics: aggregator,
        })
    }

    /// A capture is complete when every modality the configuration enables
    /// carries a frame.
    fn is_complete(&self, capture: &Capture) -> bool {
        let config = &self.config.device_config;
        if config.color_resolution.resolution().is_some() && capture.color_frame().is_none() {
            return false;
        }
        if config.depth_mode.has_depth() && capture.depth_frame().is_none() {
            return false;
        }
        if config.depth_mode.has_ir() && capture.ir_frame().is_none() {
            return false;
        }
        true
    }
}
