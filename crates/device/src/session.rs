//! Device session: open, start cameras, read captures, stop.

use std::sync::Arc;

use calibration::{Calibration, RawCalibration};
use capture::Capture;
use capture_sync::CaptureSync;
use contracts::{DeviceConfig, Error, Modality, Result, SyncConfig};
use std::time::Duration;
use tracing::{instrument, warn};

use crate::source::{DeliveryStatus, FrameSource};

/// One opened device.
///
/// Owns the factory calibration blob, the capture backends of the running
/// cameras and the synchronizer pairing their frames. Cameras are started
/// with a validated [`DeviceConfig`] and a set of [`FrameSource`]s, one
/// per enabled modality.
pub struct DeviceSession {
    raw_blob: String,
    raw: RawCalibration,
    sources: Vec<Box<dyn FrameSource>>,
    sync: Option<Arc<CaptureSync>>,
    calibration: Option<Calibration>,
}

impl DeviceSession {
    /// Open a device from its factory calibration blob.
    ///
    /// The blob is validated up front so a malformed device is rejected at
    /// open time, not at first use.
    #[instrument(name = "device_open", skip(raw_blob), fields(blob_len = raw_blob.len()))]
    pub fn open(raw_blob: String) -> Result<Self> {
        let raw = RawCalibration::parse(&raw_blob)?;
        Ok(Self {
            raw_blob,
            raw,
            sources: Vec::new(),
            sync: None,
            calibration: None,
        })
    }

    /// Start the cameras described by `config`, wiring `sources` into the
    /// capture synchronizer.
    ///
    /// Fails with `InvalidOperation` while cameras are already running and
    /// with `InvalidArgument` when `sources` does not match the modalities
    /// the configuration enables.
    #[instrument(name = "device_start_cameras", skip(self, sources))]
    pub fn start_cameras(
        &mut self,
        config: &DeviceConfig,
        sources: Vec<Box<dyn FrameSource>>,
    ) -> Result<()> {
        config.validate()?;
        if self.is_running() {
            return Err(Error::invalid_operation("cameras already started"));
        }

        let sync_config = SyncConfig::from_device_config(config);
        check_sources(&sync_config, &sources)?;

        let calibration =
            Calibration::from_parsed(&self.raw, config.depth_mode, config.color_resolution)?;
        let sync = Arc::new(CaptureSync::new(sync_config));
        sync.start()?;

        for source in &sources {
            let modality = source.modality();
            let sync = Arc::clone(&sync);
            source.listen(Arc::new(move |delivery| match delivery.status {
                DeliveryStatus::Ok => {
                    if let Some(frame) = delivery.frame {
                        if let Err(error) = sync.push_frame(modality, frame) {
                            warn!(%modality, %error, "frame rejected by synchronizer");
                        }
                    }
                }
                DeliveryStatus::Stopped => {}
                DeliveryStatus::Failed => {
                    warn!(%modality, "capture backend reported a failed delivery");
                    metrics::counter!(
                        "device_delivery_failures_total",
                        "modality" => modality.to_string()
                    )
                    .increment(1);
                }
            }));
        }

        self.sources = sources;
        self.sync = Some(sync);
        self.calibration = Some(calibration);
        Ok(())
    }

    /// Stop the cameras and wake all blocked capture readers. Idempotent.
    #[instrument(name = "device_stop_cameras", skip(self))]
    pub fn stop_cameras(&mut self) {
        for source in &self.sources {
            source.stop();
        }
        self.sources.clear();
        if let Some(sync) = &self.sync {
            sync.stop();
        }
    }

    /// Whether cameras are currently running
    pub fn is_running(&self) -> bool {
        self.sync.as_ref().is_some_and(|sync| sync.is_running())
    }

    /// Block for the next synchronized capture; `None` waits forever.
    pub fn get_capture(&self, timeout: Option<Duration>) -> Result<Capture> {
        let sync = self
            .sync
            .as_ref()
            .ok_or_else(|| Error::invalid_operation("cameras were never started"))?;
        sync.get_capture(timeout)
    }

    /// Calibration for the running (or last started) camera configuration.
    pub fn calibration(&self) -> Result<&Calibration> {
        self.calibration
            .as_ref()
            .ok_or_else(|| Error::invalid_operation("cameras were never started"))
    }

    /// Copy the factory calibration blob into `buffer`, returning the
    /// number of bytes written.
    ///
    /// An undersized buffer fails with `BufferTooSmall` carrying the
    /// required size; retrying with that size succeeds.
    pub fn raw_calibration(&self, buffer: &mut [u8]) -> Result<usize> {
        let blob = self.raw_blob.as_bytes();
        if buffer.len() < blob.len() {
            return Err(Error::BufferTooSmall {
                required: blob.len(),
            });
        }
        buffer[..blob.len()].copy_from_slice(blob);
        Ok(blob.len())
    }

    /// Synchronizer counters for the running session
    pub fn sync_stats(&self) -> Option<capture_sync::SyncStats> {
        self.sync.as_ref().map(|sync| sync.stats())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.stop_cameras();
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("running", &self.is_running())
            .field("sources", &self.sources.len())
            .finish()
    }
}

/// Every enabled modality needs exactly one source, and no source may
/// cover a disabled modality.
fn check_sources(config: &SyncConfig, sources: &[Box<dyn FrameSource>]) -> Result<()> {
    for modality in Modality::ALL {
        let expected = match modality {
            Modality::Color => config.expect_color,
            Modality::Depth => config.expect_depth,
            Modality::Ir => config.expect_ir,
        };
        let count = sources
            .iter()
            .filter(|source| source.modality() == modality)
            .count();
        if expected && count != 1 {
            return Err(Error::invalid_argument(format!(
                "configuration needs exactly one {modality} source, got {count}"
            )));
        }
        if !expected && count != 0 {
            return Err(Error::invalid_argument(format!(
                "configuration has no {modality} stream but a {modality} source was supplied"
            )));
        }
    }
    Ok(())
}
