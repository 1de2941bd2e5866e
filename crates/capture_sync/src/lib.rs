//! # Capture Sync
//!
//! Pairs frames from independently running camera producers into
//! time-coherent [`capture::Capture`] bundles.
//!
//! Producers push timestamped frames from their own threads; consumers
//! block on `get_capture` with an optional timeout. A color frame and a
//! depth (or IR) frame belong to the same capture when their device
//! timestamps differ by the configured depth/color delay, within a
//! tolerance. Matched captures are ordered by timestamp on the output
//! queue.
//!
//! ## Usage
//!
//! ```ignore
//! use capture_sync::CaptureSync;
//! use contracts::{Modality, SyncConfig};
//!
//! let sync = CaptureSync::new(SyncConfig::from_device_config(&config));
//! sync.start()?;
//!
//! // Producer threads:
//! sync.push_frame(Modality::Depth, frame);
//!
//! // Consumer thread:
//! let capture = sync.get_capture(Some(Duration::from_millis(100)))?;
//! ```

mod engine;
mod pending;

pub use engine::{CaptureSync, SyncStats};

pub use contracts::SyncConfig;
