//! # Device
//!
//! Device session lifecycle: opening a device, starting and stopping
//! cameras, and reading synchronized captures.
//!
//! Hardware capture backends are abstracted behind [`FrameSource`]; each
//! running camera delivers timestamped frames from its own thread through
//! a callback, and the session routes them into a
//! [`capture_sync::CaptureSync`]. [`MockFrameSource`] provides a
//! deterministic software backend for development and tests.

mod mock;
mod session;
mod source;

pub use mock::{mock_calibration_blob, mock_sources, MockFrameSource, MockSourceConfig};
pub use session::DeviceSession;
pub use source::{DeliveryStatus, FrameCallback, FrameDelivery, FrameSource};
