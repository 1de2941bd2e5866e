//! Frame source abstraction over hardware capture backends.

use std::sync::Arc;

use capture::Frame;
use contracts::Modality;

/// Callback invoked by a source's capture thread for every delivery
pub type FrameCallback = Arc<dyn Fn(FrameDelivery) + Send + Sync>;

/// Outcome of one frame delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// A frame was captured
    Ok,
    /// The source is shutting down; no more deliveries follow
    Stopped,
    /// The capture failed; the stream continues
    Failed,
}

/// One delivery from a capture thread
#[derive(Debug)]
pub struct FrameDelivery {
    pub status: DeliveryStatus,
    /// Present exactly when `status` is [`DeliveryStatus::Ok`]
    pub frame: Option<Frame>,
}

impl FrameDelivery {
    pub fn ok(frame: Frame) -> Self {
        Self {
            status: DeliveryStatus::Ok,
            frame: Some(frame),
        }
    }

    pub fn stopped() -> Self {
        Self {
            status: DeliveryStatus::Stopped,
            frame: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: DeliveryStatus::Failed,
            frame: None,
        }
    }
}

/// A camera producing timestamped frames on its own thread.
///
/// Implementations deliver frames through the callback passed to
/// [`FrameSource::listen`] until [`FrameSource::stop`] is called, then
/// deliver a final [`DeliveryStatus::Stopped`]. `listen` while already
/// listening is a no-op; `stop` is idempotent.
pub trait FrameSource: Send + Sync {
    /// Which modality this source produces
    fn modality(&self) -> Modality;

    /// Start the capture thread, delivering into `callback`.
    fn listen(&self, callback: FrameCallback);

    /// Request the capture thread to finish.
    fn stop(&self);

    /// Whether the capture thread is running
    fn is_listening(&self) -> bool;
}
