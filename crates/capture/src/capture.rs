//! Capture - a time-coherent bundle of frames from one exposure window.

use std::fmt;
use std::sync::{Arc, Mutex};

use contracts::Modality;

use crate::Frame;

#[derive(Default)]
struct Slots {
    color: Option<Frame>,
    depth: Option<Frame>,
    ir: Option<Frame>,
    temperature_c: Option<f32>,
}

/// At most one frame per modality plus a device temperature sample.
///
/// Cheaply clonable handle; all clones observe the same slots. Setting a
/// slot replaces the previous frame, dropping that reference, and getting a
/// slot hands out a new reference to the stored frame.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Slots>>);

impl Capture {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Color frame, if present
    pub fn color_frame(&self) -> Option<Frame> {
        self.slots().color.clone()
    }

    /// Store the color frame, replacing any previous one
    pub fn set_color_frame(&self, frame: Option<Frame>) {
        self.slots().color = frame;
    }

    /// Depth frame, if present
    pub fn depth_frame(&self) -> Option<Frame> {
        self.slots().depth.clone()
    }

    /// Store the depth frame, replacing any previous one
    pub fn set_depth_frame(&self, frame: Option<Frame>) {
        self.slots().depth = frame;
    }

    /// IR frame, if present
    pub fn ir_frame(&self) -> Option<Frame> {
        self.slots().ir.clone()
    }

    /// Store the IR frame, replacing any previous one
    pub fn set_ir_frame(&self, frame: Option<Frame>) {
        self.slots().ir = frame;
    }

    /// Frame for the given modality, if present
    pub fn frame(&self, modality: Modality) -> Option<Frame> {
        match modality {
            Modality::Color => self.color_frame(),
            Modality::Depth => self.depth_frame(),
            Modality::Ir => self.ir_frame(),
        }
    }

    /// Store a frame under the given modality
    pub fn set_frame(&self, modality: Modality, frame: Option<Frame>) {
        match modality {
            Modality::Color => self.set_color_frame(frame),
            Modality::Depth => self.set_depth_frame(frame),
            Modality::Ir => self.set_ir_frame(frame),
        }
    }

    /// Device temperature in degrees Celsius, if sampled
    pub fn temperature_c(&self) -> Option<f32> {
        self.slots().temperature_c
    }

    /// Store the device temperature in degrees Celsius
    pub fn set_temperature_c(&self, temperature_c: Option<f32>) {
        self.slots().temperature_c = temperature_c;
    }

    /// Representative device timestamp of the capture, microseconds.
    ///
    /// Depth leads, then IR, then color, so paired captures are ordered by
    /// their depth exposure.
    pub fn device_timestamp_usec(&self) -> Option<u64> {
        let slots = self.slots();
        slots
            .depth
            .as_ref()
            .or(slots.ir.as_ref())
            .or(slots.color.as_ref())
            .map(Frame::device_timestamp_usec)
    }

    /// Whether no frame is stored in any slot
    pub fn is_empty(&self) -> bool {
        let slots = self.slots();
        slots.color.is_none() && slots.depth.is_none() && slots.ir.is_none()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots();
        f.debug_struct("Capture")
            .field("color", &slots.color.is_some())
            .field("depth", &slots.depth.is_some())
            .field("ir", &slots.ir.is_some())
            .field("temperature_c", &slots.temperature_c)
            .finish()
    }
}
