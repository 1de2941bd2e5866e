//! Per-modality queue of frames awaiting a partner.

use std::collections::VecDeque;
use std::fmt;

use capture::Frame;

/// Frames from one producer, ordered by arrival.
///
/// Bounded; pushing into a full queue evicts the oldest frame so a stalled
/// consumer can never pin unbounded memory.
pub(crate) struct PendingQueue {
    frames: VecDeque<Frame>,
    max_depth: usize,
    last_timestamp: Option<u64>,
    out_of_order: u64,
}

impl fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingQueue")
            .field("len", &self.frames.len())
            .field("max_depth", &self.max_depth)
            .field("out_of_order", &self.out_of_order)
            .finish()
    }
}

impl PendingQueue {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(max_depth),
            max_depth: max_depth.max(1),
            last_timestamp: None,
            out_of_order: 0,
        }
    }

    /// Push a frame, returning the evicted oldest frame when full.
    pub(crate) fn push(&mut self, frame: Frame) -> Option<Frame> {
        let timestamp = frame.device_timestamp_usec();
        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                self.out_of_order += 1;
            }
        }
        self.last_timestamp = Some(timestamp);

        let evicted = if self.frames.len() == self.max_depth {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    /// Device timestamp of the oldest pending frame
    pub(crate) fn front_timestamp(&self) -> Option<u64> {
        self.frames.front().map(Frame::device_timestamp_usec)
    }

    pub(crate) fn pop_front(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Remove and return the frame with exactly this timestamp, if present.
    pub(crate) fn take_at(&mut self, timestamp_usec: u64) -> Option<Frame> {
        let position = self
            .frames
            .iter()
            .position(|frame| frame.device_timestamp_usec() == timestamp_usec)?;
        self.frames.remove(position)
    }

    /// Drop every frame older than the cutoff, returning them.
    pub(crate) fn drain_older_than(&mut self, cutoff_usec: u64) -> Vec<Frame> {
        let mut drained = Vec::new();
        while let Some(timestamp) = self.front_timestamp() {
            if timestamp >= cutoff_usec {
                break;
            }
            if let Some(frame) = self.frames.pop_front() {
                drained.push(frame);
            }
        }
        drained
    }

    /// Remove all pending frames, returning them in order.
    pub(crate) fn drain(&mut self) -> Vec<Frame> {
        self.frames.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn out_of_order_count(&self) -> u64 {
        self.out_of_order
    }
}
