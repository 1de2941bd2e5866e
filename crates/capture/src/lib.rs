//! # Capture
//!
//! Shared-ownership frame and capture objects.
//!
//! A [`Frame`] wraps one image buffer plus its metadata; a [`Capture`]
//! bundles at most one frame per modality into a single time-coherent unit.
//! Both are cheaply clonable handles: cloning acquires a reference, dropping
//! releases it, and buffer release callbacks fire exactly once when the last
//! reference goes away.

mod capture;
mod frame;

pub use capture::Capture;
pub use frame::{BufferRejected, Frame};
