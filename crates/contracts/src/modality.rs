//! Modality - data channel identity of a frame

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data channel a frame belongs to.
///
/// A capture carries at most one frame per modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Color camera stream
    Color,
    /// Depth stream from the depth camera
    Depth,
    /// Passive/active IR stream from the depth camera
    Ir,
}

impl Modality {
    /// All modalities, in slot order
    pub const ALL: [Modality; 3] = [Modality::Color, Modality::Depth, Modality::Ir];
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modality::Color => "color",
            Modality::Depth => "depth",
            Modality::Ir => "ir",
        };
        f.write_str(name)
    }
}
