//! Pixel format enumeration
//!
//! The format describes how a frame's byte buffer is interpreted. Stride and
//! size rules per format live in the `capture` crate next to allocation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel format of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// JPEG-compressed color. No constant stride; every frame in a stream
    /// may have a different byte size.
    ColorMjpg,
    /// Planar 4:2:0 YUV: full-resolution luma plane followed by interleaved
    /// half-resolution chroma lines.
    ColorNv12,
    /// Packed 4:2:2 YUV, two bytes per pixel.
    ColorYuy2,
    /// Packed BGRA, four bytes per pixel, alpha unused.
    ColorBgra32,
    /// 16-bit little-endian depth in millimeters from the camera origin.
    Depth16,
    /// 16-bit little-endian infrared brightness.
    Ir16,
    /// Single-channel 8-bit custom data.
    Custom8,
    /// Single-channel 16-bit little-endian custom data.
    Custom16,
    /// Opaque custom data; layout defined by the originator.
    Custom,
}

impl ImageFormat {
    /// Bytes per pixel for fixed-bpp formats.
    ///
    /// `None` for compressed (`ColorMjpg`) and opaque (`Custom`) formats,
    /// whose per-frame size cannot be derived from geometry.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            ImageFormat::ColorMjpg | ImageFormat::Custom => None,
            ImageFormat::ColorNv12 | ImageFormat::Custom8 => Some(1),
            ImageFormat::ColorYuy2
            | ImageFormat::Depth16
            | ImageFormat::Ir16
            | ImageFormat::Custom16 => Some(2),
            ImageFormat::ColorBgra32 => Some(4),
        }
    }

    /// Whether this is one of the color camera formats
    pub fn is_color(self) -> bool {
        matches!(
            self,
            ImageFormat::ColorMjpg
                | ImageFormat::ColorNv12
                | ImageFormat::ColorYuy2
                | ImageFormat::ColorBgra32
        )
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageFormat::ColorMjpg => "COLOR_MJPG",
            ImageFormat::ColorNv12 => "COLOR_NV12",
            ImageFormat::ColorYuy2 => "COLOR_YUY2",
            ImageFormat::ColorBgra32 => "COLOR_BGRA32",
            ImageFormat::Depth16 => "DEPTH16",
            ImageFormat::Ir16 => "IR16",
            ImageFormat::Custom8 => "CUSTOM8",
            ImageFormat::Custom16 => "CUSTOM16",
            ImageFormat::Custom => "CUSTOM",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(ImageFormat::Depth16.bytes_per_pixel(), Some(2));
        assert_eq!(ImageFormat::ColorBgra32.bytes_per_pixel(), Some(4));
        assert_eq!(ImageFormat::ColorMjpg.bytes_per_pixel(), None);
        assert_eq!(ImageFormat::Custom.bytes_per_pixel(), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&ImageFormat::ColorNv12).unwrap();
        assert_eq!(json, "\"color_nv12\"");
        let parsed: ImageFormat = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ImageFormat::ColorNv12);
    }
}
