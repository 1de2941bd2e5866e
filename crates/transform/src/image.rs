//! Image descriptors and raw pixel access for the slice-level transforms.

use capture::Frame;
use contracts::{Error, ImageFormat, Result};

/// Geometry and format of an image buffer, decoupled from frame ownership
/// so transforms can run on caller-managed slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes
    pub stride: u32,
}

impl ImageDescriptor {
    pub fn new(format: ImageFormat, width: u32, height: u32, stride: u32) -> Self {
        Self {
            format,
            width,
            height,
            stride,
        }
    }

    pub fn for_frame(frame: &Frame) -> Self {
        Self {
            format: frame.format(),
            width: frame.width(),
            height: frame.height(),
            stride: frame.stride(),
        }
    }

    /// Bytes required to hold the image
    pub fn required_size(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Check format and geometry against what a transform expects.
    pub(crate) fn expect(
        &self,
        role: &str,
        format: ImageFormat,
        width: u32,
        height: u32,
    ) -> Result<()> {
        if self.format != format {
            return Err(Error::invalid_argument(format!(
                "{role} image must be {format}, got {}",
                self.format
            )));
        }
        if self.width != width || self.height != height {
            return Err(Error::invalid_argument(format!(
                "{role} image must be {width}x{height}, got {}x{}",
                self.width, self.height
            )));
        }
        let min_stride = match self.format.bytes_per_pixel() {
            Some(bpp) => bpp as u32 * self.width,
            None => {
                return Err(Error::invalid_argument(format!(
                    "{role} image format {format} has no fixed pixel layout"
                )))
            }
        };
        if self.stride < min_stride {
            return Err(Error::invalid_argument(format!(
                "{role} image stride {} is below the row size {min_stride}",
                self.stride
            )));
        }
        Ok(())
    }

    /// Check that a buffer covers this descriptor.
    pub(crate) fn check_buffer(&self, role: &str, len: usize) -> Result<()> {
        let required = self.required_size();
        if len < required {
            return Err(Error::BufferTooSmall { required });
        }
        // Oversized buffers are fine; transforms only touch the image area.
        let _ = role;
        Ok(())
    }
}

/// Depth and IR pixels are u16 in host byte order.
#[inline]
pub(crate) fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_ne_bytes([data[offset], data[offset + 1]])
}

#[inline]
pub(crate) fn write_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_ne_bytes());
}

#[inline]
pub(crate) fn write_i16(data: &mut [u8], offset: usize, value: i16) {
    data[offset..offset + 2].copy_from_slice(&value.to_ne_bytes());
}
