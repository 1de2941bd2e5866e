//! Frame - reference-counted image buffer with capture metadata.
//!
//! The pixel buffer is either allocated by this crate or supplied by the
//! caller together with a release callback. Metadata (timestamps, exposure,
//! white balance, ISO) is mutable under a per-frame lock; the pixel buffer
//! is writable only while the frame is still uniquely referenced.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use contracts::{Error, ImageFormat, Result};

/// Maximum accepted width/height in pixels (exclusive)
const MAX_DIMENSION: u32 = 20_000;

type ReleaseFn = Box<dyn FnOnce(Vec<u8>) + Send + Sync>;

/// A caller-supplied buffer that failed validation.
///
/// Returned by [`Frame::from_buffer`] so the caller gets its buffer back and
/// stays responsible for it; the runtime never frees a buffer it rejected.
#[derive(thiserror::Error)]
#[error("{reason}")]
pub struct BufferRejected {
    /// Why the buffer was rejected
    pub reason: Error,
    /// The untouched buffer, returned to the caller
    pub buffer: Vec<u8>,
}

impl fmt::Debug for BufferRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferRejected")
            .field("reason", &self.reason)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

enum Storage {
    /// Buffer allocated by this crate, freed on last release
    Owned(Vec<u8>),
    /// Caller-supplied buffer; the release callback receives it back when
    /// the last reference drops
    External {
        buffer: Vec<u8>,
        release: Option<ReleaseFn>,
    },
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned(buffer) => buffer,
            Storage::External { buffer, .. } => buffer,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Storage::Owned(buffer) => buffer,
            Storage::External { buffer, .. } => buffer,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FrameMeta {
    device_timestamp_usec: u64,
    system_timestamp_nsec: u64,
    exposure_usec: u64,
    white_balance_k: u32,
    iso_speed: u32,
}

struct FrameInner {
    format: ImageFormat,
    width: u32,
    height: u32,
    stride: u32,
    /// Logical byte length; may shrink below the allocation for compressed
    /// formats that are allocated worst-case.
    len: AtomicUsize,
    storage: Storage,
    meta: Mutex<FrameMeta>,
}

impl Drop for FrameInner {
    fn drop(&mut self) {
        if let Storage::External { buffer, release } = &mut self.storage {
            if let Some(release) = release.take() {
                release(std::mem::take(buffer));
            }
        }
    }
}

/// Reference-counted image buffer with format, geometry and timing metadata.
///
/// `Clone` acquires an additional reference to the same logical frame;
/// dropping the last reference frees the buffer (or hands it back through
/// the release callback for externally supplied buffers).
#[derive(Clone)]
pub struct Frame(Arc<FrameInner>);

impl Frame {
    /// Allocate a frame from format and geometry.
    ///
    /// The buffer size is computed from the per-format stride/size rules.
    /// Formats without a constant stride (`ColorMjpg`) cannot be created
    /// this way; use [`Frame::create_with_size`] instead.
    pub fn create(format: ImageFormat, width: u32, height: u32, stride: u32) -> Result<Self> {
        validate_geometry(width, height)?;
        let size = compute_size(format, width, height, stride)?;
        let buffer = try_alloc(size)?;
        Ok(Self::new_inner(
            format,
            width,
            height,
            stride,
            Storage::Owned(buffer),
        ))
    }

    /// Allocate a frame with an explicit byte size.
    ///
    /// Required for compressed and opaque formats whose size varies per
    /// frame and cannot be derived from geometry.
    pub fn create_with_size(
        format: ImageFormat,
        width: u32,
        height: u32,
        stride: u32,
        size: usize,
    ) -> Result<Self> {
        validate_geometry(width, height)?;
        if size == 0 {
            return Err(Error::invalid_argument("frame size must be non-zero"));
        }
        let buffer = try_alloc(size)?;
        Ok(Self::new_inner(
            format,
            width,
            height,
            stride,
            Storage::Owned(buffer),
        ))
    }

    /// Take ownership of a prepared buffer.
    ///
    /// The buffer is freed when the last reference drops, like a buffer
    /// allocated by [`Frame::create`].
    pub fn from_vec(
        format: ImageFormat,
        width: u32,
        height: u32,
        stride: u32,
        buffer: Vec<u8>,
    ) -> Result<Self> {
        validate_geometry(width, height)?;
        if buffer.is_empty() {
            return Err(Error::invalid_argument("frame buffer must be non-empty"));
        }
        Ok(Self::new_inner(
            format,
            width,
            height,
            stride,
            Storage::Owned(buffer),
        ))
    }

    /// Wrap a caller-provided buffer.
    ///
    /// Takes shared ownership of `buffer`; when the last reference to the
    /// frame drops, `release` is invoked exactly once with the buffer. On
    /// validation failure the buffer is handed back inside the error and is
    /// never released by this crate.
    pub fn from_buffer(
        format: ImageFormat,
        width: u32,
        height: u32,
        stride: u32,
        buffer: Vec<u8>,
        release: impl FnOnce(Vec<u8>) + Send + Sync + 'static,
    ) -> std::result::Result<Self, BufferRejected> {
        if let Err(reason) = validate_geometry(width, height) {
            return Err(BufferRejected { reason, buffer });
        }
        if buffer.is_empty() {
            return Err(BufferRejected {
                reason: Error::invalid_argument("frame buffer must be non-empty"),
                buffer,
            });
        }
        Ok(Self::new_inner(
            format,
            width,
            height,
            stride,
            Storage::External {
                buffer,
                release: Some(Box::new(release)),
            },
        ))
    }

    fn new_inner(
        format: ImageFormat,
        width: u32,
        height: u32,
        stride: u32,
        storage: Storage,
    ) -> Self {
        let len = storage.bytes().len();
        Self(Arc::new(FrameInner {
            format,
            width,
            height,
            stride,
            len: AtomicUsize::new(len),
            storage,
            meta: Mutex::new(FrameMeta::default()),
        }))
    }

    /// Pixel format
    pub fn format(&self) -> ImageFormat {
        self.0.format
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.0.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.0.height
    }

    /// Stride in bytes
    pub fn stride(&self) -> u32 {
        self.0.stride
    }

    /// Logical buffer length in bytes
    pub fn len(&self) -> usize {
        self.0.len.load(Ordering::Acquire)
    }

    /// Whether the logical buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel data, truncated to the logical length
    pub fn data(&self) -> &[u8] {
        &self.0.storage.bytes()[..self.len()]
    }

    /// Mutable pixel data.
    ///
    /// Only available while this is the sole reference to the frame;
    /// producers fill the buffer before handing the frame to consumers.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        let len = self.len();
        Arc::get_mut(&mut self.0).map(|inner| &mut inner.storage.bytes_mut()[..len])
    }

    /// Reduce the logical byte length.
    ///
    /// Compressed frames are allocated worst-case and trimmed to the actual
    /// encoded size. Growing the length is an error.
    pub fn shrink_len(&self, len: usize) -> Result<()> {
        let current = self.0.len.load(Ordering::Acquire);
        if len > current {
            return Err(Error::invalid_argument(format!(
                "cannot grow frame length from {current} to {len} bytes"
            )));
        }
        self.0.len.store(len, Ordering::Release);
        Ok(())
    }

    /// Number of live references, including this one. Diagnostics only.
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Device timestamp in microseconds
    pub fn device_timestamp_usec(&self) -> u64 {
        self.meta().device_timestamp_usec
    }

    /// Set the device timestamp in microseconds
    pub fn set_device_timestamp_usec(&self, timestamp_usec: u64) {
        self.meta_mut(|meta| meta.device_timestamp_usec = timestamp_usec);
    }

    /// Host monotonic timestamp in nanoseconds
    pub fn system_timestamp_nsec(&self) -> u64 {
        self.meta().system_timestamp_nsec
    }

    /// Set the host timestamp in nanoseconds
    pub fn set_system_timestamp_nsec(&self, timestamp_nsec: u64) {
        self.meta_mut(|meta| meta.system_timestamp_nsec = timestamp_nsec);
    }

    /// Stamp the frame with the current host time.
    ///
    /// Uses the process monotonic clock, so values never decrease across
    /// frames stamped in temporal order and a u64 of nanoseconds does not
    /// roll over for centuries.
    pub fn apply_system_timestamp(&self) {
        self.set_system_timestamp_nsec(monotonic_nsec());
    }

    /// Exposure duration in microseconds (color frames)
    pub fn exposure_usec(&self) -> u64 {
        self.meta().exposure_usec
    }

    /// Set the exposure duration in microseconds
    pub fn set_exposure_usec(&self, exposure_usec: u64) {
        self.meta_mut(|meta| meta.exposure_usec = exposure_usec);
    }

    /// White balance in degrees Kelvin (color frames)
    pub fn white_balance_k(&self) -> u32 {
        self.meta().white_balance_k
    }

    /// Set the white balance in degrees Kelvin
    pub fn set_white_balance_k(&self, white_balance_k: u32) {
        self.meta_mut(|meta| meta.white_balance_k = white_balance_k);
    }

    /// ISO speed (color frames)
    pub fn iso_speed(&self) -> u32 {
        self.meta().iso_speed
    }

    /// Set the ISO speed
    pub fn set_iso_speed(&self, iso_speed: u32) {
        self.meta_mut(|meta| meta.iso_speed = iso_speed);
    }

    fn meta(&self) -> FrameMeta {
        *self.0.meta.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn meta_mut(&self, mutate: impl FnOnce(&mut FrameMeta)) {
        mutate(&mut self.0.meta.lock().unwrap_or_else(|e| e.into_inner()));
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("format", &self.format())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("stride", &self.stride())
            .field("len", &self.len())
            .field("device_timestamp_usec", &self.device_timestamp_usec())
            .finish()
    }
}

/// Nanoseconds since the first use of the process clock, monotonic.
fn monotonic_nsec() -> u64 {
    static CLOCK_BASE: OnceLock<Instant> = OnceLock::new();
    let base = CLOCK_BASE.get_or_init(Instant::now);
    base.elapsed().as_nanos() as u64
}

fn validate_geometry(width: u32, height: u32) -> Result<()> {
    if width == 0 || width >= MAX_DIMENSION {
        return Err(Error::invalid_argument(format!(
            "width {width} out of range (0, {MAX_DIMENSION})"
        )));
    }
    if height == 0 || height >= MAX_DIMENSION {
        return Err(Error::invalid_argument(format!(
            "height {height} out of range (0, {MAX_DIMENSION})"
        )));
    }
    Ok(())
}

/// Per-format stride and size rules.
///
/// Packed-YUV needs even width; planar 4:2:0 additionally needs even height
/// (chroma is subsampled in both dimensions). Fixed-bpp formats need a
/// stride that covers at least one row of pixels.
fn compute_size(format: ImageFormat, width: u32, height: u32, stride: u32) -> Result<usize> {
    let (width, height, stride) = (width as usize, height as usize, stride as usize);
    match format {
        ImageFormat::ColorMjpg => Err(Error::invalid_argument(
            "COLOR_MJPG has no constant stride; use create_with_size",
        )),
        ImageFormat::ColorNv12 => {
            if height % 2 != 0 {
                return Err(Error::invalid_argument(format!(
                    "NV12 requires an even number of lines, height {height} is invalid"
                )));
            }
            if width % 2 != 0 {
                return Err(Error::invalid_argument(format!(
                    "NV12 requires an even number of pixels per line, width {width} is invalid"
                )));
            }
            check_stride(stride, width, 1)?;
            // Half-height chroma lines follow the luma plane.
            Ok(3 * height * stride / 2)
        }
        ImageFormat::ColorYuy2 => {
            if width % 2 != 0 {
                return Err(Error::invalid_argument(format!(
                    "YUY2 requires an even number of pixels per line, width {width} is invalid"
                )));
            }
            check_stride(stride, width, 2)?;
            Ok(height * stride)
        }
        ImageFormat::Custom8 => {
            check_stride(stride, width, 1)?;
            Ok(height * stride)
        }
        ImageFormat::Depth16 | ImageFormat::Ir16 | ImageFormat::Custom16 => {
            check_stride(stride, width, 2)?;
            Ok(height * stride)
        }
        ImageFormat::ColorBgra32 => {
            check_stride(stride, width, 4)?;
            Ok(height * stride)
        }
        ImageFormat::Custom => Ok(height * stride),
    }
}

fn check_stride(stride: usize, width: usize, bytes_per_pixel: usize) -> Result<()> {
    if stride < bytes_per_pixel * width {
        return Err(Error::invalid_argument(format!(
            "insufficient stride ({stride} bytes) to represent image width ({width} pixels)"
        )));
    }
    Ok(())
}

fn try_alloc(size: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| Error::OutOfMemory { requested: size })?;
    buffer.resize(size, 0);
    Ok(buffer)
}
