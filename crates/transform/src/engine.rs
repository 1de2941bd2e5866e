//! Whole-image transforms with precomputed ray tables.

use calibration::{Calibration, SensorSpace};
use capture::Frame;
use contracts::{Error, ImageFormat, Result};
use nalgebra::{Vector2, Vector3};
use tracing::instrument;

use crate::image::{read_u16, write_i16, write_u16, ImageDescriptor};
use crate::intrinsics::{project, unproject_normalized};
use crate::point::{enabled_camera, transform_2d_to_2d};

/// Depth range walked by the epipolar search, millimeters
const EPIPOLAR_SEARCH_MIN_DEPTH_MM: f32 = 100.0;
const EPIPOLAR_SEARCH_MAX_DEPTH_MM: f32 = 10_000.0;

/// How color samples are interpolated when resampling into the depth
/// camera's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationType {
    #[default]
    Nearest,
    Bilinear,
}

/// Per-pixel unit-depth ray directions for one camera.
///
/// Entry `[x, y]` is the 3D point at depth 1 mm behind the pixel; entries
/// are NaN where the pixel has no valid unprojection.
struct RayTable {
    width: usize,
    height: usize,
    rays: Vec<[f32; 2]>,
}

impl RayTable {
    fn build(calibration: &Calibration, space: SensorSpace) -> Result<Self> {
        let camera = enabled_camera(calibration, space)?;
        let (width, height) = (camera.width as usize, camera.height as usize);
        let mut rays = Vec::new();
        rays.try_reserve_exact(width * height)
            .map_err(|_| Error::OutOfMemory {
                requested: width * height * std::mem::size_of::<[f32; 2]>(),
            })?;
        for v in 0..height {
            for u in 0..width {
                let pixel = Vector2::new(u as f32, v as f32);
                let ray = unproject_normalized(&camera.intrinsics, pixel)
                    .map(|r| [r.x, r.y])
                    .unwrap_or([f32::NAN, f32::NAN]);
                rays.push(ray);
            }
        }
        Ok(Self {
            width,
            height,
            rays,
        })
    }

    #[inline]
    fn ray(&self, x: usize, y: usize) -> [f32; 2] {
        self.rays[y * self.width + x]
    }
}

/// Image-level transform engine bound to one calibration.
///
/// Construction pays the cost of inverting the distortion model for every
/// pixel of each enabled camera; the per-frame operations afterwards are
/// table lookups and forward projections only. Immutable after
/// construction and safe to share across threads.
pub struct Transformation {
    calibration: Calibration,
    depth_rays: Option<RayTable>,
    color_rays: Option<RayTable>,
}

impl Transformation {
    /// Precompute ray tables for every enabled camera.
    #[instrument(name = "transformation_new", skip(calibration), fields(
        depth_mode = ?calibration.depth_mode,
        color_resolution = ?calibration.color_resolution,
    ))]
    pub fn new(calibration: Calibration) -> Result<Self> {
        let depth_rays = if calibration.depth_camera.is_enabled() {
            Some(RayTable::build(&calibration, SensorSpace::Depth)?)
        } else {
            None
        };
        let color_rays = if calibration.color_camera.is_enabled() {
            Some(RayTable::build(&calibration, SensorSpace::Color)?)
        } else {
            None
        };
        Ok(Self {
            calibration,
            depth_rays,
            color_rays,
        })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Unproject every depth pixel into an interleaved x/y/z image of
    /// signed 16-bit millimeter coordinates.
    ///
    /// `camera` selects whose geometry the depth image is in: the depth
    /// camera for raw depth frames, or the color camera for depth frames
    /// already reprojected there. Invalid pixels produce (0, 0, 0).
    #[instrument(name = "transformation_point_cloud", skip(self, depth_image))]
    pub fn depth_image_to_point_cloud(
        &self,
        depth_image: &Frame,
        camera: SensorSpace,
    ) -> Result<Frame> {
        let depth_desc = ImageDescriptor::for_frame(depth_image);
        let out_desc = ImageDescriptor::new(
            ImageFormat::Custom,
            depth_desc.width,
            depth_desc.height,
            6 * depth_desc.width,
        );
        let mut buffer = alloc_zeroed(out_desc.required_size())?;
        self.depth_image_to_point_cloud_internal(
            depth_image.data(),
            depth_desc,
            camera,
            &mut buffer,
            out_desc,
        )?;
        Frame::from_vec(
            out_desc.format,
            out_desc.width,
            out_desc.height,
            out_desc.stride,
            buffer,
        )
    }

    /// Slice-level variant of [`Transformation::depth_image_to_point_cloud`]
    /// writing into a caller-provided buffer.
    pub fn depth_image_to_point_cloud_internal(
        &self,
        depth: &[u8],
        depth_desc: ImageDescriptor,
        camera: SensorSpace,
        output: &mut [u8],
        output_desc: ImageDescriptor,
    ) -> Result<()> {
        let cam = enabled_camera(&self.calibration, camera)?;
        depth_desc.expect("depth", ImageFormat::Depth16, cam.width, cam.height)?;
        depth_desc.check_buffer("depth", depth.len())?;
        if output_desc.format != ImageFormat::Custom
            || output_desc.width != depth_desc.width
            || output_desc.height != depth_desc.height
            || output_desc.stride < 6 * depth_desc.width
        {
            return Err(Error::invalid_argument(
                "point cloud output must be CUSTOM with a 6-byte-per-pixel stride",
            ));
        }
        output_desc.check_buffer("point cloud", output.len())?;

        let rays = self.rays(camera)?;
        let in_stride = depth_desc.stride as usize;
        let out_stride = output_desc.stride as usize;
        for y in 0..rays.height {
            for x in 0..rays.width {
                let depth_mm = read_u16(depth, y * in_stride + 2 * x);
                let [rx, ry] = rays.ray(x, y);
                let offset = y * out_stride + 6 * x;
                if depth_mm == 0 || rx.is_nan() {
                    write_i16(output, offset, 0);
                    write_i16(output, offset + 2, 0);
                    write_i16(output, offset + 4, 0);
                    continue;
                }
                let d = depth_mm as f32;
                write_i16(output, offset, (rx * d).round() as i16);
                write_i16(output, offset + 2, (ry * d).round() as i16);
                write_i16(output, offset + 4, i16::try_from(depth_mm).unwrap_or(i16::MAX));
            }
        }
        metrics::counter!("transform_images_total", "op" => "point_cloud").increment(1);
        Ok(())
    }

    /// Reproject a depth image into the color camera's geometry.
    ///
    /// Each depth pixel is unprojected, moved through the depth-to-color
    /// extrinsics and projected into the color grid. Collisions keep the
    /// nearest depth; unfilled output pixels stay at the invalid value 0.
    #[instrument(name = "transformation_depth_to_color", skip(self, depth_image))]
    pub fn depth_image_to_color_camera(&self, depth_image: &Frame) -> Result<Frame> {
        let color = enabled_camera(&self.calibration, SensorSpace::Color)?;
        let out_desc = ImageDescriptor::new(
            ImageFormat::Depth16,
            color.width,
            color.height,
            2 * color.width,
        );
        let mut buffer = alloc_zeroed(out_desc.required_size())?;
        self.reproject_depth_to_color(
            depth_image.data(),
            ImageDescriptor::for_frame(depth_image),
            None,
            InterpolationType::Nearest,
            &mut buffer,
            out_desc,
            None,
        )?;
        Frame::from_vec(
            out_desc.format,
            out_desc.width,
            out_desc.height,
            out_desc.stride,
            buffer,
        )
    }

    /// Like [`Transformation::depth_image_to_color_camera`], additionally
    /// carrying an auxiliary CUSTOM8/CUSTOM16 image through the same
    /// per-pixel mapping. `interpolation` selects how auxiliary values are
    /// resampled: nearest copies the source pixel, bilinear blends the four
    /// source pixels around the sub-pixel correspondence. Unmapped auxiliary
    /// pixels are filled with `invalid_custom_value` (truncated for 8-bit
    /// images).
    #[instrument(
        name = "transformation_depth_to_color_custom",
        skip(self, depth_image, custom_image)
    )]
    pub fn depth_image_to_color_camera_custom(
        &self,
        depth_image: &Frame,
        custom_image: &Frame,
        interpolation: InterpolationType,
        invalid_custom_value: u16,
    ) -> Result<(Frame, Frame)> {
        let color = enabled_camera(&self.calibration, SensorSpace::Color)?;
        let custom_desc = ImageDescriptor::for_frame(custom_image);
        let bpp = match custom_desc.format {
            ImageFormat::Custom8 => 1,
            ImageFormat::Custom16 => 2,
            other => {
                return Err(Error::invalid_argument(format!(
                    "auxiliary image must be CUSTOM8 or CUSTOM16, got {other}"
                )))
            }
        };

        let out_depth_desc = ImageDescriptor::new(
            ImageFormat::Depth16,
            color.width,
            color.height,
            2 * color.width,
        );
        let out_custom_desc = ImageDescriptor::new(
            custom_desc.format,
            color.width,
            color.height,
            bpp as u32 * color.width,
        );
        let mut depth_buffer = alloc_zeroed(out_depth_desc.required_size())?;
        let mut custom_buffer = alloc_zeroed(out_custom_desc.required_size())?;
        self.reproject_depth_to_color(
            depth_image.data(),
            ImageDescriptor::for_frame(depth_image),
            Some((custom_image.data(), custom_desc)),
            interpolation,
            &mut depth_buffer,
            out_depth_desc,
            Some((&mut custom_buffer, out_custom_desc, invalid_custom_value)),
        )?;

        let depth_out = Frame::from_vec(
            out_depth_desc.format,
            out_depth_desc.width,
            out_depth_desc.height,
            out_depth_desc.stride,
            depth_buffer,
        )?;
        let custom_out = Frame::from_vec(
            out_custom_desc.format,
            out_custom_desc.width,
            out_custom_desc.height,
            out_custom_desc.stride,
            custom_buffer,
        )?;
        Ok((depth_out, custom_out))
    }

    fn reproject_depth_to_color(
        &self,
        depth: &[u8],
        depth_desc: ImageDescriptor,
        custom: Option<(&[u8], ImageDescriptor)>,
        interpolation: InterpolationType,
        out_depth: &mut [u8],
        out_depth_desc: ImageDescriptor,
        mut out_custom: Option<(&mut Vec<u8>, ImageDescriptor, u16)>,
    ) -> Result<()> {
        let depth_cam = enabled_camera(&self.calibration, SensorSpace::Depth)?;
        let color_cam = enabled_camera(&self.calibration, SensorSpace::Color)?;
        depth_desc.expect("depth", ImageFormat::Depth16, depth_cam.width, depth_cam.height)?;
        depth_desc.check_buffer("depth", depth.len())?;
        out_depth_desc.expect(
            "output depth",
            ImageFormat::Depth16,
            color_cam.width,
            color_cam.height,
        )?;
        out_depth_desc.check_buffer("output depth", out_depth.len())?;

        let custom_bpp = if let Some((custom_data, custom_desc)) = custom {
            if custom_desc.width != depth_desc.width || custom_desc.height != depth_desc.height {
                return Err(Error::invalid_argument(
                    "auxiliary image geometry must match the depth image",
                ));
            }
            custom_desc.check_buffer("auxiliary", custom_data.len())?;
            match custom_desc.format {
                ImageFormat::Custom8 => 1usize,
                _ => 2,
            }
        } else {
            0
        };

        // Unfilled output pixels keep the invalid sentinel.
        out_depth[..out_depth_desc.required_size()].fill(0);
        if let Some((buffer, desc, invalid)) = out_custom.as_mut() {
            fill_custom(buffer, *desc, *invalid);
        }

        let rays = self.rays(SensorSpace::Depth)?;
        let extrinsics = self
            .calibration
            .extrinsics(SensorSpace::Depth, SensorSpace::Color);
        let in_stride = depth_desc.stride as usize;
        let out_stride = out_depth_desc.stride as usize;

        for y in 0..rays.height {
            for x in 0..rays.width {
                let depth_mm = read_u16(depth, y * in_stride + 2 * x);
                let [rx, ry] = rays.ray(x, y);
                if depth_mm == 0 || rx.is_nan() {
                    continue;
                }
                let d = depth_mm as f32;
                let point = extrinsics.transform_point(Vector3::new(rx * d, ry * d, d));
                let Some(pixel) = project(color_cam, point) else {
                    continue;
                };
                let cx = pixel.x.round() as i64;
                let cy = pixel.y.round() as i64;
                if cx < 0 || cy < 0 || cx >= color_cam.width as i64 || cy >= color_cam.height as i64
                {
                    continue;
                }
                let transformed = point.z.round().clamp(1.0, u16::MAX as f32) as u16;
                let offset = cy as usize * out_stride + 2 * cx as usize;
                let existing = read_u16(out_depth, offset);
                // Nearest-wins on collision.
                if existing != 0 && existing <= transformed {
                    continue;
                }
                write_u16(out_depth, offset, transformed);
                if let (Some((out_buffer, out_desc, _)), Some((custom_data, custom_desc))) =
                    (out_custom.as_mut(), custom)
                {
                    match interpolation {
                        InterpolationType::Nearest => copy_custom_pixel(
                            custom_data,
                            custom_desc,
                            (x, y),
                            out_buffer,
                            *out_desc,
                            (cx as usize, cy as usize),
                            custom_bpp,
                        ),
                        InterpolationType::Bilinear => {
                            // Sub-pixel source location for the target pixel
                            // center, treating the warp as locally a
                            // translation.
                            let source =
                                (x as f32 + (cx as f32 - pixel.x), y as f32 + (cy as f32 - pixel.y));
                            let value = sample_custom_bilinear(
                                custom_data,
                                custom_desc,
                                source,
                                custom_bpp,
                            );
                            write_custom_pixel(
                                out_buffer,
                                *out_desc,
                                (cx as usize, cy as usize),
                                value,
                                custom_bpp,
                            );
                        }
                    }
                }
            }
        }
        metrics::counter!("transform_images_total", "op" => "depth_to_color").increment(1);
        Ok(())
    }

    /// Resample a color image into the depth camera's geometry.
    ///
    /// Depth pixels without valid depth, or whose corresponding color
    /// sample falls outside the color image, come out fully transparent
    /// black.
    #[instrument(
        name = "transformation_color_to_depth",
        skip(self, depth_image, color_image)
    )]
    pub fn color_image_to_depth_camera(
        &self,
        depth_image: &Frame,
        color_image: &Frame,
        interpolation: InterpolationType,
    ) -> Result<Frame> {
        let depth_cam = enabled_camera(&self.calibration, SensorSpace::Depth)?;
        let color_cam = enabled_camera(&self.calibration, SensorSpace::Color)?;
        let depth_desc = ImageDescriptor::for_frame(depth_image);
        let color_desc = ImageDescriptor::for_frame(color_image);
        depth_desc.expect("depth", ImageFormat::Depth16, depth_cam.width, depth_cam.height)?;
        color_desc.expect(
            "color",
            ImageFormat::ColorBgra32,
            color_cam.width,
            color_cam.height,
        )?;
        color_desc.check_buffer("color", color_image.data().len())?;

        let out_desc = ImageDescriptor::new(
            ImageFormat::ColorBgra32,
            depth_cam.width,
            depth_cam.height,
            4 * depth_cam.width,
        );
        let mut output = alloc_zeroed(out_desc.required_size())?;

        let rays = self.rays(SensorSpace::Depth)?;
        let extrinsics = self
            .calibration
            .extrinsics(SensorSpace::Depth, SensorSpace::Color);
        let depth = depth_image.data();
        let color = color_image.data();
        let in_stride = depth_desc.stride as usize;
        let color_stride = color_desc.stride as usize;
        let out_stride = out_desc.stride as usize;

        for y in 0..rays.height {
            for x in 0..rays.width {
                let depth_mm = read_u16(depth, y * in_stride + 2 * x);
                let [rx, ry] = rays.ray(x, y);
                if depth_mm == 0 || rx.is_nan() {
                    continue;
                }
                let d = depth_mm as f32;
                let point = extrinsics.transform_point(Vector3::new(rx * d, ry * d, d));
                let Some(pixel) = project(color_cam, point) else {
                    continue;
                };
                let sample = match interpolation {
                    InterpolationType::Nearest => sample_nearest(
                        color,
                        color_stride,
                        color_cam.width as usize,
                        color_cam.height as usize,
                        pixel,
                    ),
                    InterpolationType::Bilinear => sample_bilinear(
                        color,
                        color_stride,
                        color_cam.width as usize,
                        color_cam.height as usize,
                        pixel,
                    ),
                };
                if let Some(bgra) = sample {
                    let offset = y * out_stride + 4 * x;
                    output[offset..offset + 4].copy_from_slice(&bgra);
                }
            }
        }
        metrics::counter!("transform_images_total", "op" => "color_to_depth").increment(1);

        Frame::from_vec(
            out_desc.format,
            out_desc.width,
            out_desc.height,
            out_desc.stride,
            output,
        )
    }

    /// Find the depth-image pixel corresponding to a color-image pixel.
    ///
    /// Projects the color pixel's ray at the near and far end of the
    /// plausible depth range into the depth image and walks the epipolar
    /// segment between them; each valid depth sample on the segment is
    /// reprojected into the color image and the candidate closest to the
    /// query wins. `Ok(None)` when no valid depth lies on the segment.
    #[instrument(name = "transformation_color_2d_to_depth_2d", skip(self, depth_image))]
    pub fn color_2d_to_depth_2d(
        &self,
        color_pixel: Vector2<f32>,
        depth_image: &Frame,
    ) -> Result<Option<Vector2<f32>>> {
        let depth_cam = enabled_camera(&self.calibration, SensorSpace::Depth)?;
        let depth_desc = ImageDescriptor::for_frame(depth_image);
        depth_desc.expect("depth", ImageFormat::Depth16, depth_cam.width, depth_cam.height)?;
        depth_desc.check_buffer("depth", depth_image.data().len())?;

        let near = transform_2d_to_2d(
            &self.calibration,
            color_pixel,
            EPIPOLAR_SEARCH_MIN_DEPTH_MM,
            SensorSpace::Color,
            SensorSpace::Depth,
        )?;
        let far = transform_2d_to_2d(
            &self.calibration,
            color_pixel,
            EPIPOLAR_SEARCH_MAX_DEPTH_MM,
            SensorSpace::Color,
            SensorSpace::Depth,
        )?;
        let (Some(near), Some(far)) = (near, far) else {
            return Ok(None);
        };

        let depth = depth_image.data();
        let stride = depth_desc.stride as usize;
        let steps = (far - near).abs().max().ceil() as i64 + 1;
        let mut best: Option<(f32, Vector2<f32>)> = None;

        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let sample = near + (far - near) * t;
            let sx = sample.x.round() as i64;
            let sy = sample.y.round() as i64;
            if sx < 0 || sy < 0 || sx >= depth_cam.width as i64 || sy >= depth_cam.height as i64 {
                continue;
            }
            let depth_mm = read_u16(depth, sy as usize * stride + 2 * sx as usize);
            if depth_mm == 0 {
                continue;
            }
            let candidate = Vector2::new(sx as f32, sy as f32);
            let Some(reprojected) = transform_2d_to_2d(
                &self.calibration,
                candidate,
                depth_mm as f32,
                SensorSpace::Depth,
                SensorSpace::Color,
            )?
            else {
                continue;
            };
            let error = (reprojected - color_pixel).norm_squared();
            if best.map_or(true, |(best_error, _)| error < best_error) {
                best = Some((error, candidate));
            }
        }

        Ok(best.map(|(_, pixel)| pixel))
    }

    fn rays(&self, camera: SensorSpace) -> Result<&RayTable> {
        let table = match camera {
            SensorSpace::Depth => self.depth_rays.as_ref(),
            SensorSpace::Color => self.color_rays.as_ref(),
            SensorSpace::Gyro | SensorSpace::Accel => None,
        };
        table.ok_or_else(|| {
            Error::invalid_argument(format!("{camera:?} has no ray table in this calibration"))
        })
    }
}

impl std::fmt::Debug for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformation")
            .field("depth_mode", &self.calibration.depth_mode)
            .field("color_resolution", &self.calibration.color_resolution)
            .finish()
    }
}

fn alloc_zeroed(size: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| Error::OutOfMemory { requested: size })?;
    buffer.resize(size, 0);
    Ok(buffer)
}

fn fill_custom(buffer: &mut [u8], desc: ImageDescriptor, invalid: u16) {
    match desc.format {
        ImageFormat::Custom8 => buffer[..desc.required_size()].fill(invalid as u8),
        _ => {
            let stride = desc.stride as usize;
            for y in 0..desc.height as usize {
                for x in 0..desc.width as usize {
                    write_u16(buffer, y * stride + 2 * x, invalid);
                }
            }
        }
    }
}

fn copy_custom_pixel(
    source: &[u8],
    source_desc: ImageDescriptor,
    (sx, sy): (usize, usize),
    target: &mut [u8],
    target_desc: ImageDescriptor,
    (tx, ty): (usize, usize),
    bpp: usize,
) {
    let src = sy * source_desc.stride as usize + bpp * sx;
    let dst = ty * target_desc.stride as usize + bpp * tx;
    target[dst..dst + bpp].copy_from_slice(&source[src..src + bpp]);
}

fn sample_custom_bilinear(
    source: &[u8],
    desc: ImageDescriptor,
    (x, y): (f32, f32),
    bpp: usize,
) -> u16 {
    let width = desc.width as usize;
    let height = desc.height as usize;
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let at = |px: usize, py: usize| -> f32 {
        let offset = py * desc.stride as usize + bpp * px;
        if bpp == 1 {
            source[offset] as f32
        } else {
            read_u16(source, offset) as f32
        }
    };
    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    (top * (1.0 - fy) + bottom * fy).round() as u16
}

fn write_custom_pixel(
    target: &mut [u8],
    desc: ImageDescriptor,
    (tx, ty): (usize, usize),
    value: u16,
    bpp: usize,
) {
    let offset = ty * desc.stride as usize + bpp * tx;
    if bpp == 1 {
        target[offset] = value as u8;
    } else {
        write_u16(target, offset, value);
    }
}

fn sample_nearest(
    color: &[u8],
    stride: usize,
    width: usize,
    height: usize,
    pixel: Vector2<f32>,
) -> Option<[u8; 4]> {
    let x = pixel.x.round() as i64;
    let y = pixel.y.round() as i64;
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        return None;
    }
    let offset = y as usize * stride + 4 * x as usize;
    Some([
        color[offset],
        color[offset + 1],
        color[offset + 2],
        color[offset + 3],
    ])
}

fn sample_bilinear(
    color: &[u8],
    stride: usize,
    width: usize,
    height: usize,
    pixel: Vector2<f32>,
) -> Option<[u8; 4]> {
    let x0 = pixel.x.floor() as i64;
    let y0 = pixel.y.floor() as i64;
    if x0 < 0 || y0 < 0 || x0 + 1 >= width as i64 || y0 + 1 >= height as i64 {
        return None;
    }
    let fx = pixel.x - x0 as f32;
    let fy = pixel.y - y0 as f32;
    let at = |x: i64, y: i64| {
        let offset = y as usize * stride + 4 * x as usize;
        [
            color[offset] as f32,
            color[offset + 1] as f32,
            color[offset + 2] as f32,
            color[offset + 3] as f32,
        ]
    };
    let (p00, p10, p01, p11) = (at(x0, y0), at(x0 + 1, y0), at(x0, y0 + 1), at(x0 + 1, y0 + 1));
    let mut out = [0u8; 4];
    for channel in 0..4 {
        let top = p00[channel] * (1.0 - fx) + p10[channel] * fx;
        let bottom = p01[channel] * (1.0 - fx) + p11[channel] * fx;
        out[channel] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    Some(out)
}
