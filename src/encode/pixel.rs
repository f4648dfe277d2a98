//! Rasterizing still images into the encoder's fixed input format.

use crate::capture::still::StillImage;
use crate::foundation::core::PixelSize;
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::foundation::math::blend_over_u8;

/// Pixel layout handed to the video writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bits per channel, `R G B A` byte order, alpha always 255.
    Rgba8Opaque,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8Opaque => 4,
        }
    }

    /// Matching `ffmpeg -pix_fmt` name for rawvideo input.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Rgba8Opaque => "rgba",
        }
    }
}

/// What to do with a frame whose pixel size differs from the stream's.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionPolicy {
    /// Aspect-fit the frame into the stream size, centered on the background colour.
    #[default]
    Letterbox,
    /// Fail the session with [`CaptureError::DimensionMismatch`].
    Reject,
}

/// A fixed-format pixel buffer, tightly packed and row-major.
#[derive(Debug)]
pub struct PixelBuffer {
    size: PixelSize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub(crate) fn from_parts(size: PixelSize, format: PixelFormat, data: Vec<u8>) -> Self {
        debug_assert_eq!(
            data.len(),
            (size.width as usize) * (size.height as usize) * format.bytes_per_pixel()
        );
        Self { size, format, data }
    }

    /// Pixel dimensions.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row.
    pub fn bytes_per_row(&self) -> usize {
        self.size.width as usize * self.format.bytes_per_pixel()
    }

    /// Raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn fill(&mut self, rgba: [u8; 4]) {
        let px = [rgba[0], rgba[1], rgba[2], 255];
        for d in self.data.chunks_exact_mut(4) {
            d.copy_from_slice(&px);
        }
    }
}

/// Parameters for [`draw_still`].
#[derive(Clone, Copy, Debug)]
pub struct DrawOptions {
    /// Opaque colour under transparent pixels and around letterboxed frames.
    pub bg_rgba: [u8; 4],
    /// Handling of frames whose size differs from the buffer's.
    pub dimension_policy: DimensionPolicy,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            bg_rgba: [0, 0, 0, 255],
            dimension_policy: DimensionPolicy::default(),
        }
    }
}

/// Draw `image` into `dst`, flattening alpha over the background.
///
/// A same-sized image is drawn 1:1 at the origin. Anything else follows
/// [`DrawOptions::dimension_policy`].
pub fn draw_still(
    dst: &mut PixelBuffer,
    image: &StillImage,
    opts: &DrawOptions,
) -> CaptureResult<()> {
    if dst.format != PixelFormat::Rgba8Opaque {
        return Err(CaptureError::draw("unsupported destination pixel format"));
    }
    let expected_len = dst.size.rgba8_len();
    if dst.data.len() != expected_len {
        return Err(CaptureError::draw(format!(
            "pixel buffer holds {} bytes, {} expected for {}",
            dst.data.len(),
            expected_len,
            dst.size
        )));
    }

    let src_size = image.pixel_size();
    if src_size == dst.size {
        flatten_rows(dst, image.pixels(), 0, 0, opts.bg_rgba);
        return Ok(());
    }

    match opts.dimension_policy {
        DimensionPolicy::Reject => Err(CaptureError::DimensionMismatch {
            got: src_size,
            expected: dst.size,
        }),
        DimensionPolicy::Letterbox => {
            let fit = letterbox_rect(src_size, dst.size);
            let scaled = image::imageops::resize(
                image.pixels(),
                fit.size.width,
                fit.size.height,
                image::imageops::FilterType::Triangle,
            );
            dst.fill(opts.bg_rgba);
            flatten_rows(dst, &scaled, fit.x, fit.y, opts.bg_rgba);
            Ok(())
        }
    }
}

/// Placement of a letterboxed frame inside the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FitRect {
    /// Left offset in pixels.
    pub x: u32,
    /// Top offset in pixels.
    pub y: u32,
    /// Scaled frame size.
    pub size: PixelSize,
}

/// Largest aspect-preserving fit of `src` inside `dst`, centered.
pub fn letterbox_rect(src: PixelSize, dst: PixelSize) -> FitRect {
    let sx = f64::from(dst.width) / f64::from(src.width.max(1));
    let sy = f64::from(dst.height) / f64::from(src.height.max(1));
    let s = sx.min(sy);
    let w = ((f64::from(src.width) * s).round() as u32).clamp(1, dst.width.max(1));
    let h = ((f64::from(src.height) * s).round() as u32).clamp(1, dst.height.max(1));
    FitRect {
        x: (dst.width - w) / 2,
        y: (dst.height - h) / 2,
        size: PixelSize::new(w, h),
    }
}

fn flatten_rows(dst: &mut PixelBuffer, src: &image::RgbaImage, x0: u32, y0: u32, bg: [u8; 4]) {
    let stride = dst.bytes_per_row();
    let w = src.width().min(dst.size.width.saturating_sub(x0)) as usize;
    let h = src.height().min(dst.size.height.saturating_sub(y0));
    let src_stride = src.width() as usize * 4;
    let src_raw = src.as_raw();

    for row in 0..h as usize {
        let s_off = row * src_stride;
        let d_off = (y0 as usize + row) * stride + x0 as usize * 4;
        let s_row = &src_raw[s_off..s_off + w * 4];
        let d_row = &mut dst.data[d_off..d_off + w * 4];
        for (d, s) in d_row.chunks_exact_mut(4).zip(s_row.chunks_exact(4)) {
            let a = s[3];
            if a == 255 {
                d.copy_from_slice(s);
                continue;
            }
            d[0] = blend_over_u8(s[0], a, bg[0]);
            d[1] = blend_over_u8(s[1], a, bg[1]);
            d[2] = blend_over_u8(s[2], a, bg[2]);
            d[3] = 255;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/pixel.rs"]
mod tests;
