use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::PixelSize;
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::foundation::math::unpremultiply_u8;

/// One rasterized snapshot of the rendered surface.
///
/// Pixels are straight-alpha RGBA8. The logical size is `pixel size / scale`; the pipeline only
/// cares about the pixel size, the scale is carried along for callers that think in points.
#[derive(Clone, Debug)]
pub struct StillImage {
    pixels: image::RgbaImage,
    scale: f64,
}

impl StillImage {
    /// Wrap an already rasterized bitmap.
    pub fn from_image(pixels: image::RgbaImage, scale: f64) -> CaptureResult<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(CaptureError::validation("still image must be non-empty"));
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CaptureError::validation(
                "still image scale must be finite and > 0",
            ));
        }
        Ok(Self { pixels, scale })
    }

    /// Build from tightly packed straight-alpha RGBA8 bytes.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>, scale: f64) -> CaptureResult<Self> {
        let expected = PixelSize::new(width, height).rgba8_len();
        if data.len() != expected {
            return Err(CaptureError::validation(format!(
                "rgba8 data length {} does not match {width}x{height}",
                data.len()
            )));
        }
        let pixels = image::RgbaImage::from_raw(width, height, data)
            .ok_or_else(|| CaptureError::validation("rgba8 buffer rejected by image"))?;
        Self::from_image(pixels, scale)
    }

    /// Build from premultiplied RGBA8 bytes, as produced by most rasterizers.
    pub fn from_premul_rgba8(
        width: u32,
        height: u32,
        mut data: Vec<u8>,
        scale: f64,
    ) -> CaptureResult<Self> {
        for px in data.chunks_exact_mut(4) {
            let a = px[3];
            if a == 255 {
                continue;
            }
            px[0] = unpremultiply_u8(px[0], a);
            px[1] = unpremultiply_u8(px[1], a);
            px[2] = unpremultiply_u8(px[2], a);
        }
        Self::from_rgba8(width, height, data, scale)
    }

    /// A single-colour image, mostly useful in tests and diagnostics.
    pub fn solid(size: PixelSize, rgba: [u8; 4]) -> CaptureResult<Self> {
        let pixels = image::RgbaImage::from_pixel(size.width, size.height, image::Rgba(rgba));
        Self::from_image(pixels, 1.0)
    }

    /// Decode an image file (PNG, JPEG, ...) at scale 1.
    pub fn open(path: &Path) -> CaptureResult<Self> {
        let img = image::open(path)
            .with_context(|| format!("decode still image '{}'", path.display()))?;
        Self::from_image(img.to_rgba8(), 1.0)
    }

    /// Pixel dimensions (`size × scale`).
    pub fn pixel_size(&self) -> PixelSize {
        PixelSize::new(self.pixels.width(), self.pixels.height())
    }

    /// Logical size in points.
    pub fn logical_size(&self) -> (f64, f64) {
        (
            f64::from(self.pixels.width()) / self.scale,
            f64::from(self.pixels.height()) / self.scale,
        )
    }

    /// Pixel scale factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Borrow the bitmap.
    pub fn pixels(&self) -> &image::RgbaImage {
        &self.pixels
    }

    /// Write the image as PNG.
    pub fn save_png(&self, path: &Path) -> CaptureResult<()> {
        self.pixels
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/still.rs"]
mod tests;
