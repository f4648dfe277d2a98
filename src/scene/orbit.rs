use std::time::Duration;

use kurbo::Shape as _;

use crate::capture::still::StillImage;
use crate::foundation::core::PixelSize;
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::source::FrameSource;

/// Layout and colours of an [`OrbitScene`].
///
/// Sizes are in logical points; the rendered bitmap is `size × scale` pixels.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrbitSceneOpts {
    /// Logical width.
    pub width: f64,
    /// Logical height.
    pub height: f64,
    /// Pixels per logical point.
    pub scale: f64,
    /// Number of balls.
    pub balls: u32,
    /// Distance of each ball from the centre.
    pub orbit_radius: f64,
    /// Ball diameter.
    pub ball_diameter: f64,
    /// Ball colour; alpha fades from opaque (first ball) towards transparent (last).
    pub ball_rgb: [u8; 3],
    /// Solid background.
    pub background_rgba: [u8; 4],
    /// Radians of orbit per second.
    pub speed: f64,
}

impl Default for OrbitSceneOpts {
    fn default() -> Self {
        Self {
            width: 320.0,
            height: 320.0,
            scale: 1.0,
            balls: 10,
            orbit_radius: 100.0,
            ball_diameter: 50.0,
            ball_rgb: [255, 59, 48],
            background_rgba: [255, 204, 0, 255],
            speed: 1.0,
        }
    }
}

/// Reference animation: translucent balls circling the centre of a solid background.
///
/// Ball `i` sits at phase `t·speed − 100·i`, offset `(sin, cos) × orbit_radius` from the centre,
/// with opacity `1 − i/balls`.
#[derive(Clone, Debug)]
pub struct OrbitScene {
    opts: OrbitSceneOpts,
    px: PixelSize,
}

impl OrbitScene {
    /// Check `opts` and fix the bitmap size.
    pub fn new(opts: OrbitSceneOpts) -> CaptureResult<Self> {
        for (name, v) in [
            ("width", opts.width),
            ("height", opts.height),
            ("scale", opts.scale),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(CaptureError::validation(format!(
                    "scene {name} must be finite and > 0"
                )));
            }
        }
        if !opts.orbit_radius.is_finite()
            || !opts.ball_diameter.is_finite()
            || !opts.speed.is_finite()
        {
            return Err(CaptureError::validation("scene geometry must be finite"));
        }

        let w = (opts.width * opts.scale).round();
        let h = (opts.height * opts.scale).round();
        if w < 1.0 || h < 1.0 || w > f64::from(u16::MAX) || h > f64::from(u16::MAX) {
            return Err(CaptureError::validation(format!(
                "scene bitmap {w}x{h} is outside 1..={}",
                u16::MAX
            )));
        }
        let px = PixelSize::new(w as u32, h as u32);
        Ok(Self { opts, px })
    }

    /// Scene settings.
    pub fn opts(&self) -> &OrbitSceneOpts {
        &self.opts
    }

    /// Size of every rendered still.
    pub fn pixel_size(&self) -> PixelSize {
        self.px
    }

    /// Centre of ball `i` at `t_secs`, in logical points.
    pub fn ball_center(&self, i: u32, t_secs: f64) -> kurbo::Point {
        let phase = t_secs * self.opts.speed - f64::from(i) * 100.0;
        kurbo::Point::new(
            self.opts.width / 2.0 + phase.sin() * self.opts.orbit_radius,
            self.opts.height / 2.0 + phase.cos() * self.opts.orbit_radius,
        )
    }

    /// Opacity of ball `i`.
    pub fn ball_alpha(&self, i: u32) -> f64 {
        1.0 - f64::from(i) / f64::from(self.opts.balls.max(1))
    }

    /// Rasterize the scene at `t_secs`.
    pub fn render(&self, t_secs: f64) -> CaptureResult<StillImage> {
        let (w, h) = (self.px.width as u16, self.px.height as u16);
        let mut ctx = vello_cpu::RenderContext::new(w, h);

        let [br, bg, bb, ba] = self.opts.background_rgba;
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(br, bg, bb, ba));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(w),
            f64::from(h),
        ));

        ctx.set_transform(vello_cpu::kurbo::Affine::scale(self.opts.scale));
        let [r, g, b] = self.opts.ball_rgb;
        let radius = self.opts.ball_diameter / 2.0;
        for i in 0..self.opts.balls {
            let alpha = (self.ball_alpha(i) * 255.0).round().clamp(0.0, 255.0) as u8;
            if alpha == 0 || radius <= 0.0 {
                continue;
            }
            let circle = kurbo::Circle::new(self.ball_center(i, t_secs), radius);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, alpha));
            ctx.fill_path(&bezpath_to_cpu(&circle.to_path(0.1)));
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        StillImage::from_premul_rgba8(
            self.px.width,
            self.px.height,
            pixmap.data_as_u8_slice().to_vec(),
            self.opts.scale,
        )
    }
}

impl FrameSource for OrbitScene {
    fn snapshot(&mut self, elapsed: Duration) -> CaptureResult<StillImage> {
        self.render(elapsed.as_secs_f64())
    }
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let pt = |p: kurbo::Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(pt(p)),
            PathEl::LineTo(p) => out.line_to(pt(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(pt(p1), pt(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(pt(p1), pt(p2), pt(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/scene/orbit.rs"]
mod tests;
