use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// One opaque canvas pixel. Layout matches the packed RGB the encoder expects.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear blend toward `other`, `t` clamped to [0, 1].
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

/// Fixed-size software raster target. All shapes clip to the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb::BLACK; width as usize * height as usize],
        }
    }

    /// Like [`Canvas::new`] but reports allocation failure instead of aborting.
    pub fn try_new(width: u32, height: u32) -> Option<Self> {
        let len = (width as usize).checked_mul(height as usize)?;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).ok()?;
        pixels.resize(len, Rgb::BLACK);
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Packed RGB bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    /// Overwrite this canvas with another of identical size.
    pub fn copy_from(&mut self, other: &Canvas) {
        self.pixels.copy_from_slice(&other.pixels);
    }

    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    #[inline]
    fn blend(&mut self, x: u32, y: u32, color: Rgb, alpha: f32) {
        let idx = (y * self.width + x) as usize;
        let dst = &mut self.pixels[idx];
        *dst = if alpha >= 1.0 { color } else { dst.lerp(color, alpha) };
    }

    /// Inclusive pixel span covered by [lo, hi] along an axis of length `len`.
    fn span(lo: f32, hi: f32, len: u32) -> Option<(u32, u32)> {
        let lo = lo.floor().max(0.0);
        let hi = hi.ceil().min(len as f32 - 1.0);
        if hi < lo || len == 0 {
            None
        } else {
            Some((lo as u32, hi as u32))
        }
    }

    /// Visit every pixel center in the box [min, max] for which `inside` holds.
    fn shade(&mut self, min: Vec2, max: Vec2, color: Rgb, alpha: f32, inside: impl Fn(Vec2) -> bool) {
        if alpha <= 0.0 {
            return;
        }
        let (Some((x0, x1)), Some((y0, y1))) = (
            Self::span(min.x, max.x, self.width),
            Self::span(min.y, max.y, self.height),
        ) else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                if inside(Vec2::new(x as f32 + 0.5, y as f32 + 0.5)) {
                    self.blend(x, y, color, alpha);
                }
            }
        }
    }

    pub fn fill_rect(&mut self, min: Vec2, max: Vec2, color: Rgb, alpha: f32) {
        self.shade(min, max, color, alpha, |p| {
            p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
        });
    }

    pub fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgb, alpha: f32) {
        if radius <= 0.0 {
            return;
        }
        let r2 = radius * radius;
        self.shade(center - radius, center + radius, color, alpha, |p| {
            p.distance_squared(center) <= r2
        });
    }

    pub fn fill_ellipse(&mut self, center: Vec2, radii: Vec2, color: Rgb, alpha: f32) {
        if radii.x <= 0.0 || radii.y <= 0.0 {
            return;
        }
        self.shade(center - radii, center + radii, color, alpha, |p| {
            let d = (p - center) / radii;
            d.length_squared() <= 1.0
        });
    }

    pub fn fill_triangle(&mut self, tri: [Vec2; 3], color: Rgb, alpha: f32) {
        let [a, b, c] = tri;
        let edge = |p: Vec2, q: Vec2, r: Vec2| (q - p).perp_dot(r - p);
        let area = edge(a, b, c);
        if area.abs() < f32::EPSILON {
            return;
        }
        self.shade(a.min(b).min(c), a.max(b).max(c), color, alpha, |p| {
            let w0 = edge(b, c, p) * area.signum();
            let w1 = edge(c, a, p) * area.signum();
            let w2 = edge(a, b, p) * area.signum();
            w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
        });
    }

    pub fn fill_rounded_rect(&mut self, min: Vec2, max: Vec2, radius: f32, color: Rgb, alpha: f32) {
        let radius = radius.min((max.x - min.x) * 0.5).min((max.y - min.y) * 0.5).max(0.0);
        let inner_min = min + radius;
        let inner_max = max - radius;
        let r2 = radius * radius;
        self.shade(min, max, color, alpha, |p| {
            let nearest = p.clamp(inner_min, inner_max);
            p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
                && p.distance_squared(nearest) <= r2
        });
    }

    /// Blend a single pixel; off-canvas coordinates are ignored.
    pub fn plot(&mut self, x: i32, y: i32, color: Rgb, alpha: f32) {
        if x < 0 || y < 0 || alpha <= 0.0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x < self.width && y < self.height {
            self.blend(x, y, color, alpha.min(1.0));
        }
    }

    /// Nearest-neighbour blit of straight-alpha RGBA pixels, centered on `center`.
    pub fn blit_rgba(
        &mut self,
        rgba: &[u8],
        src_w: u32,
        src_h: u32,
        center: Vec2,
        size: Vec2,
        opacity: f32,
    ) {
        self.blit_masked(rgba, src_w, src_h, center, size, opacity, |_| true);
    }

    /// Like [`Canvas::blit_rgba`] scaled to cover a disc of `radius`, with
    /// everything outside the disc cut away.
    pub fn blit_rgba_disc(
        &mut self,
        rgba: &[u8],
        src_w: u32,
        src_h: u32,
        center: Vec2,
        radius: f32,
        opacity: f32,
    ) {
        let r2 = radius * radius;
        self.blit_masked(rgba, src_w, src_h, center, Vec2::splat(radius * 2.0), opacity, |p| {
            p.distance_squared(center) <= r2
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn blit_masked(
        &mut self,
        rgba: &[u8],
        src_w: u32,
        src_h: u32,
        center: Vec2,
        size: Vec2,
        opacity: f32,
        inside: impl Fn(Vec2) -> bool,
    ) {
        if src_w == 0 || src_h == 0 || size.x < 1.0 || size.y < 1.0 || opacity <= 0.0 {
            return;
        }
        if rgba.len() < src_w as usize * src_h as usize * 4 {
            return;
        }
        let min = center - size * 0.5;
        let max = center + size * 0.5;
        let (Some((x0, x1)), Some((y0, y1))) = (
            Self::span(min.x, max.x - 1.0, self.width),
            Self::span(min.y, max.y - 1.0, self.height),
        ) else {
            return;
        };
        for y in y0..=y1 {
            let v = ((y as f32 + 0.5 - min.y) / size.y).clamp(0.0, 0.999);
            let sy = (v * src_h as f32) as u32;
            for x in x0..=x1 {
                if !inside(Vec2::new(x as f32 + 0.5, y as f32 + 0.5)) {
                    continue;
                }
                let u = ((x as f32 + 0.5 - min.x) / size.x).clamp(0.0, 0.999);
                let sx = (u * src_w as f32) as u32;
                let i = ((sy * src_w + sx) * 4) as usize;
                let px = &rgba[i..i + 4];
                let alpha = px[3] as f32 / 255.0 * opacity;
                if alpha > 0.0 {
                    self.blend(x, y, Rgb::new(px[0], px[1], px[2]), alpha.min(1.0));
                }
            }
        }
    }
}
