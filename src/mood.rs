//! Scene mood driven by the activity scalar.
//! Provides the background palette and paints the sky/ground gradient.
use glam::Vec2;

use crate::render::canvas::{Canvas, Rgb};

/// Fraction of the canvas height where the ground begins.
pub const HORIZON: f32 = 0.7;

const SKY_BARREN: Rgb = Rgb::new(200, 200, 200);
const SKY_LUSH: Rgb = Rgb::new(135, 206, 235);
const GROUND_BARREN: Rgb = Rgb::new(210, 180, 140);
const GROUND_LUSH: Rgb = Rgb::new(34, 139, 34);
/// How much darker the top of the sky is than the horizon.
const ZENITH_SHADE: f32 = 0.25;

/// Background colors for one activity level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodPalette {
    pub sky: Rgb,
    pub zenith: Rgb,
    pub ground: Rgb,
}

impl MoodPalette {
    pub fn for_activity(activity: f32) -> Self {
        let t = smoothstep(0.0, 1.0, activity);
        let sky = SKY_BARREN.lerp(SKY_LUSH, t);
        Self {
            sky,
            zenith: sky.lerp(Rgb::BLACK, ZENITH_SHADE),
            ground: GROUND_BARREN.lerp(GROUND_LUSH, t),
        }
    }

    /// Fill the whole canvas: vertical sky gradient above the horizon, flat ground below.
    pub fn paint(&self, canvas: &mut Canvas) {
        let w = canvas.width() as f32;
        let h = canvas.height() as f32;
        let horizon = h * HORIZON;
        // One band per row keeps this cheap at any canvas size.
        for row in 0..horizon.ceil() as u32 {
            let t = row as f32 / horizon.max(1.0);
            let color = self.zenith.lerp(self.sky, t);
            canvas.fill_rect(
                Vec2::new(0.0, row as f32),
                Vec2::new(w, row as f32 + 1.0),
                color,
                1.0,
            );
        }
        canvas.fill_rect(Vec2::new(0.0, horizon), Vec2::new(w, h), self.ground, 1.0);
    }
}

/// Smooth hermite interpolation.
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_hit_palette_endpoints() {
        let barren = MoodPalette::for_activity(0.0);
        assert_eq!(barren.sky, SKY_BARREN);
        assert_eq!(barren.ground, GROUND_BARREN);

        let lush = MoodPalette::for_activity(1.0);
        assert_eq!(lush.sky, SKY_LUSH);
        assert_eq!(lush.ground, GROUND_LUSH);
    }

    #[test]
    fn out_of_range_activity_is_clamped() {
        assert_eq!(MoodPalette::for_activity(3.0), MoodPalette::for_activity(1.0));
    }

    #[test]
    fn ground_fills_bottom_band() {
        let mut canvas = Canvas::new(10, 10);
        let palette = MoodPalette::for_activity(1.0);
        palette.paint(&mut canvas);
        assert_eq!(canvas.get(5, 9), Some(GROUND_LUSH));
        assert_ne!(canvas.get(5, 0), Some(GROUND_LUSH));
    }
}
