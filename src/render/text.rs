use font8x8::{UnicodeFonts, BASIC_FONTS};
use glam::Vec2;

use super::canvas::{Canvas, Rgb};

/// Glyph cell edge in pixels. Every glyph advances by exactly this much.
pub const GLYPH_SIZE: f32 = 8.0;

/// Stand-in for characters outside the basic Latin set.
const FALLBACK: char = '?';

/// Rows of the 8x8 bitmap for `ch`; bit 0 is the leftmost column.
fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| BASIC_FONTS.get(FALLBACK))
        .unwrap_or([0; 8])
}

/// Width of `text` set on one line.
pub fn text_width(text: &str) -> f32 {
    text.chars().count() as f32 * GLYPH_SIZE
}

/// Draw one line of text with its top-left corner at `origin`.
pub fn draw_text(canvas: &mut Canvas, origin: Vec2, text: &str, color: Rgb, alpha: f32) {
    let x0 = origin.x.round() as i32;
    let y0 = origin.y.round() as i32;
    for (i, ch) in text.chars().enumerate() {
        if ch == ' ' {
            continue;
        }
        let left = x0 + i as i32 * GLYPH_SIZE as i32;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..8 {
                if bits & (1 << col) != 0 {
                    canvas.plot(left + col, y0 + row as i32, color, alpha);
                }
            }
        }
    }
}
