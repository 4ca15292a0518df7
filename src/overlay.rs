use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use instant::Instant;

use crate::critter::Bounds;
use crate::render::canvas::{Canvas, Rgb};
use crate::render::text::{draw_text, text_width, GLYPH_SIZE};

pub use crate::render::image::ImageData;

/// Default lifetime of every overlay.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);
/// Oldest overlays are dropped beyond this.
const MAX_OVERLAYS: usize = 64;

// Speech bubble layout, in pixels
const LINE_HEIGHT: f32 = GLYPH_SIZE + 3.0;
const BUBBLE_PADDING: f32 = 8.0;
const BUBBLE_MAX_WIDTH: f32 = 200.0;
const BUBBLE_RADIUS: f32 = 8.0;
const BUBBLE_LIFT: f32 = 20.0;
const MAX_LINES: usize = 6;
/// Speech fades out over its final stretch (seconds).
const FADE_SECONDS: f32 = 0.5;
const INK: Rgb = Rgb::new(40, 40, 40);

// Reaction bursts
const BURST_SIZE: f32 = 64.0;
const BURST_SPEED: f32 = 120.0;
const FALLBACK_BURST: Rgb = Rgb::new(255, 140, 200);

/// Characters that fit on one bubble line.
fn max_line_chars() -> usize {
    ((BUBBLE_MAX_WIDTH - 2.0 * BUBBLE_PADDING) / GLYPH_SIZE) as usize
}

/// Text bubble that follows a critter while it exists.
#[derive(Debug, Clone)]
pub struct SpeechBubble {
    /// Weak reference: looked up each tick, never keeps the critter alive.
    pub anchor: Option<hecs::Entity>,
    /// Where the anchor was last seen; used once it is gone.
    pub anchor_pos: Vec2,
    /// Border color; black unless the speaker has one.
    pub tint: Rgb,
    lines: Vec<String>,
    size: Vec2,
    pub pos: Vec2,
}

impl SpeechBubble {
    fn new(anchor: Option<hecs::Entity>, anchor_pos: Vec2, text: &str, tint: Option<Rgb>) -> Self {
        let lines = wrap(text);
        let widest = lines.iter().map(|l| text_width(l)).fold(0.0, f32::max);
        let size = Vec2::new(
            widest + 2.0 * BUBBLE_PADDING,
            lines.len().max(1) as f32 * LINE_HEIGHT + 2.0 * BUBBLE_PADDING,
        );
        Self {
            anchor,
            anchor_pos,
            tint: tint.unwrap_or(Rgb::BLACK),
            lines,
            size,
            pos: anchor_pos,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Top-left corner above the anchor, clamped on screen.
    fn place(&mut self, bounds: Bounds) {
        let x = self.anchor_pos.x - self.size.x * 0.5;
        let y = self.anchor_pos.y - self.size.y - BUBBLE_LIFT;
        self.pos = Vec2::new(
            x.clamp(0.0, (bounds.width - self.size.x).max(0.0)),
            y.clamp(0.0, (bounds.height - self.size.y).max(0.0)),
        );
    }

    fn draw(&self, canvas: &mut Canvas, opacity: f32) {
        let min = self.pos;
        let max = self.pos + self.size;

        // Tail toward the speaker, under the body
        let base = Vec2::new(
            self.anchor_pos.x.clamp(min.x + BUBBLE_RADIUS, max.x - BUBBLE_RADIUS),
            max.y - 1.0,
        );
        canvas.fill_triangle(
            [base - Vec2::X * 6.0, base + Vec2::X * 6.0, self.anchor_pos - Vec2::Y * 8.0],
            Rgb::WHITE,
            0.8 * opacity,
        );

        canvas.fill_rounded_rect(min, max, BUBBLE_RADIUS, self.tint, opacity);
        canvas.fill_rounded_rect(min + 2.0, max - 2.0, BUBBLE_RADIUS - 2.0, Rgb::WHITE, 0.9 * opacity);

        for (row, line) in self.lines.iter().enumerate() {
            let origin = Vec2::new(
                min.x + BUBBLE_PADDING,
                min.y + BUBBLE_PADDING + row as f32 * LINE_HEIGHT + 1.0,
            );
            draw_text(canvas, origin, line, INK, opacity);
        }
    }
}

/// Greedy word wrap to the bubble width. Words too long for a line are split.
fn wrap(text: &str) -> Vec<String> {
    let max_chars = max_line_chars();
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    let pieces = text.split_whitespace().flat_map(|word| {
        let chars: Vec<char> = word.chars().collect();
        chars
            .chunks(max_chars)
            .map(|c| c.iter().collect::<String>())
            .collect::<Vec<_>>()
    });
    for piece in pieces {
        let len = piece.chars().count();
        let needed = if current.is_empty() { len } else { current_len + 1 + len };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
            if lines.len() == MAX_LINES {
                return lines;
            }
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(&piece);
        current_len += len;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Reaction image bouncing around the canvas, shrinking and fading to nothing.
#[derive(Debug, Clone)]
pub struct Burst {
    /// `None` draws the built-in fallback.
    pub image: Option<Arc<ImageData>>,
    pub pos: Vec2,
    pub vel: Vec2,
    pub base_size: f32,
}

impl Burst {
    fn update(&mut self, dt: f32, bounds: Bounds, half: f32) {
        self.pos += self.vel * dt;
        if self.pos.x < half {
            self.pos.x = half;
            self.vel.x = self.vel.x.abs();
        }
        if self.pos.x > bounds.width - half {
            self.pos.x = (bounds.width - half).max(half);
            self.vel.x = -self.vel.x.abs();
        }
        if self.pos.y < half {
            self.pos.y = half;
            self.vel.y = self.vel.y.abs();
        }
        if self.pos.y > bounds.height - half {
            self.pos.y = (bounds.height - half).max(half);
            self.vel.y = -self.vel.y.abs();
        }
    }

    fn draw(&self, canvas: &mut Canvas, remaining: f32) {
        let size = self.base_size * remaining;
        if size < 1.0 {
            return;
        }
        match &self.image {
            Some(img) => {
                canvas.blit_rgba(
                    img.rgba(),
                    img.width(),
                    img.height(),
                    self.pos,
                    Vec2::new(size, size * img.aspect()),
                    remaining,
                );
            }
            None => {
                let r = size * 0.5;
                canvas.fill_circle(self.pos, r, FALLBACK_BURST, remaining);
                canvas.fill_circle(self.pos, r * 0.45, Rgb::WHITE, remaining);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum OverlayKind {
    Speech(SpeechBubble),
    Burst(Burst),
}

#[derive(Debug, Clone)]
pub struct OverlayItem {
    pub kind: OverlayKind,
    pub created: Instant,
    pub ttl: Duration,
    /// Wall-clock age as of the last tick.
    age: Duration,
}

impl OverlayItem {
    pub fn is_expired(&self) -> bool {
        self.age >= self.ttl
    }

    /// Fraction of the lifetime still ahead as of the last tick, 1.0 at birth.
    pub fn remaining(&self) -> f32 {
        (1.0 - self.age.as_secs_f32() / self.ttl.as_secs_f32()).clamp(0.0, 1.0)
    }

    fn seconds_left(&self) -> f32 {
        self.ttl.saturating_sub(self.age).as_secs_f32()
    }
}

/// Short-lived annotations drawn over the scene.
pub struct OverlayLayer {
    items: Vec<OverlayItem>,
    bounds: Bounds,
    rng: fastrand::Rng,
}

impl OverlayLayer {
    pub fn new(bounds: Bounds) -> Self {
        Self::from_rng(bounds, fastrand::Rng::new())
    }

    pub fn with_seed(bounds: Bounds, seed: u64) -> Self {
        Self::from_rng(bounds, fastrand::Rng::with_seed(seed))
    }

    fn from_rng(bounds: Bounds, rng: fastrand::Rng) -> Self {
        Self {
            items: Vec::with_capacity(MAX_OVERLAYS),
            bounds,
            rng,
        }
    }

    fn push(&mut self, kind: OverlayKind, ttl: Duration, now: Instant) {
        if self.items.len() >= MAX_OVERLAYS {
            self.items.remove(0);
        }
        self.items.push(OverlayItem {
            kind,
            created: now,
            ttl: ttl.max(Duration::from_millis(1)),
            age: Duration::ZERO,
        });
    }

    /// Speech bubble above `anchor`; `anchor_pos` is its current position.
    /// `tint` colors the border.
    pub fn add_speech(
        &mut self,
        anchor: Option<hecs::Entity>,
        anchor_pos: Vec2,
        text: &str,
        tint: Option<Rgb>,
        ttl: Duration,
        now: Instant,
    ) {
        let mut bubble = SpeechBubble::new(anchor, anchor_pos, text, tint);
        bubble.place(self.bounds);
        self.push(OverlayKind::Speech(bubble), ttl, now);
    }

    /// Reaction burst at a random spot. `None` uses the fallback visual.
    pub fn add_burst(&mut self, image: Option<ImageData>, ttl: Duration, now: Instant) {
        let half = BURST_SIZE * 0.5;
        let span = |len: f32, rng: &mut fastrand::Rng| {
            if len > BURST_SIZE {
                half + rng.f32() * (len - BURST_SIZE)
            } else {
                len * 0.5
            }
        };
        let pos = Vec2::new(
            span(self.bounds.width, &mut self.rng),
            span(self.bounds.height, &mut self.rng),
        );
        let vel = Vec2::from_angle(self.rng.f32() * std::f32::consts::TAU) * BURST_SPEED;
        let burst = Burst {
            image: image.map(Arc::new),
            pos,
            vel,
            base_size: BURST_SIZE,
        };
        self.push(OverlayKind::Burst(burst), ttl, now);
    }

    /// Age against `now`, move by `delta` seconds and evict the expired.
    /// `anchor_of` resolves a critter to its current position.
    pub fn tick(
        &mut self,
        now: Instant,
        delta: f32,
        anchor_of: impl Fn(hecs::Entity) -> Option<Vec2>,
    ) {
        let bounds = self.bounds;
        for item in &mut self.items {
            item.age = now.saturating_duration_since(item.created);
            let remaining = item.remaining();
            match &mut item.kind {
                OverlayKind::Speech(bubble) => {
                    if let Some(pos) = bubble.anchor.and_then(&anchor_of) {
                        bubble.anchor_pos = pos;
                    } else {
                        // Anchor gone: stay where it was last seen
                        bubble.anchor = None;
                    }
                    bubble.place(bounds);
                }
                OverlayKind::Burst(burst) => {
                    let half = burst.base_size * remaining * 0.5;
                    burst.update(delta, bounds, half);
                }
            }
        }
        self.items.retain(|item| !item.is_expired());
    }

    pub fn draw(&self, canvas: &mut Canvas) {
        for item in &self.items {
            let remaining = item.remaining();
            match &item.kind {
                OverlayKind::Speech(bubble) => {
                    let opacity = (item.seconds_left() / FADE_SECONDS).clamp(0.0, 1.0);
                    bubble.draw(canvas, opacity);
                }
                OverlayKind::Burst(burst) => burst.draw(canvas, remaining),
            }
        }
    }

    pub fn items(&self) -> &[OverlayItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
