pub mod bird;
pub mod frog;
pub mod snake;

use glam::Vec2;

use crate::render::canvas::{Canvas, Rgb};
use crate::render::image::ImageData;

pub use bird::Bird;
pub use frog::{Frog, FrogState};
pub use snake::{Snake, SnakeState};

/// Movement reference rate: per-kind speeds are expressed in pixels per 1/60 s.
pub const REFERENCE_HZ: f32 = 60.0;

/// Canvas extents critters live inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Top of the ground band.
    pub fn horizon(&self) -> f32 {
        self.height * crate::mood::HORIZON
    }
}

/// Per-tick inputs shared by every critter update.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub dt: f32,
    pub activity: f32,
    /// Simulation clock, seconds since the last reset.
    pub elapsed: f32,
    pub bounds: Bounds,
}

/// Outcome of one update step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Lives,
    Dies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CritterKind {
    Bird,
    Frog,
    Snake,
}

impl CritterKind {
    pub const ALL: [CritterKind; 3] = [CritterKind::Bird, CritterKind::Frog, CritterKind::Snake];

    pub fn label(self) -> &'static str {
        match self {
            CritterKind::Bird => "bird",
            CritterKind::Frog => "frog",
            CritterKind::Snake => "snake",
        }
    }
}

/// Closed set of critter bodies. Every per-kind rule is reached through the
/// match arms below; adding a kind means adding an arm to each.
#[derive(Debug, Clone)]
pub enum Body {
    Bird(Bird),
    Frog(Frog),
    Snake(Snake),
}

impl Body {
    /// Build a fresh critter of `kind` at a random valid position, already activated.
    pub fn spawn(kind: CritterKind, bounds: Bounds, rng: &mut fastrand::Rng) -> Self {
        match kind {
            CritterKind::Bird => Body::Bird(Bird::new(bounds, rng)),
            CritterKind::Frog => Body::Frog(Frog::new(bounds, rng)),
            CritterKind::Snake => {
                let mut snake = Snake::new(bounds, rng);
                snake.activate();
                Body::Snake(snake)
            }
        }
    }

    pub fn kind(&self) -> CritterKind {
        match self {
            Body::Bird(_) => CritterKind::Bird,
            Body::Frog(_) => CritterKind::Frog,
            Body::Snake(_) => CritterKind::Snake,
        }
    }

    /// Anchor point for overlays (snake: its head).
    pub fn position(&self) -> Vec2 {
        match self {
            Body::Bird(b) => b.pos,
            Body::Frog(f) => f.pos,
            Body::Snake(s) => s.head(),
        }
    }

    pub fn update(&mut self, ctx: &TickContext, rng: &mut fastrand::Rng) -> Fate {
        match self {
            Body::Bird(b) => b.update(ctx, rng),
            Body::Frog(f) => f.update(ctx, rng),
            Body::Snake(s) => s.update(ctx, rng),
        }
    }

    /// Draw through the kind's own routine. An avatar replaces the middle
    /// of the body; eyes and outline stay procedural.
    pub fn draw(&self, canvas: &mut Canvas, ctx: &TickContext, avatar: Option<&ImageData>) {
        match self {
            Body::Bird(b) => b.draw(canvas, avatar),
            Body::Frog(f) => f.draw(canvas, ctx.bounds, avatar),
            Body::Snake(s) => s.draw(canvas, avatar),
        }
    }

    /// Ask the critter to leave. Snakes fade out over their despawn ramp;
    /// everything else is gone at the next cleanup.
    pub fn retire(&mut self) -> Fate {
        match self {
            Body::Snake(s) => s.start_despawn(),
            Body::Bird(_) | Body::Frog(_) => Fate::Dies,
        }
    }

    /// React to a nudge from the bound actor (typing). Only resting frogs respond.
    pub fn nudge(&mut self, bounds: Bounds, rng: &mut fastrand::Rng) {
        if let Body::Frog(f) = self {
            if f.state == FrogState::Rest {
                f.start_jump(bounds, rng);
            }
        }
    }
}

/// Random color with each channel drawn from the given inclusive range.
pub(crate) fn random_color(
    rng: &mut fastrand::Rng,
    r: std::ops::RangeInclusive<u8>,
    g: std::ops::RangeInclusive<u8>,
    b: std::ops::RangeInclusive<u8>,
) -> Rgb {
    Rgb::new(rng.u8(r), rng.u8(g), rng.u8(b))
}
