use glam::Vec2;

use super::{random_color, Bounds, Fate, TickContext};
use crate::render::canvas::{Canvas, Rgb};
use crate::render::image::ImageData;

/// Per-second despawn rate while alive.
const FROG_MORTALITY: f32 = 0.01;
/// Keep frogs this far inside the ground band.
const GROUND_MARGIN: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrogState {
    Rest,
    Jump,
}

/// Ground critter alternating between resting and arcing hops.
#[derive(Debug, Clone)]
pub struct Frog {
    pub pos: Vec2,
    pub state: FrogState,
    /// Seconds spent in the current state.
    pub state_time: f32,
    pub rest_duration: f32,
    pub jump_duration: f32,
    pub jump_height: f32,
    pub jump_start: Vec2,
    pub jump_target_x: f32,
    pub size: f32,
    pub color: Rgb,
    /// Despawn probability per second.
    pub mortality: f32,
}

impl Frog {
    pub fn new(bounds: Bounds, rng: &mut fastrand::Rng) -> Self {
        let top = (bounds.horizon() + GROUND_MARGIN).min(bounds.height);
        let bottom = (bounds.height - GROUND_MARGIN).max(top);
        let pos = Vec2::new(rng.f32() * bounds.width, top + rng.f32() * (bottom - top));
        Self {
            pos,
            state: FrogState::Rest,
            state_time: 0.0,
            rest_duration: 1.0 + rng.f32() * 2.0,
            jump_duration: 0.5 + rng.f32() * 0.5,
            jump_height: 50.0 + rng.f32() * 50.0,
            jump_start: pos,
            jump_target_x: pos.x,
            size: 20.0 + rng.f32() * 10.0,
            color: random_color(rng, 50..=100, 150..=200, 50..=100),
            mortality: FROG_MORTALITY,
        }
    }

    pub fn update(&mut self, ctx: &TickContext, rng: &mut fastrand::Rng) -> Fate {
        self.state_time += ctx.dt;

        match self.state {
            FrogState::Rest => {
                if self.state_time >= self.rest_duration {
                    self.start_jump(ctx.bounds, rng);
                }
            }
            FrogState::Jump => {
                if self.state_time >= self.jump_duration {
                    self.land();
                } else {
                    let t = self.state_time / self.jump_duration;
                    self.pos.x = self.jump_start.x + (self.jump_target_x - self.jump_start.x) * t;
                    self.pos.y =
                        self.jump_start.y - self.jump_height * (std::f32::consts::PI * t).sin();
                }
            }
        }

        if rng.f32() < self.mortality * ctx.dt {
            Fate::Dies
        } else {
            Fate::Lives
        }
    }

    /// Leave the ground toward a random horizontal target inside the canvas.
    pub fn start_jump(&mut self, bounds: Bounds, rng: &mut fastrand::Rng) {
        self.state = FrogState::Jump;
        self.state_time = 0.0;
        self.jump_start = self.pos;
        let reach = 50.0 + rng.f32() * 100.0;
        let offset = (rng.f32() * 2.0 - 1.0) * reach;
        self.jump_target_x = (self.pos.x + offset).clamp(0.0, bounds.width);
        self.jump_height = 50.0 + rng.f32() * 50.0;
    }

    fn land(&mut self) {
        self.state = FrogState::Rest;
        self.state_time = 0.0;
        self.pos = Vec2::new(self.jump_target_x, self.jump_start.y);
    }

    pub fn draw(&self, canvas: &mut Canvas, bounds: Bounds, avatar: Option<&ImageData>) {
        // Nearer the bottom reads as closer to the viewer
        let depth = 0.5 + (self.pos.y / bounds.height).clamp(0.0, 1.0) * 0.5;
        let s = self.size * depth;
        let p = self.pos;

        canvas.fill_ellipse(p, Vec2::new(s * 0.5, s * 0.4), self.color, 1.0);
        if let Some(img) = avatar {
            canvas.blit_rgba_disc(img.rgba(), img.width(), img.height(), p, s * 0.34, 1.0);
        }

        let eye_r = s * 0.16;
        for dx in [-s * 0.25, s * 0.25] {
            let eye = p + Vec2::new(dx, -s * 0.3);
            canvas.fill_circle(eye, eye_r, Rgb::WHITE, 1.0);
            canvas.fill_circle(eye, eye_r * 0.5, Rgb::BLACK, 1.0);
        }

        // Smile: short row of dots along a lower arc
        let mouth = Rgb::new(50, 50, 50);
        for i in 0..=6 {
            let a = std::f32::consts::PI * (i as f32 / 6.0);
            let dot = p + Vec2::new(-a.cos() * s * 0.22, a.sin() * s * 0.12 + s * 0.05);
            canvas.fill_circle(dot, (s * 0.04).max(0.8), mouth, 1.0);
        }
    }
}
