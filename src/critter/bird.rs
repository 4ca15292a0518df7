use glam::Vec2;

use super::{random_color, Bounds, Fate, TickContext, REFERENCE_HZ};
use crate::render::canvas::{Canvas, Rgb};
use crate::render::image::ImageData;

/// Cruise speed in pixels per reference frame.
const BIRD_SPEED: f32 = 2.0;
/// Birds stay in the upper part of the sky.
const FLIGHT_CEILING: f32 = 0.6;
/// Expected random turns per second.
const TURN_CHANCE: f32 = 1.2;
/// Largest single random turn (radians).
const MAX_TURN: f32 = std::f32::consts::FRAC_PI_4;
/// Per-tick probability of a natural end of life.
const BIRD_MORTALITY: f32 = 0.0002;
/// Peak wing deflection (radians).
const WING_SWING: f32 = std::f32::consts::FRAC_PI_4;

const BEAK: Rgb = Rgb::new(255, 200, 0);

/// Free-flying critter that bounces off the edges of its flight band.
#[derive(Debug, Clone)]
pub struct Bird {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    pub color: Rgb,
    pub wing_speed: f32,
    pub wing_angle: f32,
    /// Expected turns per second.
    pub turn_chance: f32,
    /// Per-tick death probability.
    pub mortality: f32,
}

impl Bird {
    pub fn new(bounds: Bounds, rng: &mut fastrand::Rng) -> Self {
        let angle = rng.f32() * std::f32::consts::TAU;
        Self {
            pos: Vec2::new(
                rng.f32() * bounds.width,
                rng.f32() * bounds.height * FLIGHT_CEILING,
            ),
            vel: Vec2::from_angle(angle) * BIRD_SPEED,
            size: 8.0 + rng.f32() * 6.0,
            color: random_color(rng, 200..=255, 100..=200, 100..=200),
            wing_speed: 10.0 + rng.f32() * 5.0,
            wing_angle: 0.0,
            turn_chance: TURN_CHANCE,
            mortality: BIRD_MORTALITY,
        }
    }

    pub fn update(&mut self, ctx: &TickContext, rng: &mut fastrand::Rng) -> Fate {
        self.pos += self.vel * ctx.activity * ctx.dt * REFERENCE_HZ;
        self.reflect(ctx.bounds);

        if rng.f32() < self.turn_chance * ctx.dt {
            let turn = (rng.f32() * 2.0 - 1.0) * MAX_TURN;
            self.vel = Vec2::from_angle(turn).rotate(self.vel);
        }

        self.wing_angle = (ctx.elapsed * self.wing_speed).sin() * WING_SWING;

        if rng.f32() < self.mortality {
            Fate::Dies
        } else {
            Fate::Lives
        }
    }

    /// Mirror position and velocity back inside x in [0, width], y in [0, 0.6 height].
    fn reflect(&mut self, bounds: Bounds) {
        let max = Vec2::new(bounds.width, bounds.height * FLIGHT_CEILING);
        for axis in 0..2 {
            if self.pos[axis] < 0.0 {
                self.pos[axis] = -self.pos[axis];
                self.vel[axis] = self.vel[axis].abs();
            } else if self.pos[axis] > max[axis] {
                self.pos[axis] = 2.0 * max[axis] - self.pos[axis];
                self.vel[axis] = -self.vel[axis].abs();
            }
        }
        self.pos = self.pos.clamp(Vec2::ZERO, max);
    }

    pub fn draw(&self, canvas: &mut Canvas, avatar: Option<&ImageData>) {
        let heading = self.vel.normalize_or(Vec2::X);
        let s = self.size;

        // Wings first so the body covers their roots
        let left = self.pos + Vec2::from_angle(self.wing_angle).rotate(Vec2::new(-s * 1.6, 0.0));
        let right = self.pos + Vec2::from_angle(-self.wing_angle).rotate(Vec2::new(s * 1.6, 0.0));
        let wing_color = self.color.lerp(Rgb::BLACK, 0.15);
        canvas.fill_triangle([self.pos, left, self.pos - heading * s * 0.4], wing_color, 1.0);
        canvas.fill_triangle([self.pos, right, self.pos - heading * s * 0.4], wing_color, 1.0);

        canvas.fill_circle(self.pos, s, self.color, 1.0);
        if let Some(img) = avatar {
            canvas.blit_rgba_disc(img.rgba(), img.width(), img.height(), self.pos, s * 0.85, 1.0);
        }

        let eye = self.pos + heading * s * 0.5;
        canvas.fill_circle(eye, s * 0.2, Rgb::WHITE, 1.0);
        canvas.fill_circle(eye, s * 0.1, Rgb::BLACK, 1.0);

        let tip = self.pos + heading * s * 1.4;
        let side = heading.perp() * s * 0.15;
        let base = self.pos + heading * s;
        canvas.fill_triangle([base + side, base - side, tip], BEAK, 1.0);
    }
}
