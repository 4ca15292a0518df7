use std::collections::VecDeque;

use glam::Vec2;

use super::{random_color, Bounds, Fate, TickContext, REFERENCE_HZ};
use crate::render::canvas::{Canvas, Rgb};
use crate::render::image::ImageData;

/// Head speed in pixels per reference frame.
const SNAKE_SPEED: f32 = 2.0;
/// Default body length in segments.
const SNAKE_LENGTH: usize = 50;
/// Retarget once the head is this close to its target.
const RETARGET_DISTANCE: f32 = 10.0;
/// Seconds to grow in or fade out.
const RAMP_SECONDS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnakeState {
    Inactive,
    Spawning,
    Active,
    Despawning,
}

/// Ground critter chasing random targets; its body trails the head's path.
#[derive(Debug, Clone)]
pub struct Snake {
    /// Head first.
    pub segments: VecDeque<Vec2>,
    pub length: usize,
    pub target: Vec2,
    pub direction: Vec2,
    pub speed: f32,
    /// Draw scale, ramped during spawn and despawn.
    pub scale: f32,
    pub state: SnakeState,
    pub color: Rgb,
}

impl Snake {
    pub fn new(bounds: Bounds, rng: &mut fastrand::Rng) -> Self {
        let head = random_ground_point(bounds, rng);
        let mut segments = VecDeque::with_capacity(SNAKE_LENGTH + 1);
        segments.push_back(head);
        Self {
            segments,
            length: SNAKE_LENGTH,
            target: random_ground_point(bounds, rng),
            direction: Vec2::X,
            speed: SNAKE_SPEED,
            scale: 0.0,
            state: SnakeState::Inactive,
            color: random_color(rng, 100..=255, 100..=255, 100..=255),
        }
    }

    pub fn head(&self) -> Vec2 {
        self.segments.front().copied().unwrap_or(Vec2::ZERO)
    }

    pub fn activate(&mut self) {
        if self.state == SnakeState::Inactive {
            self.state = SnakeState::Spawning;
            self.scale = 0.0;
        }
    }

    /// Begin fading out. An inactive snake has nothing to fade and dies at once.
    pub fn start_despawn(&mut self) -> Fate {
        match self.state {
            SnakeState::Inactive => Fate::Dies,
            _ => {
                self.state = SnakeState::Despawning;
                Fate::Lives
            }
        }
    }

    pub fn update(&mut self, ctx: &TickContext, rng: &mut fastrand::Rng) -> Fate {
        let ramp = ctx.dt / RAMP_SECONDS;
        match self.state {
            SnakeState::Inactive => return Fate::Lives,
            SnakeState::Spawning => {
                self.scale = (self.scale + ramp).min(1.0);
                if self.scale >= 1.0 {
                    self.state = SnakeState::Active;
                }
            }
            SnakeState::Active => {}
            SnakeState::Despawning => {
                self.scale = (self.scale - ramp).max(0.0);
                if self.scale <= 0.0 {
                    return Fate::Dies;
                }
            }
        }

        self.advance(ctx, rng);
        Fate::Lives
    }

    /// Prepend a new head toward the target and drop the tail past `length`.
    fn advance(&mut self, ctx: &TickContext, rng: &mut fastrand::Rng) {
        let head = self.head();
        if head.distance(self.target) < RETARGET_DISTANCE {
            self.target = random_ground_point(ctx.bounds, rng);
        }

        let to_target = self.target - head;
        self.direction = to_target.normalize_or(self.direction);
        let step = (self.speed * ctx.activity * ctx.dt * REFERENCE_HZ).min(to_target.length());
        self.segments.push_front(head + self.direction * step);
        while self.segments.len() > self.length {
            self.segments.pop_back();
        }
    }

    pub fn draw(&self, canvas: &mut Canvas, avatar: Option<&ImageData>) {
        if self.scale <= 0.0 {
            return;
        }
        let n = self.segments.len() as f32;
        // Tail first so the head ends up on top
        for (i, seg) in self.segments.iter().enumerate().rev() {
            let taper = 1.0 - i as f32 / n;
            let radius = (10.0 * taper + 5.0) * self.scale;
            canvas.fill_circle(*seg, radius, self.color, taper.max(0.05));
        }

        let head = self.head();
        if let Some(img) = avatar {
            canvas.blit_rgba_disc(img.rgba(), img.width(), img.height(), head, 12.0 * self.scale, 1.0);
        }
        let eye_offset = self.direction * 8.0 * self.scale;
        for side in [eye_offset.perp(), -eye_offset.perp()] {
            let eye = head + side;
            canvas.fill_circle(eye, 4.0 * self.scale, Rgb::WHITE, 1.0);
            canvas.fill_circle(eye, 2.0 * self.scale, Rgb::BLACK, 1.0);
        }
    }
}

fn random_ground_point(bounds: Bounds, rng: &mut fastrand::Rng) -> Vec2 {
    let top = bounds.horizon();
    Vec2::new(
        rng.f32() * bounds.width,
        top + rng.f32() * (bounds.height - top),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Bounds = Bounds {
        width: 1000.0,
        height: 1000.0,
    };

    fn ctx(dt: f32) -> TickContext {
        TickContext {
            dt,
            activity: 1.0,
            elapsed: 0.0,
            bounds: BOUNDS,
        }
    }

    fn active_snake(rng: &mut fastrand::Rng) -> Snake {
        let mut snake = Snake::new(BOUNDS, rng);
        snake.state = SnakeState::Active;
        snake.scale = 1.0;
        snake
    }

    #[test]
    fn inactive_snake_does_not_move() {
        let mut rng = fastrand::Rng::with_seed(1);
        let mut snake = Snake::new(BOUNDS, &mut rng);
        let head = snake.head();
        snake.update(&ctx(0.1), &mut rng);
        assert_eq!(snake.head(), head);
        assert_eq!(snake.segments.len(), 1);
    }

    #[test]
    fn spawning_ramps_to_active_over_one_second() {
        let mut rng = fastrand::Rng::with_seed(1);
        let mut snake = Snake::new(BOUNDS, &mut rng);
        snake.activate();
        for _ in 0..3 {
            snake.update(&ctx(0.25), &mut rng);
            assert_eq!(snake.state, SnakeState::Spawning);
        }
        snake.update(&ctx(0.25), &mut rng);
        assert_eq!(snake.state, SnakeState::Active);
        assert_eq!(snake.scale, 1.0);
    }

    #[test]
    fn segment_count_caps_at_length() {
        let mut rng = fastrand::Rng::with_seed(2);
        let mut snake = active_snake(&mut rng);
        snake.length = 20;
        // Far-away target so no retargeting and every step moves the head
        snake.segments = VecDeque::from([Vec2::new(0.0, 800.0)]);
        snake.target = Vec2::new(1000.0, 800.0);

        for tick in 1..=snake.length {
            snake.update(&ctx(1.0 / 60.0), &mut rng);
            assert!(snake.segments.len() <= snake.length);
            assert_eq!(snake.segments.len(), (tick + 1).min(snake.length));
        }
        assert_eq!(snake.segments.len(), snake.length);

        for _ in 0..100 {
            snake.update(&ctx(1.0 / 60.0), &mut rng);
            assert!(snake.segments.len() <= snake.length);
        }
    }

    #[test]
    fn retargets_when_close() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut snake = active_snake(&mut rng);
        snake.segments = VecDeque::from([Vec2::new(500.0, 800.0)]);
        snake.target = Vec2::new(505.0, 800.0);
        snake.update(&ctx(1.0 / 60.0), &mut rng);
        assert_ne!(snake.target, Vec2::new(505.0, 800.0));
        assert!(snake.target.y >= BOUNDS.horizon());
    }

    #[test]
    fn despawn_fades_then_dies() {
        let mut rng = fastrand::Rng::with_seed(4);
        let mut snake = active_snake(&mut rng);
        assert_eq!(snake.start_despawn(), Fate::Lives);
        for _ in 0..3 {
            assert_eq!(snake.update(&ctx(0.25), &mut rng), Fate::Lives);
        }
        assert_eq!(snake.update(&ctx(0.25), &mut rng), Fate::Dies);
    }
}
