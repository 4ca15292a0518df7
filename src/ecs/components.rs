use std::sync::Arc;

use glam::Vec2;

use crate::activity::ActorId;
use crate::render::image::ImageData;

/// Last known position, refreshed after every update. Overlays anchor to this.
#[derive(Debug, Clone, Copy)]
pub struct Position(pub Vec2);

/// Only ever goes from alive to dead; dead critters are despawned by cleanup.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    pub alive: bool,
}

impl Lifecycle {
    pub const ALIVE: Lifecycle = Lifecycle { alive: true };

    pub fn kill(&mut self) {
        self.alive = false;
    }
}

/// External actor this critter stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub ActorId);

/// Picture painted inside the body in place of the procedural fill.
#[derive(Debug, Clone)]
pub struct Avatar(pub Arc<ImageData>);
