use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;

use crate::activity::ActorId;
use crate::critter::{Body, Bounds, CritterKind, Fate, TickContext};
use crate::ecs::components::{Avatar, Lifecycle, Owner, Position};
use crate::ecs::systems;
use crate::render::canvas::Canvas;
use crate::render::image::ImageData;

/// Ambient spawn rates per unit of activity per second (interactive mode).
const AMBIENT_RATES: [(CritterKind, f32); 3] = [
    (CritterKind::Frog, 0.5),
    (CritterKind::Snake, 0.3),
    (CritterKind::Bird, 0.4),
];
/// Ambient spawning pauses above this population.
const MAX_AMBIENT_POPULATION: u32 = 40;
/// Back-to-front draw order.
const DRAW_ORDER: [CritterKind; 3] = [CritterKind::Frog, CritterKind::Snake, CritterKind::Bird];

/// Owns every live critter and advances them each tick.
pub struct Simulation {
    world: hecs::World,
    owners: HashMap<ActorId, hecs::Entity>,
    bounds: Bounds,
    activity: f32,
    elapsed: f32,
    interactive: bool,
    rng: fastrand::Rng,

    // Reused across ticks
    dead: Vec<hecs::Entity>,
    released: Vec<ActorId>,
}

impl Simulation {
    pub fn new(bounds: Bounds, interactive: bool) -> Self {
        Self::from_rng(bounds, interactive, fastrand::Rng::new())
    }

    /// Deterministic variant for tests and replays.
    pub fn with_seed(bounds: Bounds, interactive: bool, seed: u64) -> Self {
        Self::from_rng(bounds, interactive, fastrand::Rng::with_seed(seed))
    }

    fn from_rng(bounds: Bounds, interactive: bool, rng: fastrand::Rng) -> Self {
        Self {
            world: hecs::World::new(),
            owners: HashMap::new(),
            bounds,
            activity: 1.0,
            elapsed: 0.0,
            interactive,
            rng,
            dead: Vec::new(),
            released: Vec::new(),
        }
    }

    /// Advance every live critter by `delta` seconds and remove the dead.
    pub fn tick(&mut self, delta: f32, activity: f32) {
        self.activity = activity.clamp(0.0, 1.0);
        self.elapsed += delta;
        let ctx = self.context(delta);

        self.released.clear();
        systems::tick(
            &mut self.world,
            &ctx,
            &mut self.rng,
            &mut self.dead,
            &mut self.released,
        );
        for actor in self.released.drain(..) {
            // Only unbind if the mapping still points at a removed critter
            if let Some(&entity) = self.owners.get(&actor) {
                if !self.world.contains(entity) {
                    self.owners.remove(&actor);
                }
            }
        }

        if self.interactive {
            self.spawn_ambient(delta);
        }
    }

    fn spawn_ambient(&mut self, delta: f32) {
        if self.world.len() >= MAX_AMBIENT_POPULATION {
            return;
        }
        for (kind, rate) in AMBIENT_RATES {
            if self.rng.f32() < self.activity * delta * rate {
                self.spawn(kind, None);
            }
        }
    }

    /// Spawn a critter at a random valid position. No-op (`None`) if `actor` already has one.
    pub fn spawn(&mut self, kind: CritterKind, actor: Option<ActorId>) -> Option<hecs::Entity> {
        self.spawn_with(kind, actor, None)
    }

    /// [`Simulation::spawn`] with an avatar painted into the body.
    pub fn spawn_with(
        &mut self,
        kind: CritterKind,
        actor: Option<ActorId>,
        avatar: Option<Arc<ImageData>>,
    ) -> Option<hecs::Entity> {
        if let Some(actor) = actor {
            if self.bound_critter(actor).is_some() {
                return None;
            }
        }

        let body = Body::spawn(kind, self.bounds, &mut self.rng);
        let mut builder = hecs::EntityBuilder::new();
        builder
            .add(Position(body.position()))
            .add(body)
            .add(Lifecycle::ALIVE);
        if let Some(actor) = actor {
            builder.add(Owner(actor));
        }
        if let Some(image) = avatar {
            builder.add(Avatar(image));
        }
        let entity = self.world.spawn(builder.build());
        if let Some(actor) = actor {
            self.owners.insert(actor, entity);
        }
        Some(entity)
    }

    /// Attach, replace or (with `None`) remove a critter's avatar.
    /// False if the critter is gone.
    pub fn set_avatar(&mut self, entity: hecs::Entity, avatar: Option<Arc<ImageData>>) -> bool {
        match avatar {
            Some(image) => self.world.insert_one(entity, Avatar(image)).is_ok(),
            None => match self.world.remove_one::<Avatar>(entity) {
                Ok(_) => true,
                Err(_) => self.world.contains(entity),
            },
        }
    }

    pub fn avatar(&self, entity: hecs::Entity) -> Option<Arc<ImageData>> {
        self.world
            .get::<&Avatar>(entity)
            .ok()
            .map(|a| Arc::clone(&a.0))
    }

    /// Retire a critter: snakes fade out, other kinds are removed next tick.
    pub fn despawn(&mut self, entity: hecs::Entity) -> bool {
        let Ok((body, life)) = self
            .world
            .query_one_mut::<(&mut Body, &mut Lifecycle)>(entity)
        else {
            return false;
        };
        if body.retire() == Fate::Dies {
            life.kill();
        }
        true
    }

    /// Unbind `actor` and retire their critter.
    pub fn release(&mut self, actor: ActorId) -> bool {
        let Some(entity) = self.owners.remove(&actor) else {
            return false;
        };
        match self.world.remove_one::<Owner>(entity) {
            Ok(_) => self.despawn(entity),
            Err(_) => false,
        }
    }

    /// Poke the actor's critter (frogs hop).
    pub fn nudge(&mut self, actor: ActorId) {
        let Some(entity) = self.bound_critter(actor) else {
            return;
        };
        if let Ok(body) = self.world.query_one_mut::<&mut Body>(entity) {
            body.nudge(self.bounds, &mut self.rng);
        }
    }

    /// Clear all critters, reset activity to 1.0 and the clock to zero.
    pub fn reset(&mut self) {
        self.world.clear();
        self.owners.clear();
        self.activity = 1.0;
        self.elapsed = 0.0;
    }

    /// Draw critters back to front, each kind through its own routine.
    pub fn draw(&self, canvas: &mut Canvas) {
        let ctx = self.context(0.0);
        for kind in DRAW_ORDER {
            for (_, (body, avatar)) in self.world.query::<(&Body, Option<&Avatar>)>().iter() {
                if body.kind() == kind {
                    body.draw(canvas, &ctx, avatar.map(|a| &*a.0));
                }
            }
        }
    }

    fn context(&self, dt: f32) -> TickContext {
        TickContext {
            dt,
            activity: self.activity,
            elapsed: self.elapsed,
            bounds: self.bounds,
        }
    }

    /// Critter bound to `actor`, if it still exists.
    pub fn bound_critter(&self, actor: ActorId) -> Option<hecs::Entity> {
        self.owners
            .get(&actor)
            .copied()
            .filter(|&e| self.world.contains(e))
    }

    pub fn contains(&self, entity: hecs::Entity) -> bool {
        self.world.contains(entity)
    }

    pub fn is_alive(&self, entity: hecs::Entity) -> Option<bool> {
        self.world.get::<&Lifecycle>(entity).ok().map(|l| l.alive)
    }

    pub fn kind_of(&self, entity: hecs::Entity) -> Option<CritterKind> {
        self.world.get::<&Body>(entity).ok().map(|b| b.kind())
    }

    pub fn position(&self, entity: hecs::Entity) -> Option<Vec2> {
        self.world.get::<&Position>(entity).ok().map(|p| p.0)
    }

    pub fn entities(&self) -> Vec<hecs::Entity> {
        self.world.iter().map(|e| e.entity()).collect()
    }

    pub fn count(&self, kind: CritterKind) -> usize {
        self.world
            .query::<&Body>()
            .iter()
            .filter(|(_, b)| b.kind() == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.len() == 0
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn activity(&self) -> f32 {
        self.activity
    }

    pub fn set_activity(&mut self, activity: f32) {
        self.activity = activity.clamp(0.0, 1.0);
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn interactive(&self) -> bool {
        self.interactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(seed: u64) -> Simulation {
        Simulation::with_seed(Bounds::new(320.0, 240.0), false, seed)
    }

    #[test]
    fn spawn_is_idempotent_per_actor() {
        let mut sim = sim(1);
        let first = sim.spawn(CritterKind::Frog, Some(9));
        assert!(first.is_some());
        assert_eq!(sim.spawn(CritterKind::Bird, Some(9)), None);
        assert_eq!(sim.len(), 1);
        assert_eq!(sim.bound_critter(9), first);
    }

    #[test]
    fn unowned_spawns_always_succeed() {
        let mut sim = sim(1);
        for kind in CritterKind::ALL {
            assert!(sim.spawn(kind, None).is_some());
        }
        assert_eq!(sim.len(), 3);
    }

    #[test]
    fn dead_before_tick_is_gone_after() {
        for seed in 0..20 {
            let mut sim = sim(seed);
            let mut rng = fastrand::Rng::with_seed(seed);
            for _ in 0..30 {
                sim.spawn(CritterKind::ALL[rng.usize(0..3)], None);
            }
            for _ in 0..200 {
                // Retire a random critter now and then
                let entities = sim.entities();
                if !entities.is_empty() && rng.f32() < 0.3 {
                    sim.despawn(entities[rng.usize(0..entities.len())]);
                }
                let dead: Vec<_> = sim
                    .entities()
                    .into_iter()
                    .filter(|&e| sim.is_alive(e) == Some(false))
                    .collect();
                sim.tick(1.0 / 30.0, 1.0);
                for e in dead {
                    assert!(!sim.contains(e), "dead critter survived a tick");
                }
            }
        }
    }

    #[test]
    fn released_snake_fades_before_removal() {
        let mut sim = sim(3);
        let snake = sim.spawn(CritterKind::Snake, Some(1)).unwrap();
        // Grow to full size first
        sim.tick(0.5, 1.0);
        sim.tick(0.5, 1.0);

        assert!(sim.release(1));
        assert_eq!(sim.bound_critter(1), None);
        sim.tick(0.5, 1.0);
        assert!(sim.contains(snake));
        assert_eq!(sim.is_alive(snake), Some(true));
        sim.tick(0.5, 1.0);
        assert!(!sim.contains(snake));
    }

    #[test]
    fn reset_clears_everything() {
        let mut sim = sim(4);
        sim.spawn(CritterKind::Bird, Some(2));
        sim.tick(0.1, 0.3);
        assert!((sim.activity() - 0.3).abs() < 1e-6);
        sim.reset();
        assert!(sim.is_empty());
        assert_eq!(sim.bound_critter(2), None);
        assert_eq!(sim.activity(), 1.0);
        assert_eq!(sim.elapsed(), 0.0);
    }

    #[test]
    fn interactive_mode_spawns_ambient_critters() {
        let mut sim = Simulation::with_seed(Bounds::new(320.0, 240.0), true, 8);
        for _ in 0..300 {
            sim.tick(1.0 / 30.0, 1.0);
        }
        assert!(!sim.is_empty());
        assert!(sim.len() <= MAX_AMBIENT_POPULATION as usize + AMBIENT_RATES.len());
    }

    #[test]
    fn positions_track_bodies() {
        let mut sim = sim(6);
        let bird = sim.spawn(CritterKind::Bird, None).unwrap();
        let before = sim.position(bird).unwrap();
        sim.tick(0.5, 1.0);
        if sim.contains(bird) {
            assert_ne!(sim.position(bird), Some(before));
        }
    }

    #[test]
    fn draw_paints_critters() {
        let mut sim = sim(7);
        sim.spawn(CritterKind::Frog, None);
        let mut canvas = Canvas::new(320, 240);
        sim.draw(&mut canvas);
        assert!(canvas.pixels().iter().any(|p| *p != crate::render::canvas::Rgb::BLACK));
    }

    #[test]
    fn owned_spawn_carries_owner_and_avatar() {
        let mut sim = sim(9);
        let image = Arc::new(ImageData::from_rgba(1, 1, vec![0, 0, 255, 255]).unwrap());
        let frog = sim
            .spawn_with(CritterKind::Frog, Some(4), Some(Arc::clone(&image)))
            .unwrap();
        assert_eq!(sim.world.get::<&Owner>(frog).map(|o| o.0).ok(), Some(4));
        assert_eq!(sim.avatar(frog), Some(image));

        let stray = sim.spawn(CritterKind::Bird, None).unwrap();
        assert!(sim.world.get::<&Owner>(stray).is_err());
        assert_eq!(sim.avatar(stray), None);
    }

    #[test]
    fn avatar_paints_inside_body() {
        let bounds = Bounds::new(320.0, 240.0);
        let blue = crate::render::canvas::Rgb::new(0, 0, 255);
        let image = Arc::new(ImageData::from_rgba(1, 1, vec![0, 0, 255, 255]).unwrap());
        let mut sim = Simulation::with_seed(bounds, false, 11);
        let bird = sim.spawn(CritterKind::Bird, None).unwrap();
        let at = Vec2::new(160.0, 60.0);
        if let Ok(mut body) = sim.world.get::<&mut Body>(bird) {
            if let Body::Bird(b) = &mut *body {
                b.pos = at;
                b.vel = Vec2::X * 2.0;
            }
        }

        let mut plain = Canvas::new(320, 240);
        sim.draw(&mut plain);
        assert!(sim.set_avatar(bird, Some(image)));
        let mut painted = Canvas::new(320, 240);
        sim.draw(&mut painted);

        // Behind the centre, clear of the eye and beak
        let (x, y) = ((at.x - 3.0) as u32, at.y as u32);
        assert_ne!(plain.get(x, y), Some(blue));
        assert_eq!(painted.get(x, y), Some(blue));

        assert!(sim.set_avatar(bird, None));
        let mut cleared = Canvas::new(320, 240);
        sim.draw(&mut cleared);
        assert_eq!(cleared, plain);
    }

    #[test]
    fn release_of_missing_critter_reports_false() {
        let mut sim = sim(10);
        let frog = sim.spawn(CritterKind::Frog, Some(3)).unwrap();
        assert!(sim.despawn(frog));
        sim.tick(0.0, 1.0);
        // Mapping may already be gone after cleanup; either way nothing is retired
        assert!(!sim.release(3));
        assert!(!sim.set_avatar(frog, None));
    }
}
