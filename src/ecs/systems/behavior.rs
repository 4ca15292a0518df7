use crate::critter::{Body, Fate, TickContext};
use crate::ecs::components::{Lifecycle, Position};

/// Advance every live critter through its kind's update rule.
pub fn update(world: &mut hecs::World, ctx: &TickContext, rng: &mut fastrand::Rng) {
    for (_, (body, life, pos)) in world.query_mut::<(&mut Body, &mut Lifecycle, &mut Position)>() {
        if !life.alive {
            continue;
        }
        if body.update(ctx, rng) == Fate::Dies {
            life.kill();
        }
        pos.0 = body.position();
    }
}
