pub mod behavior;
pub mod cleanup;

use crate::activity::ActorId;
use crate::critter::TickContext;

/// Run all simulation systems for one fixed tick.
/// Returns actors whose critters were removed this tick in `released`.
pub fn tick(
    world: &mut hecs::World,
    ctx: &TickContext,
    rng: &mut fastrand::Rng,
    dead: &mut Vec<hecs::Entity>,
    released: &mut Vec<ActorId>,
) {
    // 1. Per-kind state machines
    behavior::update(world, ctx, rng);

    // 2. Remove everything dead, including critters retired before this tick
    cleanup::sweep(world, dead, released);
}
