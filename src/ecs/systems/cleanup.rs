use crate::activity::ActorId;
use crate::ecs::components::{Lifecycle, Owner};

/// Despawn every dead critter. Owners of removed critters are appended to `released`.
pub fn sweep(world: &mut hecs::World, dead: &mut Vec<hecs::Entity>, released: &mut Vec<ActorId>) {
    dead.clear();
    dead.extend(
        world
            .query::<&Lifecycle>()
            .iter()
            .filter(|(_, life)| !life.alive)
            .map(|(entity, _)| entity),
    );

    for &entity in dead.iter() {
        let owner = world.get::<&Owner>(entity).ok().map(|o| o.0);
        if world.despawn(entity).is_ok() {
            released.extend(owner);
        }
    }
}
