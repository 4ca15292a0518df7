use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use instant::Instant;

use crate::critter::CritterKind;
use crate::render::canvas::Rgb;
use crate::render::image::ImageData;
use crate::simulation::Simulation;

/// External actor identifier (chat user id).
pub type ActorId = u64;

/// Actors silent this long lose their critter.
pub const INACTIVITY_WINDOW: Duration = Duration::from_secs(60);
/// Messages older than this drop out of the recent window.
pub const MESSAGE_RETENTION: Duration = Duration::from_secs(60 * 60);
/// Hard cap on retained messages regardless of age.
const MAX_MESSAGES: usize = 1000;
/// Tracked actor count at which the scene reaches full activity.
const ACTIVITY_SATURATION: f32 = 8.0;
/// Activity floor so an empty scene still moves a little.
const ACTIVITY_FLOOR: f32 = 0.2;

/// Reported status of an actor; selects which critter represents them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Idle,
    DoNotDisturb,
    Offline,
}

impl Presence {
    /// `None` for actors that should not be on screen.
    pub fn critter_kind(self) -> Option<CritterKind> {
        match self {
            Presence::Online => Some(CritterKind::Frog),
            Presence::Idle => Some(CritterKind::Snake),
            Presence::DoNotDisturb => Some(CritterKind::Bird),
            Presence::Offline => None,
        }
    }
}

/// Validated per-actor styling. Survives critter respawns, not sweeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorLook {
    pub avatar: Option<Arc<ImageData>>,
    pub color: Option<Rgb>,
}

#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub last_seen: Instant,
    pub critter: hecs::Entity,
    pub look: ActorLook,
}

/// Maps actors to their bound critter and drives presence-based spawn/despawn.
/// Lives on the tick thread; never shared.
pub struct ActivityTracker {
    records: HashMap<ActorId, ActivityRecord>,
    window: Duration,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::with_window(INACTIVITY_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            records: HashMap::new(),
            window,
        }
    }

    /// Record activity, spawning a critter if the actor has none (or theirs died).
    pub fn note_activity(
        &mut self,
        sim: &mut Simulation,
        actor: ActorId,
        presence: Presence,
        now: Instant,
    ) -> Option<hecs::Entity> {
        let look = match self.records.get_mut(&actor) {
            Some(record) if sim.contains(record.critter) => {
                record.last_seen = now;
                return Some(record.critter);
            }
            // Critter died; the replacement keeps the actor's look
            Some(record) => std::mem::take(&mut record.look),
            None => ActorLook::default(),
        };

        let kind = presence.critter_kind().unwrap_or(CritterKind::Frog);
        let critter = sim
            .spawn_with(kind, Some(actor), look.avatar.clone())
            .or_else(|| sim.bound_critter(actor))?;
        log::debug!("actor {actor} bound to {} {critter:?}", kind.label());
        self.records.insert(
            actor,
            ActivityRecord {
                last_seen: now,
                critter,
                look,
            },
        );
        Some(critter)
    }

    /// Merge `look` into the actor's styling and repaint their critter.
    /// Fields left `None` keep their previous value. False for unknown actors.
    pub fn set_look(&mut self, sim: &mut Simulation, actor: ActorId, look: ActorLook) -> bool {
        let Some(record) = self.records.get_mut(&actor) else {
            return false;
        };
        if let Some(avatar) = look.avatar {
            sim.set_avatar(record.critter, Some(Arc::clone(&avatar)));
            record.look.avatar = Some(avatar);
        }
        if let Some(color) = look.color {
            record.look.color = Some(color);
        }
        true
    }

    /// Bubble color for `actor`, if they picked one.
    pub fn color_of(&self, actor: ActorId) -> Option<Rgb> {
        self.records.get(&actor).and_then(|r| r.look.color)
    }

    /// Drop every actor silent for at least the inactivity window and retire their critters.
    pub fn sweep(&mut self, sim: &mut Simulation, now: Instant) -> usize {
        let window = self.window;
        let before = self.records.len();
        self.records.retain(|&actor, record| {
            let idle = now.saturating_duration_since(record.last_seen);
            if idle >= window {
                sim.release(actor);
                log::debug!("actor {actor} inactive for {:.0}s, despawned", idle.as_secs_f32());
                false
            } else {
                true
            }
        });
        before - self.records.len()
    }

    /// Batch-spawn an initial roster. Offline actors are skipped.
    pub fn set_known_actors(
        &mut self,
        sim: &mut Simulation,
        actors: &[(ActorId, Presence)],
        now: Instant,
    ) -> usize {
        let mut spawned = 0;
        for &(actor, presence) in actors {
            if presence.critter_kind().is_none() {
                continue;
            }
            if self.note_activity(sim, actor, presence, now).is_some() {
                spawned += 1;
            }
        }
        spawned
    }

    pub fn record(&self, actor: ActorId) -> Option<&ActivityRecord> {
        self.records.get(&actor)
    }

    pub fn contains(&self, actor: ActorId) -> bool {
        self.records.contains_key(&actor)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Activity level implied by how many actors are around.
    pub fn activity_target(&self) -> f32 {
        let busy = (self.records.len() as f32 / ACTIVITY_SATURATION).min(1.0);
        ACTIVITY_FLOOR + (1.0 - ACTIVITY_FLOOR) * busy
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded window of recent message text, read by downstream decoration.
pub struct MessageLog {
    entries: VecDeque<(Instant, String)>,
    retention: Duration,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(64),
            retention: MESSAGE_RETENTION,
        }
    }

    pub fn push(&mut self, now: Instant, content: &str) {
        self.evict(now);
        if self.entries.len() >= MAX_MESSAGES {
            self.entries.pop_front();
        }
        self.entries.push_back((now, content.to_owned()));
    }

    /// Drop entries older than the retention window.
    pub fn evict(&mut self, now: Instant) {
        while let Some((at, _)) = self.entries.front() {
            if now.saturating_duration_since(*at) > self.retention {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, text)| text.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critter::Bounds;

    fn sim() -> Simulation {
        Simulation::with_seed(Bounds::new(400.0, 300.0), false, 42)
    }

    #[test]
    fn first_activity_spawns_once() {
        let mut sim = sim();
        let mut tracker = ActivityTracker::new();
        let t0 = Instant::now();
        let a = tracker.note_activity(&mut sim, 1, Presence::Online, t0);
        let b = tracker.note_activity(&mut sim, 1, Presence::Online, t0 + Duration::from_secs(1));
        assert_eq!(a, b);
        assert_eq!(sim.len(), 1);
        assert_eq!(tracker.record(1).map(|r| r.last_seen), Some(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn sweep_respects_inactivity_window() {
        let mut sim = sim();
        let mut tracker = ActivityTracker::new();
        let t0 = Instant::now();
        let critter = tracker.note_activity(&mut sim, 7, Presence::Online, t0).unwrap();

        assert_eq!(tracker.sweep(&mut sim, t0 + Duration::from_secs(59)), 0);
        assert!(tracker.contains(7));

        assert_eq!(tracker.sweep(&mut sim, t0 + Duration::from_secs(60)), 1);
        assert!(!tracker.contains(7));
        assert_eq!(sim.bound_critter(7), None);

        // Frog is marked dead and disappears on the following tick
        sim.tick(0.0, 1.0);
        assert!(!sim.contains(critter));
    }

    #[test]
    fn snapshot_skips_offline_and_maps_presence() {
        let mut sim = sim();
        let mut tracker = ActivityTracker::new();
        let roster = [
            (1, Presence::Online),
            (2, Presence::Idle),
            (3, Presence::DoNotDisturb),
            (4, Presence::Offline),
        ];
        assert_eq!(tracker.set_known_actors(&mut sim, &roster, Instant::now()), 3);
        assert_eq!(tracker.len(), 3);
        assert!(!tracker.contains(4));

        let kind = |actor| sim.kind_of(sim.bound_critter(actor).unwrap());
        assert_eq!(kind(1), Some(CritterKind::Frog));
        assert_eq!(kind(2), Some(CritterKind::Snake));
        assert_eq!(kind(3), Some(CritterKind::Bird));
    }

    #[test]
    fn dead_critter_is_replaced_on_next_activity() {
        let mut sim = sim();
        let mut tracker = ActivityTracker::new();
        let t0 = Instant::now();
        let first = tracker.note_activity(&mut sim, 5, Presence::Online, t0).unwrap();
        sim.release(5);
        sim.tick(0.0, 1.0);
        let second = tracker.note_activity(&mut sim, 5, Presence::Online, t0).unwrap();
        assert_ne!(first, second);
        assert!(sim.contains(second));
    }

    #[test]
    fn activity_target_saturates() {
        let mut sim = sim();
        let mut tracker = ActivityTracker::new();
        assert!((tracker.activity_target() - ACTIVITY_FLOOR).abs() < 1e-6);
        let now = Instant::now();
        for actor in 0..20 {
            tracker.note_activity(&mut sim, actor, Presence::Online, now);
        }
        assert!((tracker.activity_target() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn message_log_evicts_old_entries() {
        let mut log = MessageLog::new();
        let t0 = Instant::now();
        log.push(t0, "first");
        log.push(t0 + Duration::from_secs(30 * 60), "second");
        log.push(t0 + Duration::from_secs(61 * 60), "third");
        assert_eq!(log.iter().collect::<Vec<_>>(), vec!["second", "third"]);
    }

    #[test]
    fn message_log_is_bounded() {
        let mut log = MessageLog::new();
        let now = Instant::now();
        for i in 0..(MAX_MESSAGES + 10) {
            log.push(now, &i.to_string());
        }
        assert_eq!(log.len(), MAX_MESSAGES);
        assert_eq!(log.iter().next(), Some("10"));
    }

    #[test]
    fn look_survives_respawn() {
        let mut sim = sim();
        let mut tracker = ActivityTracker::new();
        let t0 = Instant::now();
        let avatar = Arc::new(ImageData::from_rgba(1, 1, vec![1, 2, 3, 255]).unwrap());
        assert!(!tracker.set_look(&mut sim, 8, ActorLook::default()));

        let first = tracker.note_activity(&mut sim, 8, Presence::Online, t0).unwrap();
        let look = ActorLook {
            avatar: Some(Arc::clone(&avatar)),
            color: Some(Rgb::new(9, 9, 9)),
        };
        assert!(tracker.set_look(&mut sim, 8, look));
        assert_eq!(sim.avatar(first), Some(Arc::clone(&avatar)));

        // A color-only update keeps the avatar
        let recolor = ActorLook {
            avatar: None,
            color: Some(Rgb::new(1, 1, 1)),
        };
        tracker.set_look(&mut sim, 8, recolor);
        assert_eq!(tracker.color_of(8), Some(Rgb::new(1, 1, 1)));

        sim.despawn(first);
        sim.tick(0.0, 1.0);
        let second = tracker.note_activity(&mut sim, 8, Presence::Online, t0).unwrap();
        assert_ne!(first, second);
        assert_eq!(sim.avatar(second), Some(avatar));
        assert_eq!(tracker.color_of(8), Some(Rgb::new(1, 1, 1)));
    }
}
