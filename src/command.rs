use crossbeam_channel::Sender;

use crate::activity::{ActorId, Presence};
use crate::render::canvas::Rgb;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Typing,
    Reaction,
}

/// Unvalidated RGBA pixels attached to a reaction or profile.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// How an actor wants to look. Unset fields leave the current look alone.
#[derive(Debug, Clone, Default)]
pub struct ActorProfile {
    /// Painted inside the actor's critter.
    pub avatar: Option<RawImage>,
    /// Speech bubble border.
    pub color: Option<Rgb>,
}

impl ActorProfile {
    pub fn is_empty(&self) -> bool {
        self.avatar.is_none() && self.color.is_none()
    }
}

/// One roster entry of a snapshot.
#[derive(Debug, Clone)]
pub struct KnownActor {
    pub actor: ActorId,
    pub presence: Presence,
    pub profile: ActorProfile,
}

impl KnownActor {
    pub fn new(actor: ActorId, presence: Presence) -> Self {
        Self {
            actor,
            presence,
            profile: ActorProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: ActorProfile) -> Self {
        self.profile = profile;
        self
    }
}

impl From<(ActorId, Presence)> for KnownActor {
    fn from((actor, presence): (ActorId, Presence)) -> Self {
        Self::new(actor, presence)
    }
}

/// Inbound requests, consumed by the render tick in arrival order.
#[derive(Debug, Clone)]
pub enum Command {
    ProcessEvent {
        kind: EventKind,
        actor: ActorId,
        content: String,
        image: Option<RawImage>,
        profile: ActorProfile,
    },
    /// Bulk roster initialization.
    SetSnapshot(Vec<KnownActor>),
    Stop,
}

/// Producer handle. Sending never blocks; the queue is unbounded, so keeping
/// the backlog reasonable is up to the caller.
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    pub(crate) fn new(tx: Sender<Command>) -> Self {
        Self { tx }
    }

    /// False once the render loop has gone away.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn message(&self, actor: ActorId, content: impl Into<String>) -> bool {
        self.send(Command::ProcessEvent {
            kind: EventKind::Message,
            actor,
            content: content.into(),
            image: None,
            profile: ActorProfile::default(),
        })
    }

    /// Message that also updates the speaker's look.
    pub fn message_as(&self, actor: ActorId, content: impl Into<String>, profile: ActorProfile) -> bool {
        self.send(Command::ProcessEvent {
            kind: EventKind::Message,
            actor,
            content: content.into(),
            image: None,
            profile,
        })
    }

    pub fn typing(&self, actor: ActorId) -> bool {
        self.send(Command::ProcessEvent {
            kind: EventKind::Typing,
            actor,
            content: String::new(),
            image: None,
            profile: ActorProfile::default(),
        })
    }

    pub fn reaction(&self, actor: ActorId, image: Option<RawImage>) -> bool {
        self.send(Command::ProcessEvent {
            kind: EventKind::Reaction,
            actor,
            content: String::new(),
            image,
            profile: ActorProfile::default(),
        })
    }

    pub fn set_snapshot(&self, actors: impl IntoIterator<Item = KnownActor>) -> bool {
        self.send(Command::SetSnapshot(actors.into_iter().collect()))
    }

    /// Snapshot of bare presences, no profiles.
    pub fn set_roster(&self, actors: impl IntoIterator<Item = (ActorId, Presence)>) -> bool {
        self.set_snapshot(actors.into_iter().map(KnownActor::from))
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}
