//! Headless critter terrarium.
//!
//! A fixed-timestep simulation turns chat activity into frogs, snakes and
//! birds, composites each tick onto a software canvas, captures the last few
//! seconds into a frame ring and encodes them into looping GIF previews on a
//! separate worker.

pub mod activity;
pub mod capture;
pub mod command;
pub mod config;
pub mod critter;
pub mod ecs;
pub mod encode;
pub mod error;
pub mod host;
pub mod mood;
pub mod overlay;
pub mod render;
pub mod simulation;
pub mod stats;

pub use activity::{ActorId, Presence};
pub use command::{ActorProfile, Command, CommandSender, EventKind, KnownActor, RawImage};
pub use config::RenderConfig;
pub use encode::EncodedOutput;
pub use error::{ConfigError, EncodeError, HostError, ImageError};
pub use host::{HostState, RenderHost};
pub use render::canvas::Rgb;
