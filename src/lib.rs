//! Level scripting and enemy behaviour for a 2D arcade shooter.
//!
//! A level is a plain-text script interpreted frame by frame by
//! [`LevelProgram`].  It calls back into a [`LevelHost`] to spawn enemies,
//! each carrying an [`ActorTrajectory`] to position it and a pattern channel
//! announcing which [`pattern::RuntimePattern`] it should fire with.

pub mod channel;
pub mod compute;
pub mod config;
pub mod entities;
pub mod error;
pub mod host;
pub mod pattern;
pub mod scheduler;
pub mod script;
pub mod trajectory;

pub use channel::{PatternChannel, SharedChannel};
pub use config::EngineConfig;
pub use error::{Result, ScriptError};
pub use host::{EnemySpawn, LevelHost};
pub use scheduler::PeriodicAction;
pub use script::LevelProgram;
pub use trajectory::{ActorTrajectory, Side};
