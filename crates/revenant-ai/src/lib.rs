//! # Revenant AI
//!
//! Monster AI core for Project Revenant.
//!
//! This crate provides the per-agent scheduler that drives monsters:
//! - Condition and memory registers (the blackboard)
//! - Enemy memory with a ring of old enemies
//! - Route building, simplification and following
//! - Tasks and the task state machine
//! - Schedules, schedule selection and monster states
//! - Sensing (sight, hearing, smell) and class relationships
//! - Snapshots and tuning files
//!
//! Hosts implement [`world::AiWorld`] and call [`monster::Monster::think`]
//! once per agent per tick.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod activity;
pub mod behavior;
pub mod conditions;
pub mod config;
pub mod enemy;
pub mod monster;
pub mod relationship;
pub mod route;
pub mod schedule;
pub mod senses;
pub mod snapshot;
pub mod standard;
pub mod task;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::activity::*;
    pub use crate::behavior::*;
    pub use crate::conditions::*;
    pub use crate::config::*;
    pub use crate::enemy::*;
    pub use crate::monster::*;
    pub use crate::relationship::*;
    pub use crate::route::*;
    pub use crate::schedule::*;
    pub use crate::senses::*;
    pub use crate::snapshot::*;
    pub use crate::task::*;
    pub use crate::world::*;
}

pub use prelude::*;
