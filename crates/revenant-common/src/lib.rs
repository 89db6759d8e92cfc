//! # Revenant Common
//!
//! Common types, utilities, and shared abstractions for Project Revenant.
//!
//! This crate provides foundational types used across all Revenant crates:
//! - Generation-checked entity handles and the arena that issues them
//! - Coordinate and yaw helpers (Z-up world)
//! - Version information for snapshot schemas
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
