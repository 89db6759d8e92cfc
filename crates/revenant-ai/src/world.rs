//! World services the AI core queries but never owns.
//!
//! The host passes an [`AiWorld`] into every think. Everything the legacy
//! code reached through the engine function table (entity lookups, traces,
//! the node graph, animation state) goes through this trait instead.

use crate::activity::Locomotion;
use crate::relationship::EntityClass;
use crate::route::WaypointFlags;
use bitflags::bitflags;
use glam::Vec3;
use revenant_common::{EntityArena, EntityHandle};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the AI may know about another entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    /// Relationship class
    pub class: EntityClass,
    /// Feet position
    pub position: Vec3,
    /// Eye height above `position`
    pub view_height: f32,
    /// Facing direction (unit length)
    pub forward: Vec3,
    /// Whether the entity is alive
    pub alive: bool,
    /// Whether the entity is a player
    pub is_client: bool,
}

impl EntityInfo {
    /// Creates a live, non-player entity facing `+x`.
    #[must_use]
    pub fn new(class: EntityClass, position: Vec3) -> Self {
        Self {
            class,
            position,
            view_height: 1.5,
            forward: Vec3::X,
            alive: true,
            is_client: false,
        }
    }

    /// Creates a player entity.
    #[must_use]
    pub fn player(position: Vec3) -> Self {
        Self {
            is_client: true,
            ..Self::new(EntityClass::Player, position)
        }
    }

    /// Sets the facing direction.
    #[must_use]
    pub fn facing(mut self, forward: Vec3) -> Self {
        self.forward = forward.normalize_or_zero();
        self
    }

    /// Eye position.
    #[must_use]
    pub fn eye(&self) -> Vec3 {
        self.position + Vec3::Z * self.view_height
    }
}

bitflags! {
    /// Sound categories; schedules declare which ones interrupt them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SoundKind: u16 {
        /// Gunfire, explosions
        const COMBAT  = 1 << 0;
        /// Doors, machinery
        const WORLD   = 1 << 1;
        /// Footsteps and noises made by players
        const PLAYER  = 1 << 2;
        /// Something about to blow up
        const DANGER  = 1 << 3;
        /// A fresh corpse
        const CARCASS = 1 << 4;
        /// Meat lying around
        const MEAT    = 1 << 5;
        /// Garbage
        const GARBAGE = 1 << 6;
    }
}

/// A sound emitted in the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sound {
    /// Category
    pub kind: SoundKind,
    /// Where it came from
    pub position: Vec3,
    /// Audible radius
    pub volume: f32,
}

impl Sound {
    /// Creates a sound.
    #[must_use]
    pub const fn new(kind: SoundKind, position: Vec3, volume: f32) -> Self {
        Self {
            kind,
            position,
            volume,
        }
    }
}

/// A path request handed to the pathfinding collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRequest {
    /// Start position
    pub from: Vec3,
    /// Goal position
    pub to: Vec3,
    /// Locomotion of the requester
    pub locomotion: Locomotion,
    /// Movement flags of the route being built
    pub flags: WaypointFlags,
    /// Entity at the goal, excluded from obstruction checks
    pub target: Option<EntityHandle>,
}

/// Pathfinding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// No connection between start and goal
    #[error("no path between start and goal")]
    Unreachable,
    /// Start or goal lies outside the navigable area
    #[error("position outside navigable area")]
    OffMesh,
}

/// Outcome of a local move check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalMove {
    /// The straight move is clear
    Valid,
    /// Something is in the way after `fraction` of the move
    Blocked {
        /// Portion of the move that is clear, `0.0..1.0`
        fraction: f32,
    },
}

impl LocalMove {
    /// Checks if the move is clear.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// World interface for the AI core.
pub trait AiWorld {
    /// Simulation clock in seconds.
    fn time(&self) -> f32;

    /// Resolves a handle; `None` once the entity is gone.
    fn resolve(&self, handle: EntityHandle) -> Option<EntityInfo>;

    /// Entities within `radius` of `origin`, sensing candidates.
    fn entities_near(&self, origin: Vec3, radius: f32) -> Vec<EntityHandle>;

    /// Sounds audible at `origin` within `radius`.
    fn sounds_near(&self, _origin: Vec3, _radius: f32) -> Vec<Sound> {
        Vec::new()
    }

    /// Finds a path; the result excludes `from` and ends at the goal.
    fn find_path(&self, request: &PathRequest) -> Result<Vec<Vec3>, PathError>;

    /// Checks whether a straight move is clear.
    fn check_local_move(&self, from: Vec3, to: Vec3, target: Option<EntityHandle>) -> LocalMove;

    /// Checks whether the segment between two points is unobstructed.
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool;

    /// Checks whether the agent's current animation sequence has ended.
    fn sequence_finished(&self, agent: EntityHandle) -> bool;
}

/// Mock world for testing and prototyping hosts.
#[derive(Debug)]
pub struct MockWorld {
    time: f32,
    entities: EntityArena<EntityInfo>,
    path: Option<Vec<Vec3>>,
    unreachable: bool,
    blockers: Vec<(Vec3, f32)>,
    los_always_true: bool,
    sequences_finish: bool,
    sounds: Vec<Sound>,
}

impl Default for MockWorld {
    fn default() -> Self {
        Self {
            time: 0.0,
            entities: EntityArena::new(),
            path: None,
            unreachable: false,
            blockers: Vec::new(),
            los_always_true: true,
            sequences_finish: true,
            sounds: Vec::new(),
        }
    }
}

impl MockWorld {
    /// Creates a new mock world with open sight lines and straight paths.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether LOS always returns true.
    #[must_use]
    pub fn with_los(mut self, los: bool) -> Self {
        self.los_always_true = los;
        self
    }

    /// Sets whether animation sequences report as finished.
    pub fn set_sequences_finish(&mut self, finished: bool) {
        self.sequences_finish = finished;
    }

    /// Adds an entity.
    pub fn spawn(&mut self, info: EntityInfo) -> EntityHandle {
        self.entities.insert(info)
    }

    /// Removes an entity, invalidating its handles.
    pub fn despawn(&mut self, handle: EntityHandle) -> Option<EntityInfo> {
        self.entities.remove(handle)
    }

    /// Gets mutable access to an entity.
    pub fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut EntityInfo> {
        self.entities.get_mut(handle)
    }

    /// Kills an entity without removing it.
    pub fn kill(&mut self, handle: EntityHandle) {
        if let Some(info) = self.entities.get_mut(handle) {
            info.alive = false;
        }
    }

    /// Makes every path request return `waypoints`.
    pub fn set_path(&mut self, waypoints: Vec<Vec3>) {
        self.path = Some(waypoints);
        self.unreachable = false;
    }

    /// Reverts to straight-line paths.
    pub fn clear_path(&mut self) {
        self.path = None;
        self.unreachable = false;
    }

    /// Makes every path request fail.
    pub fn set_unreachable(&mut self) {
        self.unreachable = true;
    }

    /// Adds a spherical obstacle that blocks local moves.
    pub fn add_blocker(&mut self, center: Vec3, radius: f32) {
        self.blockers.push((center, radius));
    }

    /// Emits a sound audible until cleared.
    pub fn add_sound(&mut self, sound: Sound) {
        self.sounds.push(sound);
    }

    /// Removes all sounds.
    pub fn clear_sounds(&mut self) {
        self.sounds.clear();
    }

    /// Advances the clock.
    pub fn advance(&mut self, dt: f32) {
        self.time += dt;
    }

    fn segment_blocked(&self, from: Vec3, to: Vec3) -> Option<f32> {
        let seg = to - from;
        let len_sq = seg.length_squared();
        self.blockers
            .iter()
            .filter_map(|&(center, radius)| {
                let t = if len_sq > 0.0 {
                    ((center - from).dot(seg) / len_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let closest = from + seg * t;
                (closest.distance(center) < radius).then_some(t)
            })
            .min_by(f32::total_cmp)
    }
}

impl AiWorld for MockWorld {
    fn time(&self) -> f32 {
        self.time
    }

    fn resolve(&self, handle: EntityHandle) -> Option<EntityInfo> {
        self.entities.get(handle).copied()
    }

    fn entities_near(&self, origin: Vec3, radius: f32) -> Vec<EntityHandle> {
        self.entities
            .iter()
            .filter(|(_, info)| info.position.distance(origin) <= radius)
            .map(|(handle, _)| handle)
            .collect()
    }

    fn sounds_near(&self, origin: Vec3, radius: f32) -> Vec<Sound> {
        self.sounds
            .iter()
            .filter(|s| s.position.distance(origin) <= radius.max(s.volume))
            .copied()
            .collect()
    }

    fn find_path(&self, request: &PathRequest) -> Result<Vec<Vec3>, PathError> {
        if self.unreachable {
            return Err(PathError::Unreachable);
        }
        Ok(self.path.clone().unwrap_or_else(|| vec![request.to]))
    }

    fn check_local_move(&self, from: Vec3, to: Vec3, _target: Option<EntityHandle>) -> LocalMove {
        match self.segment_blocked(from, to) {
            Some(fraction) => LocalMove::Blocked { fraction },
            None => LocalMove::Valid,
        }
    }

    fn line_of_sight(&self, _from: Vec3, _to: Vec3) -> bool {
        self.los_always_true
    }

    fn sequence_finished(&self, _agent: EntityHandle) -> bool {
        self.sequences_finish
    }
}
