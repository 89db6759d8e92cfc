//! Enemy memory: the current enemy, its last known position, and a small
//! ring of enemies the monster fought before.

use crate::world::AiWorld;
use glam::Vec3;
use revenant_common::EntityHandle;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

/// Default number of remembered old enemies.
pub const DEFAULT_OLD_ENEMY_CAPACITY: usize = 4;

/// Remembered former enemy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OldEnemy {
    /// Weak reference; may dangle
    pub handle: EntityHandle,
    /// Where it was last seen
    pub last_known_position: Vec3,
}

/// Result of re-validating the current enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyStatus {
    /// Still a valid target
    Usable,
    /// Became the target this think
    NewlyAcquired,
    /// Gone, dead or no longer hostile; the caller should move on
    Drop,
}

/// Current enemy plus a bounded FIFO of previous ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyTracker {
    current: Option<EntityHandle>,
    last_known_position: Vec3,
    old: VecDeque<OldEnemy>,
    capacity: usize,
}

impl Default for EnemyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_OLD_ENEMY_CAPACITY)
    }
}

impl EnemyTracker {
    /// Creates an empty tracker remembering up to `capacity` old enemies.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            current: None,
            last_known_position: Vec3::ZERO,
            old: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuilds a tracker from stored parts. Extra entries beyond
    /// `capacity` are dropped oldest first.
    #[must_use]
    pub fn from_parts(
        current: Option<EntityHandle>,
        last_known_position: Vec3,
        old: impl IntoIterator<Item = OldEnemy>,
        capacity: usize,
    ) -> Self {
        let mut tracker = Self::new(capacity);
        tracker.current = current;
        tracker.last_known_position = last_known_position;
        for entry in old {
            tracker.remember_old(entry);
        }
        tracker
    }

    /// The current enemy, if any.
    #[must_use]
    pub const fn current(&self) -> Option<EntityHandle> {
        self.current
    }

    /// Checks if there is a current enemy.
    #[must_use]
    pub const fn has_enemy(&self) -> bool {
        self.current.is_some()
    }

    /// Last known position of the current enemy.
    #[must_use]
    pub const fn last_known_position(&self) -> Vec3 {
        self.last_known_position
    }

    /// Refreshes the last known position.
    pub fn set_last_known_position(&mut self, position: Vec3) {
        self.last_known_position = position;
    }

    /// Ring capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Old enemies, oldest first.
    pub fn old_enemies(&self) -> impl Iterator<Item = &OldEnemy> + '_ {
        self.old.iter()
    }

    /// Old enemy at `index`, counted from the oldest.
    #[must_use]
    pub fn old_enemy(&self, index: usize) -> Option<&OldEnemy> {
        self.old.get(index)
    }

    /// Number of remembered old enemies.
    #[must_use]
    pub fn old_len(&self) -> usize {
        self.old.len()
    }

    /// Makes `candidate` the current enemy.
    ///
    /// The previous enemy moves into the ring. Returns `true` if the
    /// current enemy changed.
    pub fn push_enemy(&mut self, candidate: EntityHandle, last_known_position: Vec3) -> bool {
        if self.current == Some(candidate) {
            self.last_known_position = last_known_position;
            return false;
        }

        self.old.retain(|e| e.handle != candidate);
        if let Some(previous) = self.current.take() {
            self.remember_old(OldEnemy {
                handle: previous,
                last_known_position: self.last_known_position,
            });
        }

        trace!("Enemy {} acquired", candidate);
        self.current = Some(candidate);
        self.last_known_position = last_known_position;
        true
    }

    /// Clears the current enemy and restores the most recent live old one.
    ///
    /// Dangling or dead entries met on the way are discarded.
    pub fn pop_enemy(&mut self, world: &dyn AiWorld) -> bool {
        self.current = None;

        while let Some(entry) = self.old.pop_back() {
            if world.resolve(entry.handle).is_some_and(|info| info.alive) {
                trace!("Enemy {} restored from memory", entry.handle);
                self.current = Some(entry.handle);
                self.last_known_position = entry.last_known_position;
                return true;
            }
        }
        false
    }

    /// Forgets the current enemy without touching the ring.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Drops every ring entry that no longer resolves.
    pub fn compact(&mut self, world: &dyn AiWorld) {
        self.old.retain(|e| world.resolve(e.handle).is_some());
    }

    fn remember_old(&mut self, entry: OldEnemy) {
        if self.old.len() == self.capacity {
            self.old.pop_front();
        }
        self.old.push_back(entry);
    }
}
