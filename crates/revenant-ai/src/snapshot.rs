//! Save/restore of a single monster.
//!
//! A [`MonsterSnapshot`] holds plain data only: raw bit registers, arrays,
//! handles, and the active schedule by name. It is written as magic bytes,
//! a [`SchemaVersion`] header, then the bincode payload.

use crate::activity::{Activity, MonsterState};
use crate::conditions::{Blackboard, Conditions, Memory};
use crate::enemy::{EnemyTracker, OldEnemy};
use crate::monster::{Monster, MonsterKind};
use crate::route::{MoveGoal, Route, Waypoint, WaypointFlags};
use crate::schedule::ScheduleType;
use crate::task::TaskStatus;
use crate::world::Sound;
use glam::Vec3;
use revenant_common::{AiError, EntityHandle, MagicBytes, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Snapshot encoding failure.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid magic bytes
    #[error("Invalid snapshot format")]
    InvalidFormat,

    /// Written by an incompatible version
    #[error("Incompatible snapshot version: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version of this build
        expected: SchemaVersion,
        /// Version in the data
        found: SchemaVersion,
    },

    /// Payload did not decode
    #[error("Snapshot corrupted: {0}")]
    Corrupted(String),
}

impl From<SnapshotError> for AiError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::Io(io) => Self::Io(io),
            SnapshotError::VersionMismatch { expected, found } => Self::VersionMismatch {
                expected: expected.to_string(),
                actual: found.to_string(),
            },
            other => Self::Snapshot(other.to_string()),
        }
    }
}

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Saved old enemy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OldEnemySnapshot {
    /// Weak reference
    pub handle: EntityHandle,
    /// Last known position
    pub position: [f32; 3],
}

/// Saved waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaypointSnapshot {
    /// Position
    pub position: [f32; 3],
    /// Raw [`WaypointFlags`] bits
    pub flags: u16,
}

/// Everything needed to resume a monster mid-schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterSnapshot {
    // === Body ===
    /// Feet position
    pub position: [f32; 3],
    /// Facing
    pub yaw: f32,
    /// Facing being turned toward
    pub ideal_yaw: f32,
    /// Remaining health
    pub health: f32,

    // === Mind ===
    /// Raw condition bits
    pub conditions: u32,
    /// Raw memory bits
    pub memory: u32,
    /// Raw conditions waiting for the next think
    pub pending: u32,
    /// Current state
    pub state: MonsterState,
    /// State being moved to
    pub ideal_state: MonsterState,
    /// Current enemy
    pub enemy: Option<EntityHandle>,
    /// Its last known position
    pub enemy_position: [f32; 3],
    /// Old enemies, oldest first
    pub old_enemies: Vec<OldEnemySnapshot>,
    /// Scripted target
    pub target: Option<EntityHandle>,
    /// Last heard sound
    pub heard: Option<Sound>,

    // === Animation ===
    /// Activity being played
    pub activity: Activity,
    /// Activity the tasks asked for
    pub ideal_activity: Activity,
    /// Activity used while moving
    pub movement_activity: Activity,
    /// Speed along the route
    pub move_speed: f32,

    // === Route ===
    /// Waypoints, consumed ones included
    pub waypoints: Vec<WaypointSnapshot>,
    /// Current waypoint
    pub route_index: usize,
    /// Movement goal
    pub route_goal: MoveGoal,
    /// Where the route leads
    pub goal_position: [f32; 3],
    /// Entity the route leads to
    pub route_target: Option<EntityHandle>,

    // === Schedule ===
    /// Active schedule by name
    pub schedule: Option<String>,
    /// Active task
    pub schedule_index: usize,
    /// Its status
    pub task_status: TaskStatus,
    /// Fail schedule requested by a task
    pub fail_override: Option<ScheduleType>,
    /// End of the current wait
    pub wait_until: f32,
}

impl MonsterSnapshot {
    /// Serializes to binary format.
    pub fn to_bytes(&self) -> SnapshotResult<Vec<u8>> {
        let mut buffer = Vec::new();

        // Write magic bytes
        buffer.extend_from_slice(&MagicBytes::MONSTER.0);

        bincode::serialize_into(&mut buffer, &SchemaVersion::MONSTER_SNAPSHOT)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        bincode::serialize_into(&mut buffer, self).map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        Ok(buffer)
    }

    /// Deserializes from binary format.
    pub fn from_bytes(bytes: &[u8]) -> SnapshotResult<Self> {
        // Check magic bytes
        if bytes.len() < 4 || bytes[0..4] != MagicBytes::MONSTER.0 {
            return Err(SnapshotError::InvalidFormat);
        }

        let mut reader = &bytes[4..];
        let found: SchemaVersion =
            bincode::deserialize_from(&mut reader).map_err(|e| SnapshotError::Corrupted(e.to_string()))?;
        if !SchemaVersion::MONSTER_SNAPSHOT.can_read(&found) {
            return Err(SnapshotError::VersionMismatch {
                expected: SchemaVersion::MONSTER_SNAPSHOT,
                found,
            });
        }

        bincode::deserialize_from(&mut reader).map_err(|e| SnapshotError::Corrupted(e.to_string()))
    }

    /// Writes the snapshot to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> SnapshotResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes()?)?;
        info!("Saved monster snapshot to {}", path.display());
        Ok(())
    }

    /// Reads a snapshot from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> SnapshotResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let snapshot = Self::from_bytes(&bytes)?;
        info!("Loaded monster snapshot from {}", path.display());
        Ok(snapshot)
    }
}

impl Monster {
    /// Captures the monster's state.
    #[must_use]
    pub fn snapshot(&self) -> MonsterSnapshot {
        MonsterSnapshot {
            position: self.position.to_array(),
            yaw: self.yaw,
            ideal_yaw: self.ideal_yaw,
            health: self.health,

            conditions: self.blackboard.conditions().bits(),
            memory: self.blackboard.memory().bits(),
            pending: self.pending.bits(),
            state: self.state,
            ideal_state: self.ideal_state,
            enemy: self.enemy.current(),
            enemy_position: self.enemy.last_known_position().to_array(),
            old_enemies: self
                .enemy
                .old_enemies()
                .map(|e| OldEnemySnapshot {
                    handle: e.handle,
                    position: e.last_known_position.to_array(),
                })
                .collect(),
            target: self.target,
            heard: self.heard,

            activity: self.activity,
            ideal_activity: self.ideal_activity,
            movement_activity: self.movement_activity,
            move_speed: self.move_speed,

            waypoints: self
                .route
                .waypoints()
                .iter()
                .map(|w| WaypointSnapshot {
                    position: w.position.to_array(),
                    flags: w.flags.bits(),
                })
                .collect(),
            route_index: self.route.index(),
            route_goal: self.route.goal(),
            goal_position: self.route.goal_position().to_array(),
            route_target: self.route.target(),

            schedule: self.current_schedule().map(|s| s.name.clone()),
            schedule_index: self.schedule_index,
            task_status: self.task_status,
            fail_override: self.fail_override,
            wait_until: self.wait_until,
        }
    }

    /// Rebuilds a monster of `kind` from a snapshot.
    ///
    /// If the saved schedule no longer exists the monster comes back with
    /// no schedule and picks one at its next think.
    pub fn restore(handle: EntityHandle, kind: Arc<MonsterKind>, snapshot: &MonsterSnapshot) -> Self {
        let schedule = snapshot.schedule.as_deref().and_then(|name| kind.schedules.by_name(name));
        let (schedule_index, task_status) = if schedule.is_some() {
            (snapshot.schedule_index, snapshot.task_status)
        } else {
            debug!("Monster {handle} restored without a schedule");
            (0, TaskStatus::NotRunning)
        };

        let enemy = EnemyTracker::from_parts(
            snapshot.enemy,
            Vec3::from_array(snapshot.enemy_position),
            snapshot.old_enemies.iter().map(|e| OldEnemy {
                handle: e.handle,
                last_known_position: Vec3::from_array(e.position),
            }),
            kind.tuning.old_enemy_capacity,
        );
        let route = Route::from_parts(
            snapshot
                .waypoints
                .iter()
                .map(|w| Waypoint {
                    position: Vec3::from_array(w.position),
                    flags: WaypointFlags::from_bits_retain(w.flags),
                })
                .collect(),
            snapshot.route_index,
            snapshot.route_goal,
            Vec3::from_array(snapshot.goal_position),
            snapshot.route_target,
        );

        let mut monster = Self::new(handle, kind, Vec3::from_array(snapshot.position));
        monster.yaw = snapshot.yaw;
        monster.ideal_yaw = snapshot.ideal_yaw;
        monster.health = snapshot.health;
        monster.blackboard = Blackboard::from_parts(
            Conditions::from_bits_retain(snapshot.conditions),
            Memory::from_bits_retain(snapshot.memory),
        );
        monster.pending = Conditions::from_bits_retain(snapshot.pending);
        monster.state = snapshot.state;
        monster.ideal_state = snapshot.ideal_state;
        monster.enemy = enemy;
        monster.target = snapshot.target;
        monster.heard = snapshot.heard;
        monster.activity = snapshot.activity;
        monster.ideal_activity = snapshot.ideal_activity;
        monster.movement_activity = snapshot.movement_activity;
        monster.move_speed = snapshot.move_speed;
        monster.route = route;
        monster.schedule = schedule;
        monster.schedule_index = schedule_index;
        monster.task_status = task_status;
        monster.fail_override = snapshot.fail_override;
        monster.wait_until = snapshot.wait_until;
        monster
    }
}
