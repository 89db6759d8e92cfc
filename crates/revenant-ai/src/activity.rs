//! Activities and coarse monster states.

use serde::{Deserialize, Serialize};

/// Animation/behavior pose a monster is in or wants to be in.
///
/// The animation collaborator maps an activity onto a concrete sequence;
/// the core only ever names activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Activity {
    /// No activity selected yet
    #[default]
    Reset,
    /// Standing still
    Idle,
    /// Guarding/looking around
    Guard,
    /// Walking
    Walk,
    /// Running
    Run,
    /// Flying
    Fly,
    /// Swimming
    Swim,
    /// Hovering in place (flying kinds at rest)
    Hover,
    /// Turning left in place
    TurnLeft,
    /// Turning right in place
    TurnRight,
    /// Idle while alert and armed
    CombatIdle,
    /// Waking up angry on first sight of an enemy
    Wakeup,
    /// Primary ranged attack
    RangeAttack1,
    /// Secondary ranged attack
    RangeAttack2,
    /// Primary melee attack
    MeleeAttack1,
    /// Secondary melee attack
    MeleeAttack2,
    /// Short pain reaction
    SmallFlinch,
    /// Long pain reaction
    BigFlinch,
    /// Celebrating a kill
    VictoryDance,
    /// Sniffing/inspecting
    Inspect,
    /// Dying
    Die,
}

impl Activity {
    /// Checks if this activity moves the monster along its route.
    #[must_use]
    pub const fn is_movement(self) -> bool {
        matches!(self, Self::Walk | Self::Run | Self::Fly | Self::Swim)
    }

    /// Checks if this activity is an attack.
    #[must_use]
    pub const fn is_attack(self) -> bool {
        matches!(
            self,
            Self::RangeAttack1 | Self::RangeAttack2 | Self::MeleeAttack1 | Self::MeleeAttack2
        )
    }
}

/// Coarse behavioral mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MonsterState {
    /// Not yet initialised
    #[default]
    None,
    /// Nothing of interest around
    Idle,
    /// Has an enemy and is fighting it
    Combat,
    /// Something happened; on guard
    Alert,
    /// Searching for a lost enemy
    Hunt,
    /// Held helpless (grabbed, stunned)
    Prone,
    /// Under scripted control
    Script,
    /// Faking death
    PlayDead,
    /// Dead
    Dead,
}

impl MonsterState {
    /// Checks if the monster is alive in this state.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        !matches!(self, Self::Dead)
    }

    /// Checks if the scheduler decides transitions out of this state.
    ///
    /// Script and prone are entered and left by outside control.
    #[must_use]
    pub const fn is_self_directed(self) -> bool {
        !matches!(self, Self::Script | Self::Prone | Self::Dead)
    }
}

/// How a monster kind gets around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locomotion {
    /// Walks on the ground
    #[default]
    Ground,
    /// Flies freely
    Flying,
    /// Swims in water
    Swimming,
}

impl Locomotion {
    /// Checks if waypoint arrival is measured in full 3D.
    #[must_use]
    pub const fn moves_in_3d(self) -> bool {
        matches!(self, Self::Flying | Self::Swimming)
    }

    /// Activity played while moving at walking pace.
    #[must_use]
    pub const fn walk_activity(self) -> Activity {
        match self {
            Self::Ground => Activity::Walk,
            Self::Flying => Activity::Fly,
            Self::Swimming => Activity::Swim,
        }
    }

    /// Activity played while moving at full pace.
    #[must_use]
    pub const fn run_activity(self) -> Activity {
        match self {
            Self::Ground => Activity::Run,
            Self::Flying => Activity::Fly,
            Self::Swimming => Activity::Swim,
        }
    }
}
