//! Condition and memory bit registers.
//!
//! Conditions are transient facts sensed this think; memories are facts the
//! monster carries until it explicitly forgets them. Every other component
//! reads and writes these two registers.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Facts observed during the current think.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Conditions: u32 {
        /// Weapon needs reloading
        const NO_AMMO_LOADED    = 1 << 0;
        /// Sees an entity it hates
        const SEE_HATE          = 1 << 1;
        /// Sees an entity it fears
        const SEE_FEAR          = 1 << 2;
        /// Sees an entity it dislikes
        const SEE_DISLIKE       = 1 << 3;
        /// Current enemy is in sight
        const SEE_ENEMY         = 1 << 4;
        /// Current enemy is tracked but not visible
        const ENEMY_OCCLUDED    = 1 << 5;
        /// Food is in reach
        const SMELL_FOOD        = 1 << 6;
        /// Current enemy is beyond the pursuit distance
        const ENEMY_TOO_FAR     = 1 << 7;
        /// Took light damage since the last think
        const LIGHT_DAMAGE      = 1 << 8;
        /// Took heavy damage since the last think
        const HEAVY_DAMAGE      = 1 << 9;
        /// Primary ranged attack would connect
        const CAN_RANGE_ATTACK1 = 1 << 10;
        /// Primary melee attack would connect
        const CAN_MELEE_ATTACK1 = 1 << 11;
        /// Secondary ranged attack would connect
        const CAN_RANGE_ATTACK2 = 1 << 12;
        /// Secondary melee attack would connect
        const CAN_MELEE_ATTACK2 = 1 << 13;
        /// The last route request failed
        const NO_ROUTE          = 1 << 14;
        /// Was attacked by something it did not hate
        const PROVOKED          = 1 << 15;
        /// Current enemy changed this think
        const NEW_ENEMY         = 1 << 16;
        /// Heard a sound the active schedule listens for
        const HEAR_SOUND        = 1 << 17;
        /// Smells something
        const SMELL             = 1 << 18;
        /// Current enemy is looking at this monster
        const ENEMY_FACING_ME   = 1 << 19;
        /// Current enemy died
        const ENEMY_DEAD        = 1 << 20;
        /// Sees a player
        const SEE_CLIENT        = 1 << 21;
        /// Sees an entity it holds as a nemesis
        const SEE_NEMESIS       = 1 << 22;
        /// Current enemy no longer resolves
        const ENEMY_LOST        = 1 << 23;
        /// Kind-specific condition
        const SPECIAL1          = 1 << 28;
        /// Kind-specific condition
        const SPECIAL2          = 1 << 29;
        /// The active task failed
        const TASK_FAILED       = 1 << 30;
        /// The active schedule ran out of tasks
        const SCHEDULE_DONE     = 1 << 31;

        /// Bits the scheduler writes itself. They survive the per-think
        /// sensing reset and are cleared when a new schedule starts.
        const SCHEDULER_OWNED = Self::TASK_FAILED.bits()
            | Self::SCHEDULE_DONE.bits()
            | Self::NO_ROUTE.bits();

        /// Any damage.
        const DAMAGE = Self::LIGHT_DAMAGE.bits() | Self::HEAVY_DAMAGE.bits();

        /// Any attack that would connect now.
        const CAN_ATTACK = Self::CAN_RANGE_ATTACK1.bits()
            | Self::CAN_MELEE_ATTACK1.bits()
            | Self::CAN_RANGE_ATTACK2.bits()
            | Self::CAN_MELEE_ATTACK2.bits();

        /// Sees anything worth reacting to.
        const SEE_HOSTILE = Self::SEE_HATE.bits()
            | Self::SEE_DISLIKE.bits()
            | Self::SEE_NEMESIS.bits()
            | Self::SEE_FEAR.bits();
    }
}

bitflags! {
    /// Facts remembered across thinks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Memory: u32 {
        /// Was provoked and stays hostile toward the provoker
        const PROVOKED      = 1 << 0;
        /// Reached cover
        const IN_COVER      = 1 << 1;
        /// Heard or saw something it could not place
        const SUSPICIOUS    = 1 << 2;
        /// Finished walking a path
        const PATH_FINISHED = 1 << 3;
        /// Currently walking a path
        const ON_PATH       = 1 << 4;
        /// A movement attempt was blocked
        const MOVE_FAILED   = 1 << 5;
        /// Played a flinch recently
        const FLINCHED      = 1 << 6;
        /// Killed its last enemy
        const KILLED        = 1 << 7;
        /// Kind-specific memory
        const CUSTOM1       = 1 << 28;
        /// Kind-specific memory
        const CUSTOM2       = 1 << 29;
        /// Kind-specific memory
        const CUSTOM3       = 1 << 30;
        /// Kind-specific memory
        const CUSTOM4       = 1 << 31;
    }
}

/// The condition and memory registers of one monster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Blackboard {
    conditions: Conditions,
    memory: Memory,
}

impl Blackboard {
    /// Creates an empty blackboard.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conditions: Conditions::empty(),
            memory: Memory::empty(),
        }
    }

    /// Rebuilds from raw registers (snapshot restore).
    #[must_use]
    pub const fn from_parts(conditions: Conditions, memory: Memory) -> Self {
        Self { conditions, memory }
    }

    /// Current condition register.
    #[must_use]
    pub const fn conditions(&self) -> Conditions {
        self.conditions
    }

    /// Current memory register.
    #[must_use]
    pub const fn memory(&self) -> Memory {
        self.memory
    }

    /// Drops every transient condition ahead of sensing.
    pub fn begin_think(&mut self) {
        self.conditions &= Conditions::SCHEDULER_OWNED;
    }

    /// ORs `mask` into the condition register.
    pub fn set_conditions(&mut self, mask: Conditions) {
        self.conditions |= mask;
    }

    /// Clears `mask` from the condition register.
    pub fn clear_conditions(&mut self, mask: Conditions) {
        self.conditions &= !mask;
    }

    /// True if any bit of `mask` is set.
    #[must_use]
    pub const fn has_conditions(&self, mask: Conditions) -> bool {
        self.conditions.intersects(mask)
    }

    /// True if every bit of `mask` is set.
    #[must_use]
    pub const fn has_all_conditions(&self, mask: Conditions) -> bool {
        self.conditions.contains(mask)
    }

    /// ORs `mask` into memory.
    pub fn remember(&mut self, mask: Memory) {
        self.memory |= mask;
    }

    /// Clears `mask` from memory.
    pub fn forget(&mut self, mask: Memory) {
        self.memory &= !mask;
    }

    /// True if any bit of `mask` is remembered.
    #[must_use]
    pub const fn has_memory(&self, mask: Memory) -> bool {
        self.memory.intersects(mask)
    }

    /// True if every bit of `mask` is remembered.
    #[must_use]
    pub const fn has_all_memories(&self, mask: Memory) -> bool {
        self.memory.contains(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_set_and_clear() {
        let mut bb = Blackboard::new();
        bb.set_conditions(Conditions::SEE_ENEMY | Conditions::HEAR_SOUND);
        assert!(bb.has_conditions(Conditions::SEE_ENEMY));
        assert!(bb.has_all_conditions(Conditions::SEE_ENEMY | Conditions::HEAR_SOUND));
        assert!(!bb.has_all_conditions(Conditions::SEE_ENEMY | Conditions::NEW_ENEMY));

        bb.clear_conditions(Conditions::SEE_ENEMY);
        assert!(!bb.has_conditions(Conditions::SEE_ENEMY));
        assert!(bb.has_conditions(Conditions::HEAR_SOUND));
    }

    #[test]
    fn test_has_conditions_is_any_bit() {
        let mut bb = Blackboard::new();
        bb.set_conditions(Conditions::LIGHT_DAMAGE);
        assert!(bb.has_conditions(Conditions::DAMAGE));
        assert!(!bb.has_all_conditions(Conditions::DAMAGE));
    }

    #[test]
    fn test_empty_mask() {
        let bb = Blackboard::new();
        assert!(!bb.has_conditions(Conditions::empty()));
        assert!(bb.has_all_conditions(Conditions::empty()));
    }

    #[test]
    fn test_begin_think_keeps_scheduler_bits() {
        let mut bb = Blackboard::new();
        bb.set_conditions(Conditions::SEE_ENEMY | Conditions::TASK_FAILED | Conditions::NO_ROUTE);
        bb.remember(Memory::PROVOKED);
        bb.begin_think();

        assert!(!bb.has_conditions(Conditions::SEE_ENEMY));
        assert!(bb.has_all_conditions(Conditions::TASK_FAILED | Conditions::NO_ROUTE));
        assert!(bb.has_memory(Memory::PROVOKED));
    }

    #[test]
    fn test_memory() {
        let mut bb = Blackboard::new();
        bb.remember(Memory::SUSPICIOUS | Memory::IN_COVER);
        assert!(bb.has_all_memories(Memory::SUSPICIOUS | Memory::IN_COVER));
        bb.forget(Memory::IN_COVER);
        assert!(bb.has_memory(Memory::SUSPICIOUS | Memory::IN_COVER));
        assert!(!bb.has_all_memories(Memory::SUSPICIOUS | Memory::IN_COVER));
    }

    proptest! {
        #[test]
        fn prop_condition_ops_are_idempotent(start in any::<u32>(), mask in any::<u32>()) {
            let mask = Conditions::from_bits_retain(mask);
            let mut bb = Blackboard::from_parts(Conditions::from_bits_retain(start), Memory::empty());

            bb.clear_conditions(mask);
            prop_assert!(!bb.has_conditions(mask));

            bb.set_conditions(mask);
            let once = bb;
            bb.set_conditions(mask);
            prop_assert_eq!(once, bb);
            prop_assert!(mask.is_empty() || bb.has_conditions(mask));
            prop_assert!(bb.has_all_conditions(mask));
        }

        #[test]
        fn prop_memory_ops_are_idempotent(start in any::<u32>(), mask in any::<u32>()) {
            let mask = Memory::from_bits_retain(mask);
            let mut bb = Blackboard::from_parts(Conditions::empty(), Memory::from_bits_retain(start));

            bb.forget(mask);
            prop_assert!(!bb.has_memory(mask));

            bb.remember(mask);
            let once = bb;
            bb.remember(mask);
            prop_assert_eq!(once, bb);
            prop_assert!(bb.has_all_memories(mask));
        }
    }
}
