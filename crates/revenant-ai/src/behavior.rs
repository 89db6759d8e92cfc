//! Per-kind decision hooks.
//!
//! Every monster kind shares the same scheduler; what differs is a handful
//! of decisions. A [`MonsterBehavior`] supplies them, falling back to the
//! stock rules for anything it does not override.

use crate::activity::{Activity, Locomotion, MonsterState};
use crate::conditions::{Conditions, Memory};
use crate::monster::{Capabilities, Monster};
use crate::route::within_tolerance;
use crate::schedule::ScheduleType;
use crate::world::AiWorld;
use glam::Vec3;
use tracing::warn;

/// Minimum facing (dot product) for a melee attack to connect.
pub const MELEE_ATTACK_DOT: f32 = 0.7;

/// Minimum facing (dot product) for a ranged attack.
pub const RANGE_ATTACK_DOT: f32 = 0.5;

/// Decision hooks for one monster kind.
pub trait MonsterBehavior: Send + Sync {
    /// State the monster should be in given what it senses.
    fn ideal_state(&self, monster: &Monster) -> MonsterState {
        default_ideal_state(monster)
    }

    /// Schedule type to run next.
    fn select_schedule(&self, monster: &Monster) -> ScheduleType {
        default_select_schedule(monster)
    }

    /// Conditions that never interrupt this kind's schedules.
    fn ignore_conditions(&self, _monster: &Monster) -> Conditions {
        Conditions::empty()
    }

    /// Whether the monster has reached a waypoint `waypoint_delta` away.
    fn should_advance_route(&self, monster: &Monster, waypoint_delta: Vec3) -> bool {
        let tuning = &monster.kind().tuning;
        within_tolerance(
            waypoint_delta,
            monster.kind().locomotion,
            tuning.arrival_tolerance,
            tuning.step_height,
        )
    }

    /// Activity to settle into after moving or turning.
    fn stopped_activity(&self, monster: &Monster) -> Activity {
        match monster.kind().locomotion {
            Locomotion::Ground => Activity::Idle,
            Locomotion::Flying => Activity::Hover,
            Locomotion::Swimming => Activity::Swim,
        }
    }

    /// Whether the primary melee attack would connect.
    fn check_melee_attack1(&self, monster: &Monster, dot: f32, distance: f32) -> bool {
        monster.kind().capabilities.contains(Capabilities::MELEE_ATTACK1)
            && distance <= monster.kind().tuning.melee_range
            && dot >= MELEE_ATTACK_DOT
    }

    /// Whether the secondary melee attack would connect.
    fn check_melee_attack2(&self, monster: &Monster, dot: f32, distance: f32) -> bool {
        monster.kind().capabilities.contains(Capabilities::MELEE_ATTACK2)
            && distance <= monster.kind().tuning.melee_range
            && dot >= MELEE_ATTACK_DOT
    }

    /// Whether the primary ranged attack would connect.
    fn check_range_attack1(&self, monster: &Monster, dot: f32, distance: f32) -> bool {
        let tuning = &monster.kind().tuning;
        monster.kind().capabilities.contains(Capabilities::RANGE_ATTACK1)
            && (tuning.range_attack_min..=tuning.range_attack_max).contains(&distance)
            && dot >= RANGE_ATTACK_DOT
    }

    /// Whether the secondary ranged attack would connect.
    fn check_range_attack2(&self, monster: &Monster, dot: f32, distance: f32) -> bool {
        let tuning = &monster.kind().tuning;
        monster.kind().capabilities.contains(Capabilities::RANGE_ATTACK2)
            && (tuning.range_attack_min..=tuning.range_attack_max).contains(&distance)
            && dot >= RANGE_ATTACK_DOT
    }

    /// Starts a [`crate::task::Task::Custom`] task. Fails it by default.
    fn start_custom_task(&self, monster: &mut Monster, _world: &dyn AiWorld, id: u16, _value: f32) {
        warn!("Monster {} has no handler for custom task {id}", monster.handle());
        monster.task_fail();
    }

    /// Runs a [`crate::task::Task::Custom`] task. Completes it by default.
    fn run_custom_task(&self, monster: &mut Monster, _world: &dyn AiWorld, _id: u16, _value: f32) {
        monster.task_complete();
    }
}

/// Stock behavior with no overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBehavior;

impl MonsterBehavior for DefaultBehavior {}

/// Stock ideal-state rules.
///
/// Reads only conditions, memory, enemy presence and the current states.
pub fn default_ideal_state(monster: &Monster) -> MonsterState {
    let has_enemy = monster.enemy().has_enemy();
    let suggested = monster.ideal_state();

    match monster.state() {
        MonsterState::None | MonsterState::Idle | MonsterState::Alert => {
            if has_enemy {
                MonsterState::Combat
            } else if monster.has_conditions(Conditions::DAMAGE | Conditions::HEAR_SOUND | Conditions::SEE_FEAR) {
                MonsterState::Alert
            } else if suggested == MonsterState::None {
                MonsterState::Idle
            } else {
                suggested
            }
        },
        MonsterState::Combat => {
            if has_enemy {
                MonsterState::Combat
            } else if monster.has_conditions(Conditions::ENEMY_LOST) {
                MonsterState::Hunt
            } else {
                MonsterState::Alert
            }
        },
        MonsterState::Hunt => {
            if has_enemy {
                MonsterState::Combat
            } else {
                suggested
            }
        },
        MonsterState::Prone | MonsterState::Script | MonsterState::PlayDead | MonsterState::Dead => suggested,
    }
}

/// Stock schedule selection.
pub fn default_select_schedule(monster: &Monster) -> ScheduleType {
    let has = |mask| monster.has_conditions(mask);
    let can_range = monster
        .kind()
        .capabilities
        .intersects(Capabilities::RANGE_ATTACK1 | Capabilities::RANGE_ATTACK2);

    match monster.state() {
        MonsterState::Dead => ScheduleType::Die,
        MonsterState::Combat => {
            if has(Conditions::NEW_ENEMY) {
                ScheduleType::WakeAngry
            } else if has(Conditions::HEAVY_DAMAGE) && can_range {
                ScheduleType::TakeCoverFromEnemy
            } else if has(Conditions::LIGHT_DAMAGE) && !monster.has_memory(Memory::FLINCHED) {
                ScheduleType::SmallFlinch
            } else if !has(Conditions::SEE_ENEMY) {
                if has(Conditions::ENEMY_OCCLUDED) {
                    ScheduleType::ChaseEnemy
                } else {
                    ScheduleType::CombatFace
                }
            } else if has(Conditions::CAN_RANGE_ATTACK1) {
                ScheduleType::RangeAttack1
            } else if has(Conditions::CAN_RANGE_ATTACK2) {
                ScheduleType::RangeAttack2
            } else if has(Conditions::CAN_MELEE_ATTACK1) {
                ScheduleType::MeleeAttack1
            } else if has(Conditions::CAN_MELEE_ATTACK2) {
                ScheduleType::MeleeAttack2
            } else if has(Conditions::NO_ROUTE) {
                ScheduleType::CombatFace
            } else {
                ScheduleType::ChaseEnemy
            }
        },
        MonsterState::Alert => {
            if has(Conditions::ENEMY_DEAD) {
                ScheduleType::VictoryDance
            } else if has(Conditions::DAMAGE) {
                if monster.has_memory(Memory::FLINCHED) {
                    ScheduleType::AlertFace
                } else {
                    ScheduleType::SmallFlinch
                }
            } else if has(Conditions::HEAR_SOUND) {
                ScheduleType::InvestigateSound
            } else {
                ScheduleType::AlertStand
            }
        },
        MonsterState::Hunt => ScheduleType::HuntLkp,
        MonsterState::Idle => {
            if has(Conditions::HEAR_SOUND) {
                ScheduleType::AlertFace
            } else {
                ScheduleType::Idle
            }
        },
        MonsterState::None | MonsterState::Prone | MonsterState::Script | MonsterState::PlayDead => {
            ScheduleType::Idle
        },
    }
}
