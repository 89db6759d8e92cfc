//! The stock schedule library shared by most monster kinds.

use crate::activity::{Activity, MonsterState};
use crate::conditions::{Conditions, Memory};
use crate::schedule::{Schedule, ScheduleError, ScheduleSet, ScheduleType};
use crate::task::Task;
use crate::world::SoundKind;

/// Sounds idle monsters react to.
const IDLE_SOUNDS: SoundKind = SoundKind::all();

/// Sounds alert monsters react to.
const ALERT_SOUNDS: SoundKind = SoundKind::COMBAT
    .union(SoundKind::WORLD)
    .union(SoundKind::PLAYER)
    .union(SoundKind::DANGER);

/// The stock schedules, one per standard [`ScheduleType`].
pub fn schedules() -> Vec<Schedule> {
    use Conditions as C;

    vec![
        Schedule::new(
            "Idle Stand",
            ScheduleType::Idle,
            vec![Task::StopMoving, Task::SetActivity(Activity::Idle), Task::Wait(5.0)],
        )
        .interrupted_by(C::NEW_ENEMY | C::SEE_HOSTILE | C::DAMAGE | C::HEAR_SOUND | C::SMELL | C::PROVOKED)
        .hearing(IDLE_SOUNDS),
        Schedule::new(
            "Alert Stand",
            ScheduleType::AlertStand,
            vec![
                Task::StopMoving,
                Task::Forget(Memory::FLINCHED),
                Task::SetActivity(Activity::Guard),
                Task::Wait(20.0),
                Task::SuggestState(MonsterState::Idle),
            ],
        )
        .interrupted_by(C::NEW_ENEMY | C::SEE_HOSTILE | C::DAMAGE | C::HEAR_SOUND | C::SMELL | C::PROVOKED)
        .hearing(ALERT_SOUNDS),
        Schedule::new(
            "Alert Face",
            ScheduleType::AlertFace,
            vec![Task::StopMoving, Task::SetActivity(Activity::Idle), Task::FaceIdeal],
        )
        .interrupted_by(C::NEW_ENEMY | C::SEE_FEAR | C::DAMAGE | C::PROVOKED)
        .hearing(ALERT_SOUNDS),
        Schedule::new(
            "Small Flinch",
            ScheduleType::SmallFlinch,
            vec![
                Task::Remember(Memory::FLINCHED),
                Task::StopMoving,
                Task::PlaySequence(Activity::SmallFlinch),
            ],
        ),
        Schedule::new(
            "Combat Face",
            ScheduleType::CombatFace,
            vec![Task::StopMoving, Task::SetActivity(Activity::CombatIdle), Task::FaceEnemy],
        )
        .interrupted_by(C::CAN_ATTACK | C::NEW_ENEMY | C::ENEMY_DEAD | C::ENEMY_LOST),
        Schedule::new(
            "Chase Enemy",
            ScheduleType::ChaseEnemy,
            vec![
                Task::SetFailSchedule(ScheduleType::CombatFace),
                Task::Forget(Memory::FLINCHED),
                Task::GetPathToEnemy,
                Task::RunPath,
                Task::WaitForMovement,
            ],
        )
        .interrupted_by(C::NEW_ENEMY | C::CAN_ATTACK | C::ENEMY_DEAD | C::ENEMY_LOST)
        .hearing(SoundKind::DANGER),
        Schedule::new(
            "Hunt Last Known Position",
            ScheduleType::HuntLkp,
            vec![
                Task::StopMoving,
                Task::GetPathToEnemyLkp,
                Task::WalkPath,
                Task::WaitForMovement,
                Task::PlaySequence(Activity::Inspect),
                Task::Forget(Memory::SUSPICIOUS),
                Task::SuggestState(MonsterState::Alert),
            ],
        )
        .interrupted_by(C::NEW_ENEMY | C::SEE_HOSTILE | C::DAMAGE | C::PROVOKED)
        .hearing(ALERT_SOUNDS)
        .on_fail(ScheduleType::AlertStand)
        .locking_state(),
        Schedule::new(
            "Melee Attack 1",
            ScheduleType::MeleeAttack1,
            vec![Task::StopMoving, Task::FaceEnemy, Task::MeleeAttack1],
        )
        .interrupted_by(C::NEW_ENEMY | C::DAMAGE | C::ENEMY_OCCLUDED | C::ENEMY_DEAD | C::ENEMY_LOST),
        Schedule::new(
            "Melee Attack 2",
            ScheduleType::MeleeAttack2,
            vec![Task::StopMoving, Task::FaceEnemy, Task::MeleeAttack2],
        )
        .interrupted_by(C::NEW_ENEMY | C::DAMAGE | C::ENEMY_OCCLUDED | C::ENEMY_DEAD | C::ENEMY_LOST),
        Schedule::new(
            "Range Attack 1",
            ScheduleType::RangeAttack1,
            vec![Task::StopMoving, Task::FaceEnemy, Task::RangeAttack1],
        )
        .interrupted_by(
            C::NEW_ENEMY | C::DAMAGE | C::ENEMY_OCCLUDED | C::NO_AMMO_LOADED | C::ENEMY_DEAD | C::ENEMY_LOST,
        ),
        Schedule::new(
            "Range Attack 2",
            ScheduleType::RangeAttack2,
            vec![Task::StopMoving, Task::FaceEnemy, Task::RangeAttack2],
        )
        .interrupted_by(C::NEW_ENEMY | C::DAMAGE | C::ENEMY_OCCLUDED | C::ENEMY_DEAD | C::ENEMY_LOST),
        Schedule::new(
            "Take Cover From Enemy",
            ScheduleType::TakeCoverFromEnemy,
            vec![
                Task::StopMoving,
                Task::SetFailSchedule(ScheduleType::CombatFace),
                Task::FindCoverFromEnemy(8.0),
                Task::RunPath,
                Task::WaitForMovement,
                Task::Remember(Memory::IN_COVER),
                Task::FaceEnemy,
            ],
        )
        .interrupted_by(C::NEW_ENEMY)
        .locking_state(),
        Schedule::new(
            "Victory Dance",
            ScheduleType::VictoryDance,
            vec![Task::StopMoving, Task::PlaySequence(Activity::VictoryDance)],
        )
        .interrupted_by(C::NEW_ENEMY | C::DAMAGE),
        Schedule::new(
            "Wake Angry",
            ScheduleType::WakeAngry,
            vec![
                Task::StopMoving,
                Task::Forget(Memory::FLINCHED),
                Task::FaceEnemy,
                Task::PlaySequence(Activity::Wakeup),
            ],
        ),
        Schedule::new(
            "Investigate Sound",
            ScheduleType::InvestigateSound,
            vec![
                Task::StopMoving,
                Task::Remember(Memory::SUSPICIOUS),
                Task::FaceSound,
                Task::GetPathToSound,
                Task::WalkPath,
                Task::WaitForMovement,
                Task::PlaySequence(Activity::Inspect),
                Task::Forget(Memory::SUSPICIOUS),
            ],
        )
        .interrupted_by(C::NEW_ENEMY | C::SEE_HOSTILE | C::DAMAGE | C::PROVOKED)
        .hearing(SoundKind::DANGER)
        .on_fail(ScheduleType::AlertFace),
        Schedule::new(
            "Fail",
            ScheduleType::Fail,
            vec![Task::StopMoving, Task::SetActivity(Activity::Idle), Task::Wait(1.0)],
        )
        .interrupted_by(C::CAN_ATTACK | C::NEW_ENEMY),
        Schedule::new("Die", ScheduleType::Die, vec![Task::StopMoving, Task::Die]).locking_state(),
    ]
}

impl ScheduleSet {
    /// The stock schedules alone.
    pub fn standard() -> Self {
        Self::assemble(schedules())
    }

    /// `custom` schedules first, then the stock ones. A custom schedule
    /// wins type lookups over the stock schedule of the same type.
    pub fn with_standard(mut custom: Vec<Schedule>) -> Result<Self, ScheduleError> {
        custom.extend(schedules());
        Self::new(custom)
    }
}
