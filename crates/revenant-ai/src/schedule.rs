//! Schedules: named, immutable task lists with interrupt masks.
//!
//! A [`ScheduleSet`] is built once per monster kind and shared through an
//! `Arc`. Monsters refer to schedules by [`ScheduleId`] so a stale id can be
//! detected instead of followed.

use crate::conditions::Conditions;
use crate::task::Task;
use crate::world::SoundKind;
use ahash::AHashMap;
use revenant_common::{AiError, SchemaVersion};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the schedule every set carries as its last resort.
pub const FALLBACK_SCHEDULE_NAME: &str = "Fallback Idle";

/// Index of a schedule within its [`ScheduleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleId(pub u32);

impl std::fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sched#{}", self.0)
    }
}

/// What a schedule is for. Behaviors pick a type; the set maps it to a
/// concrete schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleType {
    /// Stand around
    Idle,
    /// Stand on guard
    AlertStand,
    /// Turn toward something noticed
    AlertFace,
    /// Short pain reaction
    SmallFlinch,
    /// Turn to face the enemy
    CombatFace,
    /// Run at the enemy
    ChaseEnemy,
    /// Go where the enemy was last seen
    HuntLkp,
    /// Primary melee attack
    MeleeAttack1,
    /// Secondary melee attack
    MeleeAttack2,
    /// Primary ranged attack
    RangeAttack1,
    /// Secondary ranged attack
    RangeAttack2,
    /// Get out of the enemy's sight
    TakeCoverFromEnemy,
    /// Celebrate
    VictoryDance,
    /// Angry reaction to a new enemy
    WakeAngry,
    /// Go look at a heard sound
    InvestigateSound,
    /// Recover after a failure
    Fail,
    /// Die
    Die,
    /// Kind-specific
    Custom(u16),
}

/// An immutable task list with the conditions that abort it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Unique name used by snapshots and debug output
    pub name: String,
    /// Type this schedule serves
    pub kind: ScheduleType,
    /// Tasks in order
    pub tasks: Vec<Task>,
    /// Conditions that invalidate the schedule
    #[serde(default)]
    pub interrupts: Conditions,
    /// Sound categories heard while running
    #[serde(default)]
    pub sound_mask: SoundKind,
    /// Schedule type to run if a task fails
    #[serde(default)]
    pub fail_schedule: Option<ScheduleType>,
    /// Defer monster state changes until the schedule ends
    #[serde(default)]
    pub locks_state: bool,
}

impl Schedule {
    /// Creates a schedule with no interrupts.
    pub fn new(name: impl Into<String>, kind: ScheduleType, tasks: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            kind,
            tasks,
            interrupts: Conditions::empty(),
            sound_mask: SoundKind::empty(),
            fail_schedule: None,
            locks_state: false,
        }
    }

    /// Sets the interrupt mask.
    #[must_use]
    pub fn interrupted_by(mut self, interrupts: Conditions) -> Self {
        self.interrupts = interrupts;
        self
    }

    /// Sets the sound mask.
    #[must_use]
    pub fn hearing(mut self, sound_mask: SoundKind) -> Self {
        self.sound_mask = sound_mask;
        self
    }

    /// Sets the fail schedule.
    #[must_use]
    pub fn on_fail(mut self, fail_schedule: ScheduleType) -> Self {
        self.fail_schedule = Some(fail_schedule);
        self
    }

    /// Defers state changes until the schedule ends.
    #[must_use]
    pub fn locking_state(mut self) -> Self {
        self.locks_state = true;
        self
    }

    /// Task at `index`.
    #[must_use]
    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Checks if there are no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn fallback() -> Self {
        Self::new(
            FALLBACK_SCHEDULE_NAME,
            ScheduleType::Idle,
            vec![Task::StopMoving, Task::SetActivity(crate::activity::Activity::Idle), Task::Wait(1.0)],
        )
        .interrupted_by(
            Conditions::NEW_ENEMY
                | Conditions::SEE_HOSTILE
                | Conditions::DAMAGE
                | Conditions::HEAR_SOUND,
        )
    }

    fn validate(&self) -> Result<(), ScheduleError> {
        if self.name.trim().is_empty() {
            return Err(ScheduleError::EmptyName);
        }
        if self.tasks.is_empty() {
            return Err(ScheduleError::NoTasks(self.name.clone()));
        }
        Ok(())
    }
}

/// Schedule table failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    /// A schedule has no name
    #[error("schedule with empty name")]
    EmptyName,

    /// A schedule has no tasks
    #[error("schedule '{0}' has no tasks")]
    NoTasks(String),

    /// The RON text did not parse
    #[error("failed to parse schedule table: {0}")]
    Parse(String),

    /// The table was written by an incompatible version
    #[error("schedule table version {found} cannot be read (current {current})")]
    Version {
        /// Version in the file
        found: SchemaVersion,
        /// Version of this build
        current: SchemaVersion,
    },
}

impl From<ScheduleError> for AiError {
    fn from(e: ScheduleError) -> Self {
        Self::ScheduleTable(e.to_string())
    }
}

/// On-disk form of a schedule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTable {
    /// Format version
    pub version: SchemaVersion,
    /// Schedules in priority order
    pub schedules: Vec<Schedule>,
}

/// The schedules of one monster kind.
///
/// Lookups by name or type return the first match in registration order.
/// A built-in idle schedule is always appended last, so type lookup
/// always succeeds.
#[derive(Debug, Clone)]
pub struct ScheduleSet {
    schedules: Vec<Schedule>,
    names: AHashMap<String, ScheduleId>,
    types: AHashMap<ScheduleType, ScheduleId>,
    fallback: ScheduleId,
}

impl ScheduleSet {
    /// Builds a set, validating every schedule.
    pub fn new(schedules: Vec<Schedule>) -> Result<Self, ScheduleError> {
        for schedule in &schedules {
            schedule.validate()?;
        }
        Ok(Self::assemble(schedules))
    }

    pub(crate) fn assemble(mut schedules: Vec<Schedule>) -> Self {
        let fallback = ScheduleId(schedules.len() as u32);
        schedules.push(Schedule::fallback());

        let mut names = AHashMap::with_capacity(schedules.len());
        let mut types = AHashMap::new();
        for (i, schedule) in schedules.iter().enumerate() {
            let id = ScheduleId(i as u32);
            if names.contains_key(&schedule.name) {
                debug!("Schedule '{}' shadowed by an earlier one", schedule.name);
            } else {
                names.insert(schedule.name.clone(), id);
            }
            types.entry(schedule.kind).or_insert(id);
        }

        Self {
            schedules,
            names,
            types,
            fallback,
        }
    }

    /// Parses a RON [`ScheduleTable`].
    pub fn from_ron(text: &str) -> Result<Self, ScheduleError> {
        let table: ScheduleTable = ron::from_str(text).map_err(|e| ScheduleError::Parse(e.to_string()))?;
        if !SchemaVersion::SCHEDULE_TABLE.can_read(&table.version) {
            return Err(ScheduleError::Version {
                found: table.version,
                current: SchemaVersion::SCHEDULE_TABLE,
            });
        }
        Self::new(table.schedules)
    }

    /// Writes the set (without the built-in fallback) as a RON table.
    pub fn to_ron(&self) -> Result<String, ScheduleError> {
        let table = ScheduleTable {
            version: SchemaVersion::SCHEDULE_TABLE,
            schedules: self.schedules[..self.fallback.0 as usize].to_vec(),
        };
        ron::ser::to_string_pretty(&table, ron::ser::PrettyConfig::default())
            .map_err(|e| ScheduleError::Parse(e.to_string()))
    }

    /// Schedule by id; `None` for ids from another set.
    #[must_use]
    pub fn get(&self, id: ScheduleId) -> Option<&Schedule> {
        self.schedules.get(id.0 as usize)
    }

    /// First schedule with this name.
    pub fn by_name(&self, name: &str) -> Option<ScheduleId> {
        let found = self.names.get(name).copied();
        if found.is_none() {
            warn!("No schedule named '{name}'");
        }
        found
    }

    /// First schedule registered for this type.
    #[must_use]
    pub fn of_type(&self, kind: ScheduleType) -> Option<ScheduleId> {
        self.types.get(&kind).copied()
    }

    /// Schedule for `kind`, falling back to the fail schedule, then idle,
    /// then the built-in idle.
    pub fn resolve(&self, kind: ScheduleType) -> ScheduleId {
        if let Some(id) = self.of_type(kind) {
            return id;
        }
        warn!("No schedule of type {kind:?}, falling back");
        self.of_type(ScheduleType::Fail)
            .or_else(|| self.of_type(ScheduleType::Idle))
            .unwrap_or(self.fallback)
    }

    /// The built-in idle schedule.
    #[must_use]
    pub const fn fallback(&self) -> ScheduleId {
        self.fallback
    }

    /// Number of schedules, the built-in one included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    /// Always false; the built-in schedule is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    /// All schedules with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ScheduleId, &Schedule)> {
        self.schedules
            .iter()
            .enumerate()
            .map(|(i, s)| (ScheduleId(i as u32), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Activity;

    fn stand(name: &str, kind: ScheduleType) -> Schedule {
        Schedule::new(name, kind, vec![Task::Wait(0.0)])
    }

    #[test]
    fn test_lookup_first_match_wins() {
        let set = ScheduleSet::new(vec![
            stand("Stand", ScheduleType::Idle),
            stand("Stand", ScheduleType::AlertStand),
            stand("Other Idle", ScheduleType::Idle),
        ])
        .expect("valid set");

        assert_eq!(set.by_name("Stand"), Some(ScheduleId(0)));
        assert_eq!(set.of_type(ScheduleType::Idle), Some(ScheduleId(0)));
        assert_eq!(set.of_type(ScheduleType::AlertStand), Some(ScheduleId(1)));
        assert_eq!(set.by_name("Missing"), None);
    }

    #[test]
    fn test_resolve_falls_back() {
        let with_fail = ScheduleSet::new(vec![
            stand("Idle", ScheduleType::Idle),
            stand("Fail", ScheduleType::Fail),
        ])
        .expect("valid set");
        assert_eq!(with_fail.resolve(ScheduleType::ChaseEnemy), ScheduleId(1));

        let idle_only = ScheduleSet::new(vec![stand("Idle", ScheduleType::Idle)]).expect("valid set");
        assert_eq!(idle_only.resolve(ScheduleType::ChaseEnemy), ScheduleId(0));

        let empty = ScheduleSet::new(Vec::new()).expect("valid set");
        let id = empty.resolve(ScheduleType::ChaseEnemy);
        assert_eq!(id, empty.fallback());
        assert_eq!(empty.get(id).map(|s| s.name.as_str()), Some(FALLBACK_SCHEDULE_NAME));
    }

    #[test]
    fn test_validation() {
        let err = ScheduleSet::new(vec![Schedule::new("Empty", ScheduleType::Idle, Vec::new())]);
        assert_eq!(err.err(), Some(ScheduleError::NoTasks("Empty".into())));

        let err = ScheduleSet::new(vec![stand("  ", ScheduleType::Idle)]);
        assert_eq!(err.err(), Some(ScheduleError::EmptyName));
    }

    #[test]
    fn test_stale_id() {
        let set = ScheduleSet::new(vec![stand("Idle", ScheduleType::Idle)]).expect("valid set");
        assert!(set.get(ScheduleId(99)).is_none());
    }

    #[test]
    fn test_from_ron() {
        let text = r#"(
            version: (major: 1, minor: 0, patch: 0),
            schedules: [
                (
                    name: "Guard",
                    kind: AlertStand,
                    tasks: [StopMoving, SetActivity(Guard), Wait(2.5)],
                    interrupts: "NEW_ENEMY | HEAR_SOUND",
                    sound_mask: "COMBAT | DANGER",
                    fail_schedule: Some(Idle),
                ),
                (
                    name: "Bite",
                    kind: Custom(7),
                    tasks: [FaceEnemy, Custom(id: 1, value: 0.5)],
                    locks_state: true,
                ),
            ],
        )"#;

        let set = ScheduleSet::from_ron(text).expect("table should parse");
        let guard = set.by_name("Guard").and_then(|id| set.get(id)).expect("guard");
        assert_eq!(guard.kind, ScheduleType::AlertStand);
        assert_eq!(guard.tasks[1], Task::SetActivity(Activity::Guard));
        assert!(guard.interrupts.contains(Conditions::NEW_ENEMY | Conditions::HEAR_SOUND));
        assert!(guard.sound_mask.contains(SoundKind::DANGER));
        assert_eq!(guard.fail_schedule, Some(ScheduleType::Idle));

        let bite = set.of_type(ScheduleType::Custom(7)).and_then(|id| set.get(id)).expect("bite");
        assert!(bite.locks_state);
        assert!(bite.interrupts.is_empty());
    }

    #[test]
    fn test_from_ron_rejects_newer_major() {
        let text = "(version: (major: 9, minor: 0, patch: 0), schedules: [])";
        assert!(matches!(
            ScheduleSet::from_ron(text),
            Err(ScheduleError::Version { .. })
        ));
    }

    #[test]
    fn test_from_ron_parse_error() {
        assert!(matches!(ScheduleSet::from_ron("(nope"), Err(ScheduleError::Parse(_))));
    }

    #[test]
    fn test_ron_export_reimports() {
        let set = ScheduleSet::new(vec![stand("Idle", ScheduleType::Idle)
            .interrupted_by(Conditions::SEE_ENEMY)
            .on_fail(ScheduleType::Fail)])
        .expect("valid set");
        let text = set.to_ron().expect("export");
        let again = ScheduleSet::from_ron(&text).expect("reimport");
        assert_eq!(again.len(), set.len());
        assert_eq!(again.get(ScheduleId(0)), set.get(ScheduleId(0)));
    }

    #[test]
    fn test_schedule_error_into_ai_error() {
        let err: AiError = ScheduleError::NoTasks("X".into()).into();
        assert!(matches!(err, AiError::ScheduleTable(_)));
    }
}
