//! Monsters: per-agent scheduler state and the think loop.
//!
//! A [`Monster`] owns its blackboard, enemy memory, route and schedule
//! position. What it shares with others of its species lives in an
//! [`Arc<MonsterKind>`]. Every think receives the world as `&dyn AiWorld`;
//! monsters never hold on to it.

use crate::activity::{Activity, Locomotion, MonsterState};
use crate::behavior::{DefaultBehavior, MonsterBehavior};
use crate::conditions::{Blackboard, Conditions, Memory};
use crate::config::AiTuning;
use crate::enemy::EnemyTracker;
use crate::relationship::{EntityClass, RelationshipTable};
use crate::route::{MoveGoal, Route, RouteProgress, WaypointFlags};
use crate::schedule::{Schedule, ScheduleId, ScheduleSet, ScheduleType};
use crate::task::{Task, TaskStatus};
use crate::world::{AiWorld, LocalMove, PathRequest, Sound, SoundKind};
use bitflags::bitflags;
use glam::Vec3;
use revenant_common::{change_yaw, yaw_delta, EntityHandle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// An enemy route is rebuilt once its target strays this far from the goal.
const ENEMY_ROUTE_SLACK: f32 = 2.0;

bitflags! {
    /// What a monster kind is able to do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        /// Primary melee attack
        const MELEE_ATTACK1 = 1 << 0;
        /// Secondary melee attack
        const MELEE_ATTACK2 = 1 << 1;
        /// Primary ranged attack
        const RANGE_ATTACK1 = 1 << 2;
        /// Secondary ranged attack
        const RANGE_ATTACK2 = 1 << 3;
        /// Reacts to sounds
        const HEAR          = 1 << 4;
    }
}

/// Data shared by every monster of one species.
#[derive(Clone)]
pub struct MonsterKind {
    /// Species name for logs
    pub name: String,
    /// Relationship class
    pub class: EntityClass,
    /// How it moves
    pub locomotion: Locomotion,
    /// Attacks and senses
    pub capabilities: Capabilities,
    /// Sound categories it can hear at all
    pub sound_mask: SoundKind,
    /// Schedules it can run
    pub schedules: Arc<ScheduleSet>,
    /// How it regards other classes
    pub relationships: Arc<RelationshipTable>,
    /// Tuning
    pub tuning: AiTuning,
    /// Decision hooks
    pub behavior: Arc<dyn MonsterBehavior>,
}

impl std::fmt::Debug for MonsterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonsterKind")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("locomotion", &self.locomotion)
            .field("capabilities", &self.capabilities)
            .field("schedules", &self.schedules.len())
            .finish_non_exhaustive()
    }
}

impl MonsterKind {
    /// A ground melee monster with the stock schedules and behavior.
    pub fn new(name: impl Into<String>, class: EntityClass) -> Self {
        Self {
            name: name.into(),
            class,
            locomotion: Locomotion::Ground,
            capabilities: Capabilities::HEAR | Capabilities::MELEE_ATTACK1,
            sound_mask: SoundKind::all(),
            schedules: Arc::new(ScheduleSet::standard()),
            relationships: Arc::new(RelationshipTable::new()),
            tuning: AiTuning::default(),
            behavior: Arc::new(DefaultBehavior),
        }
    }

    /// Sets the locomotion.
    #[must_use]
    pub fn with_locomotion(mut self, locomotion: Locomotion) -> Self {
        self.locomotion = locomotion;
        self
    }

    /// Sets the capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the audible sound categories.
    #[must_use]
    pub fn with_sound_mask(mut self, sound_mask: SoundKind) -> Self {
        self.sound_mask = sound_mask;
        self
    }

    /// Sets the schedule set.
    #[must_use]
    pub fn with_schedules(mut self, schedules: Arc<ScheduleSet>) -> Self {
        self.schedules = schedules;
        self
    }

    /// Sets the relationship table.
    #[must_use]
    pub fn with_relationships(mut self, relationships: Arc<RelationshipTable>) -> Self {
        self.relationships = relationships;
        self
    }

    /// Sets the tuning, clamping it first.
    #[must_use]
    pub fn with_tuning(mut self, mut tuning: AiTuning) -> Self {
        tuning.validate();
        self.tuning = tuning;
        self
    }

    /// Sets the behavior.
    #[must_use]
    pub fn with_behavior(mut self, behavior: Arc<dyn MonsterBehavior>) -> Self {
        self.behavior = behavior;
        self
    }
}

/// Something a monster did that the host should act on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonsterEvent {
    /// Started an attack
    Attack {
        /// Attack activity
        activity: Activity,
        /// Who is attacked
        target: EntityHandle,
    },
    /// Started dying
    Died,
    /// Changed state
    StateChanged {
        /// Old state
        from: MonsterState,
        /// New state
        to: MonsterState,
    },
}

/// One AI agent.
#[derive(Debug)]
pub struct Monster {
    pub(crate) handle: EntityHandle,
    pub(crate) kind: Arc<MonsterKind>,

    // === Body ===
    pub(crate) position: Vec3,
    pub(crate) yaw: f32,
    pub(crate) ideal_yaw: f32,
    pub(crate) health: f32,

    // === Mind ===
    pub(crate) blackboard: Blackboard,
    /// Conditions raised between thinks, merged at the next one
    pub(crate) pending: Conditions,
    pub(crate) state: MonsterState,
    pub(crate) ideal_state: MonsterState,
    pub(crate) enemy: EnemyTracker,
    pub(crate) target: Option<EntityHandle>,
    pub(crate) heard: Option<Sound>,

    // === Animation ===
    pub(crate) activity: Activity,
    pub(crate) ideal_activity: Activity,
    pub(crate) movement_activity: Activity,
    pub(crate) move_speed: f32,

    // === Schedule ===
    pub(crate) route: Route,
    pub(crate) schedule: Option<ScheduleId>,
    pub(crate) schedule_index: usize,
    pub(crate) task_status: TaskStatus,
    pub(crate) fail_override: Option<ScheduleType>,
    pub(crate) wait_until: f32,
    pub(crate) schedule_changes: u64,
    pub(crate) sequence_serial: u64,

    pub(crate) events: Vec<MonsterEvent>,
}

impl Monster {
    /// Spawns a monster of `kind` at `position`.
    pub fn new(handle: EntityHandle, kind: Arc<MonsterKind>, position: Vec3) -> Self {
        let enemy = EnemyTracker::new(kind.tuning.old_enemy_capacity);
        let health = kind.tuning.max_health;
        Self {
            handle,
            kind,
            position,
            yaw: 0.0,
            ideal_yaw: 0.0,
            health,
            blackboard: Blackboard::new(),
            pending: Conditions::empty(),
            state: MonsterState::None,
            ideal_state: MonsterState::None,
            enemy,
            target: None,
            heard: None,
            activity: Activity::Idle,
            ideal_activity: Activity::Idle,
            movement_activity: Activity::Idle,
            move_speed: 0.0,
            route: Route::new(),
            schedule: None,
            schedule_index: 0,
            task_status: TaskStatus::NotRunning,
            fail_override: None,
            wait_until: 0.0,
            schedule_changes: 0,
            sequence_serial: 0,
            events: Vec::new(),
        }
    }

    /// Runs one think: sense, pick a state, run the schedule, move, turn.
    pub fn think(&mut self, world: &dyn AiWorld, dt: f32) {
        self.blackboard.begin_think();
        self.blackboard.set_conditions(std::mem::take(&mut self.pending));

        if self.is_alive() {
            self.look(world);
            self.listen(world);
            self.update_enemy(world);
        }

        self.get_ideal_state();
        self.maintain_schedule(world);
        self.move_execute(world, dt);

        self.yaw = change_yaw(self.yaw, self.ideal_yaw, self.kind.tuning.yaw_speed * dt);
        self.activity = if self.move_speed > 0.0 && !self.route.movement_is_complete() {
            self.movement_activity
        } else {
            self.ideal_activity
        };
    }

    // === Scheduling ===

    /// Keeps a valid schedule active and steps its tasks.
    ///
    /// At most one schedule change happens per call. Chains of tasks that
    /// finish immediately are bounded by `max_task_steps_per_tick`.
    pub fn maintain_schedule(&mut self, world: &dyn AiWorld) {
        let mut changed = false;

        for _ in 0..self.kind.tuning.max_task_steps_per_tick {
            if self.needs_new_schedule() {
                if changed {
                    break;
                }
                let id = self.get_schedule();
                self.change_schedule(id);
                changed = true;
            }

            let Some(task) = self.current_task() else {
                break;
            };

            match self.task_status {
                TaskStatus::NotRunning => {
                    self.task_begin();
                    self.start_task(world, task);
                },
                TaskStatus::Running => self.run_task(world, task),
                TaskStatus::Complete | TaskStatus::Failed => {},
            }

            match self.task_status {
                TaskStatus::Complete => self.next_scheduled_task(),
                TaskStatus::Failed => {},
                TaskStatus::NotRunning | TaskStatus::Running => break,
            }
        }
    }

    /// Whether the active schedule has to be replaced.
    #[must_use]
    pub fn needs_new_schedule(&self) -> bool {
        match self.current_schedule() {
            Some(schedule) => self.schedule_done() || !self.schedule_valid(schedule),
            None => true,
        }
    }

    /// Whether the active schedule ran out of tasks.
    #[must_use]
    pub fn schedule_done(&self) -> bool {
        self.blackboard.has_conditions(Conditions::SCHEDULE_DONE)
            || self.current_schedule().map_or(true, |s| self.schedule_index >= s.len())
    }

    /// Whether `schedule` may keep running.
    ///
    /// A failed task, an interrupt the behavior does not ignore, or a state
    /// change the schedule does not lock out all invalidate it. Dying is
    /// never locked out.
    #[must_use]
    pub fn schedule_valid(&self, schedule: &Schedule) -> bool {
        if self.blackboard.has_conditions(Conditions::TASK_FAILED) {
            return false;
        }
        if self.ideal_state == MonsterState::Dead && self.state != MonsterState::Dead {
            return false;
        }

        let ignored = self.kind.behavior.ignore_conditions(self);
        if self.blackboard.has_conditions(schedule.interrupts & !ignored) {
            return false;
        }

        schedule.locks_state || !self.state_change_pending()
    }

    /// Picks the next schedule, applying any pending state change.
    pub fn get_schedule(&mut self) -> ScheduleId {
        let failed_kind = self.current_schedule().and_then(|s| s.fail_schedule);
        let schedules = Arc::clone(&self.kind.schedules);

        self.apply_ideal_state();

        if self.state != MonsterState::Dead && self.blackboard.has_conditions(Conditions::TASK_FAILED) {
            if let Some(kind) = self.fail_override.or(failed_kind) {
                return schedules.resolve(kind);
            }
        }

        let kind = self.behavior().select_schedule(self);
        schedules.resolve(kind)
    }

    /// Activates schedule `id` from its first task.
    ///
    /// Clears the scheduler-owned conditions and the new schedule's own
    /// interrupts, so it is not abandoned for what caused it to be picked.
    pub fn change_schedule(&mut self, id: ScheduleId) {
        let interrupts = self
            .kind
            .schedules
            .get(id)
            .map_or_else(Conditions::empty, |s| s.interrupts);

        if let Some(schedule) = self.kind.schedules.get(id) {
            debug!("Monster {} ({:?}) -> schedule '{}'", self.handle, self.state, schedule.name);
        }

        self.schedule = Some(id);
        self.schedule_index = 0;
        self.task_status = TaskStatus::NotRunning;
        self.fail_override = None;
        self.schedule_changes += 1;
        self.blackboard.clear_conditions(Conditions::SCHEDULER_OWNED | interrupts);
    }

    /// Moves to the next task, flagging `SCHEDULE_DONE` past the end.
    pub fn next_scheduled_task(&mut self) {
        self.schedule_index += 1;
        self.task_status = TaskStatus::NotRunning;

        if self.schedule_done() {
            self.blackboard.set_conditions(Conditions::SCHEDULE_DONE);
        }
    }

    // === State ===

    /// Recomputes the ideal state. A dead body always wants to be dead.
    pub fn get_ideal_state(&mut self) -> MonsterState {
        self.ideal_state = if self.health <= 0.0 {
            MonsterState::Dead
        } else if self.state.is_self_directed() {
            self.behavior().ideal_state(self)
        } else {
            self.ideal_state
        };
        self.ideal_state
    }

    /// Requests a state. Takes effect at the next schedule selection.
    pub fn set_ideal_state(&mut self, state: MonsterState) {
        self.ideal_state = state;
    }

    fn state_change_pending(&self) -> bool {
        self.ideal_state != MonsterState::None && self.ideal_state != self.state
    }

    fn apply_ideal_state(&mut self) {
        if !self.state_change_pending() {
            return;
        }
        debug!("Monster {} state {:?} -> {:?}", self.handle, self.state, self.ideal_state);
        self.events.push(MonsterEvent::StateChanged {
            from: self.state,
            to: self.ideal_state,
        });
        self.state = self.ideal_state;
    }

    // === Movement ===

    /// Builds a route to `goal`. On failure flags `NO_ROUTE`.
    pub(crate) fn build_route(
        &mut self,
        world: &dyn AiWorld,
        goal: Vec3,
        flags: WaypointFlags,
        target: Option<EntityHandle>,
    ) -> bool {
        let request = PathRequest {
            from: self.position,
            to: goal,
            locomotion: self.kind.locomotion,
            flags,
            target,
        };

        self.blackboard.forget(Memory::PATH_FINISHED | Memory::MOVE_FAILED);
        match self.route.build(world, &request) {
            Ok(()) => {
                if self.kind.tuning.simplify_routes {
                    self.route.simplify(self.position, world, target);
                }
                self.blackboard.remember(Memory::ON_PATH);
                true
            },
            Err(e) => {
                debug!("Monster {} has no route to {}: {e}", self.handle, goal);
                self.blackboard.forget(Memory::ON_PATH);
                self.blackboard.set_conditions(Conditions::NO_ROUTE);
                false
            },
        }
    }

    /// Starts following the route.
    pub fn set_movement(&mut self, run: bool) {
        let locomotion = self.kind.locomotion;
        let tuning = &self.kind.tuning;
        if run {
            self.movement_activity = locomotion.run_activity();
            self.move_speed = tuning.run_speed;
        } else {
            self.movement_activity = locomotion.walk_activity();
            self.move_speed = tuning.walk_speed;
        }
    }

    /// Drops the route and stands still.
    pub fn stop_moving(&mut self) {
        self.route.clear();
        self.blackboard.forget(Memory::ON_PATH);
        self.halt();
    }

    fn halt(&mut self) {
        self.movement_activity = self.behavior().stopped_activity(self);
        self.move_speed = 0.0;
    }

    fn movement_complete(&mut self) {
        trace!("Monster {} reached its goal", self.handle);
        self.blackboard.forget(Memory::ON_PATH);
        self.blackboard.remember(Memory::PATH_FINISHED);
        self.halt();
    }

    fn move_execute(&mut self, world: &dyn AiWorld, dt: f32) {
        if self.route.movement_is_complete() || self.move_speed <= 0.0 {
            return;
        }

        if self.route.goal() == MoveGoal::Enemy {
            self.refresh_enemy_route(world);
        }

        let Some(waypoint) = self.route.current().copied() else {
            return;
        };

        let step = (waypoint.position - self.position).clamp_length_max(self.move_speed * dt);
        let next = self.position + step;
        if let LocalMove::Blocked { fraction } = world.check_local_move(self.position, next, self.route.target()) {
            debug!("Monster {} blocked {:.0}% into its move", self.handle, fraction * 100.0);
            self.blackboard.remember(Memory::MOVE_FAILED);
            self.stop_moving();
            return;
        }

        self.set_ideal_yaw_toward(waypoint.position);
        self.position = next;

        let arrived = self.behavior().should_advance_route(self, waypoint.position - self.position);
        if self.route.advance(self.position, |_| arrived) == RouteProgress::Complete {
            self.movement_complete();
        }
    }

    fn refresh_enemy_route(&mut self, world: &dyn AiWorld) {
        let Some(target) = self.route.target() else {
            return;
        };
        let Some(info) = world.resolve(target) else {
            return;
        };
        if info.position.distance(self.route.goal_position()) <= ENEMY_ROUTE_SLACK {
            return;
        }

        trace!("Monster {} re-routing to moving enemy {}", self.handle, target);
        if !self.build_route(world, info.position, WaypointFlags::TO_ENEMY, Some(target)) {
            self.blackboard.remember(Memory::MOVE_FAILED);
            self.stop_moving();
        }
    }

    // === Damage ===

    /// Applies damage from `attacker`. Conditions show up at the next think.
    ///
    /// Being hurt by something the monster does not hate provokes it, and an
    /// attacker becomes the enemy when there is none.
    pub fn take_damage(&mut self, world: &dyn AiWorld, attacker: Option<EntityHandle>, amount: f32) {
        if !self.is_alive() || amount <= 0.0 {
            return;
        }

        self.health -= amount;
        self.pending |= if amount >= self.kind.tuning.heavy_damage {
            Conditions::HEAVY_DAMAGE
        } else {
            Conditions::LIGHT_DAMAGE
        };
        debug!("Monster {} took {amount} damage, {} left", self.handle, self.health);

        if self.health <= 0.0 {
            self.ideal_state = MonsterState::Dead;
            return;
        }

        let Some((attacker, info)) = attacker.and_then(|h| world.resolve(h).map(|info| (h, info))) else {
            return;
        };

        if !self.relationship_to(&info).is_hostile() {
            self.blackboard.remember(Memory::PROVOKED);
            self.pending |= Conditions::PROVOKED;
        }
        if !self.enemy.has_enemy() && self.enemy.push_enemy(attacker, info.position) {
            self.pending |= Conditions::NEW_ENEMY;
        }
    }

    // === Accessors ===

    /// Own handle.
    #[must_use]
    pub const fn handle(&self) -> EntityHandle {
        self.handle
    }

    /// Species data.
    #[must_use]
    pub fn kind(&self) -> &MonsterKind {
        &self.kind
    }

    /// Switches species. The current schedule is dropped.
    pub fn set_kind(&mut self, kind: Arc<MonsterKind>) {
        self.kind = kind;
        self.schedule = None;
        self.schedule_index = 0;
        self.task_status = TaskStatus::NotRunning;
    }

    pub(crate) fn behavior(&self) -> Arc<dyn MonsterBehavior> {
        Arc::clone(&self.kind.behavior)
    }

    /// Position of the feet.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Teleports the monster.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Eye position.
    #[must_use]
    pub fn eye(&self) -> Vec3 {
        self.position + Vec3::Z * self.kind.tuning.view_height
    }

    /// Facing in degrees.
    #[must_use]
    pub const fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Facing being turned toward.
    #[must_use]
    pub const fn ideal_yaw(&self) -> f32 {
        self.ideal_yaw
    }

    /// Whether the monster faces its ideal yaw.
    #[must_use]
    pub fn facing_ideal(&self) -> bool {
        yaw_delta(self.yaw, self.ideal_yaw).abs() <= self.kind.tuning.face_tolerance
    }

    /// Remaining health.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Checks if the monster is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0 && self.state.is_alive()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> MonsterState {
        self.state
    }

    /// State the monster is heading for.
    #[must_use]
    pub const fn ideal_state(&self) -> MonsterState {
        self.ideal_state
    }

    /// Condition and memory registers.
    #[must_use]
    pub const fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    /// True if any condition in `mask` is set.
    #[must_use]
    pub const fn has_conditions(&self, mask: Conditions) -> bool {
        self.blackboard.has_conditions(mask)
    }

    /// Sets conditions directly.
    pub fn set_conditions(&mut self, mask: Conditions) {
        self.blackboard.set_conditions(mask);
    }

    /// Clears conditions directly.
    pub fn clear_conditions(&mut self, mask: Conditions) {
        self.blackboard.clear_conditions(mask);
    }

    /// True if any memory bit in `mask` is set.
    #[must_use]
    pub const fn has_memory(&self, mask: Memory) -> bool {
        self.blackboard.has_memory(mask)
    }

    /// Enemy memory.
    #[must_use]
    pub const fn enemy(&self) -> &EnemyTracker {
        &self.enemy
    }

    /// Mutable enemy memory.
    pub fn enemy_mut(&mut self) -> &mut EnemyTracker {
        &mut self.enemy
    }

    /// Scripted target entity.
    #[must_use]
    pub const fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    /// Sets the scripted target entity.
    pub fn set_target(&mut self, target: Option<EntityHandle>) {
        self.target = target;
    }

    /// Last sound heard, if any.
    #[must_use]
    pub const fn heard(&self) -> Option<Sound> {
        self.heard
    }

    /// Route being followed.
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    /// Activity being played.
    #[must_use]
    pub const fn activity(&self) -> Activity {
        self.activity
    }

    /// Activity the tasks asked for.
    #[must_use]
    pub const fn ideal_activity(&self) -> Activity {
        self.ideal_activity
    }

    /// Activity used while following the route.
    #[must_use]
    pub const fn movement_activity(&self) -> Activity {
        self.movement_activity
    }

    /// Active schedule id, possibly stale.
    #[must_use]
    pub const fn schedule_id(&self) -> Option<ScheduleId> {
        self.schedule
    }

    /// Active schedule, if its id resolves.
    #[must_use]
    pub fn current_schedule(&self) -> Option<&Schedule> {
        self.schedule.and_then(|id| self.kind.schedules.get(id))
    }

    /// Index of the active task.
    #[must_use]
    pub const fn schedule_index(&self) -> usize {
        self.schedule_index
    }

    /// Active task, if any.
    #[must_use]
    pub fn current_task(&self) -> Option<Task> {
        self.current_schedule()
            .and_then(|s| s.task(self.schedule_index))
            .copied()
    }

    /// Status of the active task.
    #[must_use]
    pub const fn task_status(&self) -> TaskStatus {
        self.task_status
    }

    /// Schedule changes since spawn.
    #[must_use]
    pub const fn schedule_changes(&self) -> u64 {
        self.schedule_changes
    }

    /// Bumped each time a task starts a sequence, so the animation host can
    /// restart a sequence that repeats the previous activity.
    #[must_use]
    pub const fn sequence_serial(&self) -> u64 {
        self.sequence_serial
    }

    /// Takes the events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<MonsterEvent> {
        std::mem::take(&mut self.events)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::world::{EntityInfo, MockWorld};
    use proptest::prelude::*;

    #[test]
    fn test_idle_reselects_same_schedule() {
        let world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::Wait(0.0)), &world);

        monster.think(&world, 0.1);
        assert_eq!(monster.state(), MonsterState::Idle);
        assert_eq!(monster.schedule_id(), Some(ScheduleId(0)));
        assert_eq!(monster.task_status(), TaskStatus::Running);
        assert_eq!(monster.schedule_changes(), 1);

        // Zero-length wait completes, the schedule runs out and is picked again
        monster.think(&world, 0.1);
        assert_eq!(monster.schedule_id(), Some(ScheduleId(0)));
        assert_eq!(monster.schedule_index(), 0);
        assert_eq!(monster.schedule_changes(), 2);
        assert!(!monster.has_conditions(Conditions::SCHEDULE_DONE));
    }

    #[test]
    fn test_stale_schedule_id_reselects() {
        let world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.think(&world, 0.1);

        monster.task_fail();
        monster.schedule = Some(ScheduleId(999));
        assert!(monster.has_conditions(Conditions::TASK_FAILED));
        assert!(monster.current_task().is_none());

        monster.think(&world, 0.1);
        assert_eq!(monster.schedule_id(), Some(ScheduleId(0)));
        assert_eq!(monster.task_status(), TaskStatus::Running);
        assert!(!monster.has_conditions(Conditions::TASK_FAILED));
    }

    #[test]
    fn test_failure_runs_fail_schedule() {
        let world = MockWorld::new();
        let set = ScheduleSet::new(vec![
            Schedule::new("Try", ScheduleType::Idle, vec![Task::GetPathToEnemy])
                .on_fail(ScheduleType::AlertStand),
            Schedule::new("Recover", ScheduleType::AlertStand, vec![Task::WaitIndefinite]),
        ])
        .expect("valid set");
        let mut monster = monster_with(set, &world);

        // No enemy, so the path task fails on the first think
        monster.think(&world, 0.1);
        assert!(monster.has_conditions(Conditions::TASK_FAILED));

        monster.think(&world, 0.1);
        assert_eq!(monster.current_schedule().map(|s| s.name.as_str()), Some("Recover"));
    }

    #[test]
    fn test_failure_without_fail_schedule_uses_selection() {
        let world = MockWorld::new();
        let set = ScheduleSet::new(vec![
            Schedule::new("Try", ScheduleType::Idle, vec![Task::GetPathToEnemy]),
            Schedule::new("Recover", ScheduleType::AlertStand, vec![Task::WaitIndefinite]),
        ])
        .expect("valid set");
        let mut monster = monster_with(set, &world);

        monster.think(&world, 0.1);
        monster.think(&world, 0.1);
        assert_eq!(monster.current_schedule().map(|s| s.name.as_str()), Some("Try"));
    }

    #[test]
    fn test_task_fail_override_wins() {
        let world = MockWorld::new();
        let set = ScheduleSet::new(vec![
            Schedule::new(
                "Try",
                ScheduleType::Idle,
                vec![Task::SetFailSchedule(ScheduleType::CombatFace), Task::GetPathToEnemy],
            )
            .on_fail(ScheduleType::AlertStand),
            Schedule::new("Recover", ScheduleType::AlertStand, vec![Task::WaitIndefinite]),
            Schedule::new("Face", ScheduleType::CombatFace, vec![Task::WaitIndefinite]),
        ])
        .expect("valid set");
        let mut monster = monster_with(set, &world);

        monster.think(&world, 0.1);
        monster.think(&world, 0.1);
        assert_eq!(monster.current_schedule().map(|s| s.name.as_str()), Some("Face"));
        assert_eq!(monster.fail_override, None);
    }

    #[test]
    fn test_interrupt_replaces_schedule() {
        let world = MockWorld::new();
        let set = ScheduleSet::new(vec![
            Schedule::new("Wait", ScheduleType::Idle, vec![Task::WaitIndefinite])
                .interrupted_by(Conditions::SPECIAL1),
        ])
        .expect("valid set");
        let mut monster = monster_with(set, &world);
        monster.think(&world, 0.1);
        assert_eq!(monster.schedule_changes(), 1);

        monster.think(&world, 0.1);
        assert_eq!(monster.schedule_changes(), 1);

        monster.pending = Conditions::SPECIAL1;
        monster.think(&world, 0.1);
        assert_eq!(monster.schedule_changes(), 2);
    }

    #[test]
    fn test_locked_schedule_defers_state_change() {
        let world = MockWorld::new();
        let set = ScheduleSet::new(vec![
            Schedule::new("Locked", ScheduleType::Idle, vec![Task::WaitIndefinite]).locking_state(),
        ])
        .expect("valid set");
        let mut monster = monster_with(set, &world);
        monster.think(&world, 0.1);
        assert_eq!(monster.state(), MonsterState::Idle);

        monster.force_state(MonsterState::Idle);
        monster.ideal_state = MonsterState::Alert;
        assert!(!monster.needs_new_schedule());

        monster.task_fail();
        let id = monster.get_schedule();
        assert_eq!(monster.state(), MonsterState::Alert);
        assert_eq!(id, ScheduleId(0));
    }

    #[test]
    fn test_unlocked_schedule_yields_to_state_change() {
        let world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.think(&world, 0.1);
        monster.ideal_state = MonsterState::Alert;
        assert!(monster.needs_new_schedule());
    }

    #[test]
    fn test_ignored_conditions_do_not_interrupt() {
        struct Stubborn;
        impl MonsterBehavior for Stubborn {
            fn ignore_conditions(&self, _monster: &Monster) -> Conditions {
                Conditions::SPECIAL1
            }
        }

        let world = MockWorld::new();
        let set = ScheduleSet::new(vec![
            Schedule::new("Wait", ScheduleType::Idle, vec![Task::WaitIndefinite])
                .interrupted_by(Conditions::SPECIAL1),
        ])
        .expect("valid set");
        let kind = MonsterKind::new("stubborn", EntityClass::AlienMonster)
            .with_schedules(Arc::new(set))
            .with_behavior(Arc::new(Stubborn));
        let mut monster = Monster::new(SELF_HANDLE, Arc::new(kind), Vec3::ZERO);

        monster.think(&world, 0.1);
        monster.pending = Conditions::SPECIAL1;
        monster.think(&world, 0.1);
        assert_eq!(monster.schedule_changes(), 1);
    }

    #[test]
    fn test_walks_route_to_spot() {
        let world = MockWorld::new();
        let goal = Vec3::new(3.0, 0.0, 0.0);
        let set = ScheduleSet::new(vec![Schedule::new(
            "Go",
            ScheduleType::Idle,
            vec![Task::GetPathToSpot(goal), Task::WalkPath, Task::WaitForMovement, Task::WaitIndefinite],
        )])
        .expect("valid set");
        let mut monster = monster_with(set, &world);

        monster.think(&world, 0.5);
        assert_eq!(monster.activity(), Activity::Walk);
        assert!(monster.has_memory(Memory::ON_PATH));

        for _ in 0..10 {
            monster.think(&world, 0.5);
        }
        assert!(monster.position().distance(goal) < 0.01);
        assert!(monster.route().movement_is_complete());
        assert!(monster.has_memory(Memory::PATH_FINISHED));
        assert_eq!(monster.current_task(), Some(Task::WaitIndefinite));
        assert!(monster.yaw().abs() < 0.01);
    }

    #[test]
    fn test_blocked_move_fails_wait_for_movement() {
        let mut world = MockWorld::new();
        world.add_blocker(Vec3::new(2.0, 0.0, 0.0), 0.5);
        let set = ScheduleSet::new(vec![Schedule::new(
            "Go",
            ScheduleType::Idle,
            vec![Task::GetPathToSpot(Vec3::new(5.0, 0.0, 0.0)), Task::RunPath, Task::WaitForMovement],
        )])
        .expect("valid set");
        let mut monster = monster_with(set, &world);

        for _ in 0..10 {
            monster.think(&world, 0.1);
            if monster.has_memory(Memory::MOVE_FAILED) {
                break;
            }
        }
        assert!(monster.has_memory(Memory::MOVE_FAILED));
        assert!(monster.route().movement_is_complete());
        assert!(monster.position().x < 2.0);
        assert_eq!(monster.schedule_changes(), 1);

        // The waiting task fails and the schedule is picked again
        monster.think(&world, 0.1);
        assert_eq!(monster.schedule_changes(), 2);
    }

    #[test]
    fn test_damage_from_player_starts_combat() {
        let mut world = MockWorld::new();
        let player = world.spawn(EntityInfo::player(Vec3::new(0.0, 10.0, 0.0)));
        let mut monster = standard_monster(&world);
        monster.think(&world, 0.1);

        monster.take_damage(&world, Some(player), 5.0);
        monster.think(&world, 0.1);
        assert_eq!(monster.enemy().current(), Some(player));
        assert_eq!(monster.state(), MonsterState::Combat);
        assert!(monster
            .drain_events()
            .contains(&MonsterEvent::StateChanged {
                from: MonsterState::Idle,
                to: MonsterState::Combat,
            }));
    }

    #[test]
    fn test_damage_from_neutral_provokes() {
        let mut world = MockWorld::new();
        let scientist = world.spawn(EntityInfo::new(EntityClass::HumanPassive, Vec3::new(0.0, 5.0, 0.0)));
        let kind = MonsterKind::new("guard", EntityClass::HumanPassive);
        let mut monster = Monster::new(SELF_HANDLE, Arc::new(kind), Vec3::ZERO);

        monster.take_damage(&world, Some(scientist), 1.0);
        assert!(monster.has_memory(Memory::PROVOKED));
        assert!(monster.pending.contains(Conditions::PROVOKED | Conditions::LIGHT_DAMAGE));
    }

    #[test]
    fn test_heavy_damage_threshold() {
        let world = MockWorld::new();
        let mut monster = standard_monster(&world);
        let heavy = monster.kind().tuning.heavy_damage;
        monster.take_damage(&world, None, heavy);
        assert!(monster.pending.contains(Conditions::HEAVY_DAMAGE));
    }

    #[test]
    fn test_death_runs_die_schedule() {
        let world = MockWorld::new();
        let mut monster = standard_monster(&world);
        monster.think(&world, 0.1);

        monster.take_damage(&world, None, 1000.0);
        monster.think(&world, 0.1);
        assert_eq!(monster.state(), MonsterState::Dead);
        assert_eq!(monster.current_schedule().map(|s| s.kind), Some(ScheduleType::Die));
        assert_eq!(monster.ideal_activity(), Activity::Die);
        assert!(monster.drain_events().contains(&MonsterEvent::Died));

        // Stays dead and ignores more damage
        monster.take_damage(&world, None, 10.0);
        monster.think(&world, 0.1);
        assert_eq!(monster.schedule_changes(), 2);
        assert!(monster.drain_events().is_empty());
    }

    #[test]
    fn test_lethal_damage_breaks_locked_schedule() {
        let mut world = MockWorld::new();
        let player = world.spawn(EntityInfo::player(Vec3::new(10.0, 0.0, 0.0)));
        let mut monster = standard_monster(&world);
        monster.force_state(MonsterState::Combat);
        monster.enemy_mut().push_enemy(player, Vec3::new(10.0, 0.0, 0.0));

        let cover = monster
            .kind
            .schedules
            .of_type(ScheduleType::TakeCoverFromEnemy)
            .expect("stock cover schedule");
        monster.change_schedule(cover);
        monster.think(&world, 0.1);
        assert!(monster.current_schedule().is_some_and(|s| s.locks_state));

        monster.take_damage(&world, None, 1000.0);
        monster.think(&world, 0.1);
        assert_eq!(monster.state(), MonsterState::Dead);
        assert_eq!(monster.current_schedule().map(|s| s.kind), Some(ScheduleType::Die));
        assert!(monster.drain_events().contains(&MonsterEvent::Died));
    }

    #[test]
    fn test_chases_moving_enemy() {
        let mut world = MockWorld::new();
        let enemy = world.spawn(EntityInfo::new(EntityClass::HumanMilitary, Vec3::new(10.0, 0.0, 0.0)));
        let set = ScheduleSet::new(vec![Schedule::new(
            "Chase",
            ScheduleType::Idle,
            vec![Task::GetPathToEnemy, Task::RunPath, Task::WaitForMovement],
        )])
        .expect("valid set");
        let mut monster = monster_with(set, &world);
        monster.enemy_mut().push_enemy(enemy, Vec3::new(10.0, 0.0, 0.0));
        monster.think(&world, 0.1);

        if let Some(info) = world.entity_mut(enemy) {
            info.position = Vec3::new(0.0, 10.0, 0.0);
        }
        monster.think(&world, 0.1);
        assert!(monster.route().goal_position().distance(Vec3::new(0.0, 10.0, 0.0)) < 0.01);
    }

    #[test]
    fn test_set_kind_drops_schedule() {
        let world = MockWorld::new();
        let mut monster = standard_monster(&world);
        monster.think(&world, 0.1);
        assert!(monster.schedule_id().is_some());

        let kind = MonsterKind::new("other", EntityClass::AlienPredator);
        monster.set_kind(Arc::new(kind));
        assert!(monster.schedule_id().is_none());
        assert_eq!(monster.kind().class, EntityClass::AlienPredator);
    }

    proptest! {
        #[test]
        fn prop_at_most_one_schedule_change_per_think(
            bits in proptest::collection::vec(any::<u32>(), 1..30),
        ) {
            let world = MockWorld::new();
            let mut monster = standard_monster(&world);
            for raw in bits {
                monster.pending = Conditions::from_bits_truncate(raw) & !Conditions::SCHEDULER_OWNED;
                let before = monster.schedule_changes();
                monster.think(&world, 0.1);
                prop_assert!(monster.schedule_changes() - before <= 1);
            }
        }
    }
}
