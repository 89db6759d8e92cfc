//! Tasks: the opcodes schedules are made of, and how a monster runs them.

use crate::activity::{Activity, MonsterState};
use crate::conditions::{Conditions, Memory};
use crate::monster::{Monster, MonsterEvent};
use crate::route::WaypointFlags;
use crate::schedule::ScheduleType;
use crate::world::AiWorld;
use glam::Vec3;
use revenant_common::{flat, vec_to_yaw, yaw_delta, yaw_forward, EntityHandle};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lifecycle of the active task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Selected but not started
    #[default]
    NotRunning,
    /// Started; run every think
    Running,
    /// Finished
    Complete,
    /// Gave up
    Failed,
}

/// One step of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Drop the route and stop the movement activity
    StopMoving,
    /// Wait this many seconds
    Wait(f32),
    /// Wait until interrupted
    WaitIndefinite,
    /// Wait this many seconds while turning toward the enemy
    WaitFaceEnemy(f32),
    /// Wait until the route is walked
    WaitForMovement,
    /// Turn to the ideal yaw
    FaceIdeal,
    /// Turn toward the enemy's last known position
    FaceEnemy,
    /// Turn toward the current waypoint
    FaceRoute,
    /// Turn toward the target entity
    FaceTarget,
    /// Turn toward the last heard sound
    FaceSound,
    /// Set the ideal activity
    SetActivity(Activity),
    /// Play an activity until its sequence ends
    PlaySequence(Activity),
    /// Run this schedule type if a later task fails
    SetFailSchedule(ScheduleType),
    /// Change the ideal state
    SuggestState(MonsterState),
    /// Set memory bits
    Remember(Memory),
    /// Clear memory bits
    Forget(Memory),
    /// Route to the enemy
    GetPathToEnemy,
    /// Route to where the enemy was last seen
    GetPathToEnemyLkp,
    /// Route to the target entity
    GetPathToTarget,
    /// Route to a fixed spot
    GetPathToSpot(Vec3),
    /// Route to the last heard sound
    GetPathToSound,
    /// Route this far away from the enemy
    FindCoverFromEnemy(f32),
    /// Follow the route at walking pace
    WalkPath,
    /// Follow the route at full pace
    RunPath,
    /// Close in on the target (or enemy) until within this distance
    MoveToTargetRange(f32),
    /// Primary ranged attack
    RangeAttack1,
    /// Secondary ranged attack
    RangeAttack2,
    /// Primary melee attack
    MeleeAttack1,
    /// Secondary melee attack
    MeleeAttack2,
    /// Forget the current enemy
    ForgetEnemy,
    /// Play the death activity and stay dead
    Die,
    /// Handled by the kind's behavior
    Custom {
        /// Behavior-defined opcode
        id: u16,
        /// Behavior-defined argument
        value: f32,
    },
}

impl Task {
    /// Activity of an attack task.
    #[must_use]
    pub const fn attack_activity(self) -> Option<Activity> {
        match self {
            Self::RangeAttack1 => Some(Activity::RangeAttack1),
            Self::RangeAttack2 => Some(Activity::RangeAttack2),
            Self::MeleeAttack1 => Some(Activity::MeleeAttack1),
            Self::MeleeAttack2 => Some(Activity::MeleeAttack2),
            _ => None,
        }
    }
}

impl Monster {
    /// Marks the active task as running.
    pub fn task_begin(&mut self) {
        self.task_status = TaskStatus::Running;
    }

    /// Marks the active task as complete. A failed task stays failed, and
    /// nothing completes while `TASK_FAILED` is latched.
    pub fn task_complete(&mut self) {
        if self.task_status != TaskStatus::Failed && !self.blackboard.has_conditions(Conditions::TASK_FAILED) {
            self.task_status = TaskStatus::Complete;
        }
    }

    /// Fails the active task.
    pub fn task_fail(&mut self) {
        if let Some(task) = self.current_task() {
            debug!("Monster {} task {:?} failed", self.handle, task);
        }
        self.task_status = TaskStatus::Failed;
        self.blackboard.set_conditions(Conditions::TASK_FAILED);
    }

    /// Runs once when `task` becomes active.
    pub(crate) fn start_task(&mut self, world: &dyn AiWorld, task: Task) {
        match task {
            Task::StopMoving => {
                self.stop_moving();
                self.task_complete();
            },
            Task::Wait(secs) | Task::WaitFaceEnemy(secs) => {
                self.wait_until = world.time() + secs;
            },
            Task::WaitIndefinite => {},
            Task::Die => {
                self.stop_moving();
                self.ideal_activity = Activity::Die;
                self.events.push(MonsterEvent::Died);
            },
            Task::WaitForMovement => {
                if self.route.movement_is_complete() {
                    self.task_complete();
                } else if self.move_speed <= 0.0 {
                    self.set_movement(false);
                }
            },
            Task::FaceIdeal => self.start_facing(),
            Task::FaceEnemy | Task::FaceRoute | Task::FaceTarget | Task::FaceSound => {
                match self.face_point(world, task) {
                    Some(point) => {
                        self.set_ideal_yaw_toward(point);
                        self.start_facing();
                    },
                    None => self.task_fail(),
                }
            },
            Task::SetActivity(activity) => {
                self.ideal_activity = activity;
                self.task_complete();
            },
            Task::PlaySequence(activity) => {
                self.ideal_activity = activity;
                self.sequence_serial += 1;
            },
            Task::SetFailSchedule(kind) => {
                self.fail_override = Some(kind);
                self.task_complete();
            },
            Task::SuggestState(state) => {
                self.ideal_state = state;
                self.task_complete();
            },
            Task::Remember(mask) => {
                self.blackboard.remember(mask);
                self.task_complete();
            },
            Task::Forget(mask) => {
                self.blackboard.forget(mask);
                self.task_complete();
            },
            Task::GetPathToEnemy => {
                let goal = self
                    .enemy
                    .current()
                    .and_then(|h| world.resolve(h).map(|info| (h, info.position)));
                match goal {
                    Some((handle, position)) => {
                        self.finish_with_route(world, position, WaypointFlags::TO_ENEMY, Some(handle));
                    },
                    None => self.task_fail(),
                }
            },
            Task::GetPathToEnemyLkp => {
                if self.enemy.has_enemy() || self.blackboard.has_memory(Memory::SUSPICIOUS) {
                    let lkp = self.enemy.last_known_position();
                    self.finish_with_route(world, lkp, WaypointFlags::TO_LOCATION, None);
                } else {
                    self.task_fail();
                }
            },
            Task::GetPathToTarget => {
                let goal = self
                    .target
                    .and_then(|h| world.resolve(h).map(|info| (h, info.position)));
                match goal {
                    Some((handle, position)) => {
                        self.finish_with_route(world, position, WaypointFlags::TO_TARGET, Some(handle));
                    },
                    None => self.task_fail(),
                }
            },
            Task::GetPathToSpot(spot) => {
                self.finish_with_route(world, spot, WaypointFlags::TO_LOCATION, None);
            },
            Task::GetPathToSound => match self.heard {
                Some(sound) => self.finish_with_route(world, sound.position, WaypointFlags::TO_LOCATION, None),
                None => self.task_fail(),
            },
            Task::FindCoverFromEnemy(distance) => {
                if self.enemy.has_enemy() {
                    let spot = self.cover_spot(distance);
                    self.finish_with_route(world, spot, WaypointFlags::TO_LOCATION, None);
                } else {
                    self.task_fail();
                }
            },
            Task::WalkPath | Task::RunPath => {
                self.set_movement(task == Task::RunPath);
                self.task_complete();
            },
            Task::MoveToTargetRange(range) => match self.chase_goal(world) {
                Some((handle, position, flags)) => {
                    if position.distance(self.position) <= range {
                        self.task_complete();
                    } else if self.build_route(world, position, flags, Some(handle)) {
                        self.set_movement(true);
                    } else {
                        self.task_fail();
                    }
                },
                None => self.task_fail(),
            },
            Task::RangeAttack1 | Task::RangeAttack2 | Task::MeleeAttack1 | Task::MeleeAttack2 => {
                let Some(enemy) = self.enemy.current() else {
                    self.task_fail();
                    return;
                };
                let lkp = self.enemy.last_known_position();
                self.set_ideal_yaw_toward(lkp);
                if let Some(activity) = task.attack_activity() {
                    self.ideal_activity = activity;
                    self.sequence_serial += 1;
                    self.events.push(MonsterEvent::Attack {
                        activity,
                        target: enemy,
                    });
                }
            },
            Task::ForgetEnemy => {
                self.enemy.clear_current();
                self.task_complete();
            },
            Task::Custom { id, value } => {
                let behavior = self.behavior();
                behavior.start_custom_task(self, world, id, value);
            },
        }
    }

    /// Runs every think while the active task is running.
    pub(crate) fn run_task(&mut self, world: &dyn AiWorld, task: Task) {
        match task {
            Task::Wait(_) => {
                if world.time() >= self.wait_until {
                    self.task_complete();
                }
            },
            Task::WaitFaceEnemy(_) => {
                if self.enemy.has_enemy() {
                    let lkp = self.enemy.last_known_position();
                    self.set_ideal_yaw_toward(lkp);
                }
                if world.time() >= self.wait_until {
                    self.task_complete();
                }
            },
            Task::WaitForMovement => {
                if self.blackboard.has_memory(Memory::MOVE_FAILED) {
                    self.task_fail();
                } else if self.route.movement_is_complete() {
                    self.task_complete();
                }
            },
            Task::FaceIdeal => self.run_facing(),
            Task::FaceEnemy | Task::FaceRoute | Task::FaceTarget | Task::FaceSound => {
                if let Some(point) = self.face_point(world, task) {
                    self.set_ideal_yaw_toward(point);
                }
                self.run_facing();
            },
            Task::PlaySequence(_)
            | Task::RangeAttack1
            | Task::RangeAttack2
            | Task::MeleeAttack1
            | Task::MeleeAttack2 => {
                if world.sequence_finished(self.handle) {
                    self.task_complete();
                }
            },
            Task::MoveToTargetRange(range) => match self.chase_goal(world) {
                Some((handle, position, flags)) => {
                    if position.distance(self.position) <= range {
                        self.stop_moving();
                        self.task_complete();
                    } else if self.blackboard.has_memory(Memory::MOVE_FAILED) {
                        self.task_fail();
                    } else if self.route.movement_is_complete() {
                        if self.build_route(world, position, flags, Some(handle)) {
                            self.set_movement(true);
                        } else {
                            self.task_fail();
                        }
                    }
                },
                None => {
                    self.stop_moving();
                    self.task_fail();
                },
            },
            Task::Custom { id, value } => {
                let behavior = self.behavior();
                behavior.run_custom_task(self, world, id, value);
            },
            // Die and WaitIndefinite hold until the schedule is replaced;
            // everything else finishes in start_task.
            _ => {},
        }
    }

    fn finish_with_route(
        &mut self,
        world: &dyn AiWorld,
        goal: Vec3,
        flags: WaypointFlags,
        target: Option<EntityHandle>,
    ) {
        if self.build_route(world, goal, flags, target) {
            self.task_complete();
        } else {
            self.task_fail();
        }
    }

    fn face_point(&self, world: &dyn AiWorld, task: Task) -> Option<Vec3> {
        match task {
            Task::FaceEnemy => self.enemy.has_enemy().then(|| self.enemy.last_known_position()),
            Task::FaceRoute => self.route.current().map(|w| w.position),
            Task::FaceTarget => self.target.and_then(|h| world.resolve(h)).map(|info| info.position),
            Task::FaceSound => self.heard.map(|s| s.position),
            _ => None,
        }
    }

    fn chase_goal(&self, world: &dyn AiWorld) -> Option<(EntityHandle, Vec3, WaypointFlags)> {
        if let Some(target) = self.target {
            return world
                .resolve(target)
                .map(|info| (target, info.position, WaypointFlags::TO_TARGET));
        }
        let enemy = self.enemy.current()?;
        world
            .resolve(enemy)
            .map(|info| (enemy, info.position, WaypointFlags::TO_ENEMY))
    }

    fn cover_spot(&self, distance: f32) -> Vec3 {
        let away = flat(self.position - self.enemy.last_known_position());
        let dir = if away.length_squared() > f32::EPSILON {
            away.normalize().extend(0.0)
        } else {
            -yaw_forward(self.yaw)
        };
        self.position + dir * distance
    }

    fn start_facing(&mut self) {
        let delta = yaw_delta(self.yaw, self.ideal_yaw);
        if delta.abs() <= self.kind.tuning.face_tolerance {
            self.task_complete();
        } else {
            self.ideal_activity = if delta > 0.0 {
                Activity::TurnLeft
            } else {
                Activity::TurnRight
            };
        }
    }

    fn run_facing(&mut self) {
        if self.facing_ideal() {
            self.ideal_activity = self.behavior().stopped_activity(self);
            self.task_complete();
        }
    }

    pub(crate) fn set_ideal_yaw_toward(&mut self, point: Vec3) {
        let delta = point - self.position;
        if flat(delta).length_squared() > f32::EPSILON {
            self.ideal_yaw = vec_to_yaw(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monster::test_support::{monster_with, single_task_set};
    use crate::relationship::EntityClass;
    use crate::world::{EntityInfo, MockWorld};
    use proptest::prelude::*;

    #[test]
    fn test_task_complete_after_fail_is_noop() {
        let world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.task_begin();
        monster.task_fail();
        monster.task_complete();
        assert_eq!(monster.task_status(), TaskStatus::Failed);
        assert!(monster.has_conditions(Conditions::TASK_FAILED));
    }

    #[test]
    fn test_task_begin_from_any_state() {
        let world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.task_fail();
        monster.task_begin();
        assert_eq!(monster.task_status(), TaskStatus::Running);
    }

    #[test]
    fn test_latched_failure_blocks_completion() {
        let world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.task_fail();
        monster.task_begin();
        monster.task_complete();
        assert_eq!(monster.task_status(), TaskStatus::Running);
        assert!(monster.has_conditions(Conditions::TASK_FAILED));
    }

    #[test]
    fn test_wait_completes_after_duration() {
        let mut world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::Wait(1.0)), &world);
        monster.task_begin();
        monster.start_task(&world, Task::Wait(1.0));
        monster.run_task(&world, Task::Wait(1.0));
        assert_eq!(monster.task_status(), TaskStatus::Running);

        world.advance(1.0);
        monster.run_task(&world, Task::Wait(1.0));
        assert_eq!(monster.task_status(), TaskStatus::Complete);
    }

    #[test]
    fn test_path_to_enemy_without_enemy_fails() {
        let world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::GetPathToEnemy), &world);
        monster.task_begin();
        monster.start_task(&world, Task::GetPathToEnemy);
        assert_eq!(monster.task_status(), TaskStatus::Failed);
    }

    #[test]
    fn test_unreachable_path_sets_no_route() {
        let mut world = MockWorld::new();
        world.set_unreachable();
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.task_begin();
        monster.start_task(&world, Task::GetPathToSpot(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(monster.task_status(), TaskStatus::Failed);
        assert!(monster.has_conditions(Conditions::NO_ROUTE | Conditions::TASK_FAILED));
    }

    #[test]
    fn test_path_and_walk() {
        let world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.task_begin();
        monster.start_task(&world, Task::GetPathToSpot(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(monster.task_status(), TaskStatus::Complete);
        assert_eq!(monster.route().len(), 1);

        monster.task_begin();
        monster.start_task(&world, Task::RunPath);
        assert_eq!(monster.movement_activity(), Activity::Run);
    }

    #[test]
    fn test_attack_emits_event() {
        let mut world = MockWorld::new();
        let player = world.spawn(EntityInfo::player(Vec3::new(1.0, 0.0, 0.0)));
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.enemy_mut().push_enemy(player, Vec3::new(1.0, 0.0, 0.0));

        monster.task_begin();
        monster.start_task(&world, Task::MeleeAttack1);
        assert_eq!(monster.ideal_activity(), Activity::MeleeAttack1);
        let events = monster.drain_events();
        assert!(events.contains(&MonsterEvent::Attack {
            activity: Activity::MeleeAttack1,
            target: player,
        }));

        monster.run_task(&world, Task::MeleeAttack1);
        assert_eq!(monster.task_status(), TaskStatus::Complete);
    }

    #[test]
    fn test_face_enemy_sets_ideal_yaw() {
        let mut world = MockWorld::new();
        let enemy = world.spawn(EntityInfo::new(EntityClass::HumanMilitary, Vec3::new(0.0, 5.0, 0.0)));
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.enemy_mut().push_enemy(enemy, Vec3::new(0.0, 5.0, 0.0));

        monster.task_begin();
        monster.start_task(&world, Task::FaceEnemy);
        assert!((monster.ideal_yaw() - 90.0).abs() < 0.01);
        assert_eq!(monster.task_status(), TaskStatus::Running);
        assert_eq!(monster.ideal_activity(), Activity::TurnLeft);
    }

    #[test]
    fn test_cover_spot_points_away() {
        let mut world = MockWorld::new();
        let enemy = world.spawn(EntityInfo::new(EntityClass::HumanMilitary, Vec3::new(5.0, 0.0, 0.0)));
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.enemy_mut().push_enemy(enemy, Vec3::new(5.0, 0.0, 0.0));

        monster.task_begin();
        monster.start_task(&world, Task::FindCoverFromEnemy(8.0));
        assert_eq!(monster.task_status(), TaskStatus::Complete);
        let goal = monster.route().goal_position();
        assert!((goal.x + 8.0).abs() < 0.01);
    }

    #[test]
    fn test_suggest_state_and_fail_schedule() {
        let world = MockWorld::new();
        let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
        monster.task_begin();
        monster.start_task(&world, Task::SuggestState(MonsterState::Alert));
        assert_eq!(monster.ideal_state(), MonsterState::Alert);

        monster.task_begin();
        monster.start_task(&world, Task::SetFailSchedule(ScheduleType::CombatFace));
        assert_eq!(monster.fail_override, Some(ScheduleType::CombatFace));
    }

    fn status_strategy() -> impl Strategy<Value = u8> {
        0u8..4
    }

    proptest! {
        #[test]
        fn prop_task_status_transitions(ops in proptest::collection::vec(status_strategy(), 1..40)) {
            let world = MockWorld::new();
            let mut monster = monster_with(single_task_set(Task::WaitIndefinite), &world);
            for op in ops {
                let before = monster.task_status();
                match op {
                    0 => {
                        monster.task_begin();
                        prop_assert_eq!(monster.task_status(), TaskStatus::Running);
                    },
                    1 => {
                        monster.task_complete();
                        if before == TaskStatus::Failed {
                            prop_assert_eq!(monster.task_status(), TaskStatus::Failed);
                        } else {
                            prop_assert_eq!(monster.task_status(), TaskStatus::Complete);
                        }
                    },
                    2 => {
                        monster.task_fail();
                        prop_assert_eq!(monster.task_status(), TaskStatus::Failed);
                        prop_assert!(monster.has_conditions(Conditions::TASK_FAILED));
                    },
                    _ => {
                        monster.next_scheduled_task();
                        prop_assert_eq!(monster.task_status(), TaskStatus::NotRunning);
                    },
                }
            }
        }
    }
}
