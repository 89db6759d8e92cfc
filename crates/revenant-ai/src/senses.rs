//! Sight, hearing, smell, and keeping the current enemy honest.

use crate::conditions::{Conditions, Memory};
use crate::enemy::EnemyStatus;
use crate::monster::{Capabilities, Monster};
use crate::relationship::Relationship;
use crate::world::{AiWorld, EntityInfo, Sound, SoundKind};
use glam::Vec3;
use revenant_common::{flat, yaw_forward, EntityHandle};
use tracing::trace;

/// An enemy looking at the monster at least this directly faces it.
pub const ENEMY_FACING_DOT: f32 = 0.8;

/// Sound categories that are heard rather than smelled.
const AUDIBLE: SoundKind = SoundKind::COMBAT
    .union(SoundKind::WORLD)
    .union(SoundKind::PLAYER)
    .union(SoundKind::DANGER);

/// Sound categories that are smelled.
const SCENTS: SoundKind = SoundKind::CARCASS.union(SoundKind::MEAT).union(SoundKind::GARBAGE);

/// Scents that count as food.
const FOOD: SoundKind = SoundKind::CARCASS.union(SoundKind::MEAT);

struct Sighting {
    handle: EntityHandle,
    position: Vec3,
    relationship: Relationship,
    distance: f32,
}

impl Sighting {
    fn outranks(&self, other: &Self) -> bool {
        let (mine, theirs) = (self.relationship.priority(), other.relationship.priority());
        mine > theirs || (mine == theirs && self.distance < other.distance)
    }
}

impl Monster {
    /// How this monster regards `info`.
    ///
    /// A provoked monster hates clients it would otherwise leave alone.
    #[must_use]
    pub fn relationship_to(&self, info: &EntityInfo) -> Relationship {
        let relationship = self.kind.relationships.relationship(self.kind.class, info.class);
        if info.is_client && !relationship.is_hostile() && self.blackboard.has_memory(Memory::PROVOKED) {
            Relationship::Hate
        } else {
            relationship
        }
    }

    /// Checks if `point` lies within the horizontal view cone.
    #[must_use]
    pub fn in_view_cone(&self, point: Vec3) -> bool {
        let to_point = flat(point - self.position);
        if to_point.length_squared() <= f32::EPSILON {
            return true;
        }
        flat(yaw_forward(self.yaw)).dot(to_point.normalize()) >= self.kind.tuning.field_of_view
    }

    fn can_see(&self, world: &dyn AiWorld, info: &EntityInfo) -> bool {
        info.position.distance(self.position) <= self.kind.tuning.sight_range
            && self.in_view_cone(info.position)
            && world.line_of_sight(self.eye(), info.eye())
    }

    /// Classifies everything in view and picks up the best enemy.
    ///
    /// The current enemy is kept while it stays visible unless something
    /// of higher priority shows up.
    pub(crate) fn look(&mut self, world: &dyn AiWorld) {
        let mut seen = Conditions::empty();
        let mut best: Option<Sighting> = None;
        let mut current_seen: Option<Relationship> = None;

        for handle in world.entities_near(self.position, self.kind.tuning.sight_range) {
            if handle == self.handle {
                continue;
            }
            let Some(info) = world.resolve(handle) else {
                continue;
            };
            if !info.alive || !self.can_see(world, &info) {
                continue;
            }

            if info.is_client {
                seen |= Conditions::SEE_CLIENT;
            }
            let relationship = self.relationship_to(&info);
            seen |= match relationship {
                Relationship::Fear => Conditions::SEE_FEAR,
                Relationship::Dislike => Conditions::SEE_DISLIKE,
                Relationship::Hate => Conditions::SEE_HATE,
                Relationship::Nemesis => Conditions::SEE_NEMESIS,
                Relationship::Ally | Relationship::Neutral => Conditions::empty(),
            };
            if !relationship.is_hostile() {
                continue;
            }

            if self.enemy.current() == Some(handle) {
                current_seen = Some(relationship);
            }
            let sighting = Sighting {
                handle,
                position: info.position,
                relationship,
                distance: info.position.distance(self.position),
            };
            if best.as_ref().map_or(true, |b| sighting.outranks(b)) {
                best = Some(sighting);
            }
        }

        self.blackboard.set_conditions(seen);

        let Some(best) = best else {
            return;
        };
        let switch = current_seen.map_or(true, |current| best.relationship.priority() > current.priority());
        if switch && self.enemy.push_enemy(best.handle, best.position) {
            trace!("Monster {} spotted enemy {}", self.handle, best.handle);
            self.blackboard.set_conditions(Conditions::NEW_ENEMY);
        }
    }

    /// Picks up sounds and scents the kind and the active schedule care about.
    pub(crate) fn listen(&mut self, world: &dyn AiWorld) {
        if !self.kind.capabilities.contains(Capabilities::HEAR) {
            return;
        }
        let schedule_mask = self.current_schedule().map_or(SoundKind::all(), |s| s.sound_mask);
        let mask = self.kind.sound_mask & schedule_mask;
        if mask.is_empty() {
            return;
        }

        let sounds: Vec<Sound> = world
            .sounds_near(self.position, self.kind.tuning.hearing_range)
            .into_iter()
            .filter(|s| s.kind.intersects(mask))
            .collect();

        for sound in &sounds {
            if sound.kind.intersects(SCENTS) {
                self.blackboard.set_conditions(Conditions::SMELL);
            }
            if sound.kind.intersects(FOOD) {
                self.blackboard.set_conditions(Conditions::SMELL_FOOD);
            }
        }

        let origin = self.position;
        let closest = sounds
            .into_iter()
            .filter(|s| s.kind.intersects(AUDIBLE))
            .min_by(|a, b| {
                a.position
                    .distance_squared(origin)
                    .total_cmp(&b.position.distance_squared(origin))
            });
        if let Some(sound) = closest {
            self.blackboard.set_conditions(Conditions::HEAR_SOUND);
            self.heard = Some(sound);
        }
    }

    /// Re-validates the current enemy and raises the enemy conditions.
    pub fn check_enemy(&mut self, world: &dyn AiWorld) -> EnemyStatus {
        let Some(handle) = self.enemy.current() else {
            return EnemyStatus::Drop;
        };
        let Some(info) = world.resolve(handle) else {
            trace!("Monster {} lost track of {}", self.handle, handle);
            self.lose_enemy();
            return EnemyStatus::Drop;
        };
        if !info.alive {
            self.blackboard.set_conditions(Conditions::ENEMY_DEAD);
            self.blackboard.remember(Memory::KILLED);
            return EnemyStatus::Drop;
        }
        if !self.relationship_to(&info).is_hostile() {
            return EnemyStatus::Drop;
        }

        let tuning = &self.kind.tuning;
        let distance = info.position.distance(self.position);
        let visible = self.can_see(world, &info);
        if distance > tuning.max_enemy_distance {
            if !visible {
                self.lose_enemy();
                return EnemyStatus::Drop;
            }
            self.blackboard.set_conditions(Conditions::ENEMY_TOO_FAR);
        }

        let to_me = (self.position - info.position).normalize_or_zero();
        if info.forward.dot(to_me) > ENEMY_FACING_DOT {
            self.blackboard.set_conditions(Conditions::ENEMY_FACING_ME);
        }

        if visible {
            self.blackboard.set_conditions(Conditions::SEE_ENEMY);
            self.enemy.set_last_known_position(info.position);
            self.check_attacks(info.position, distance);
        } else {
            self.blackboard.set_conditions(Conditions::ENEMY_OCCLUDED);
        }

        if self.blackboard.has_conditions(Conditions::NEW_ENEMY) {
            EnemyStatus::NewlyAcquired
        } else {
            EnemyStatus::Usable
        }
    }

    /// Drops unusable enemies until a usable one or none is left.
    pub(crate) fn update_enemy(&mut self, world: &dyn AiWorld) {
        while self.check_enemy(world) == EnemyStatus::Drop {
            if !self.enemy.pop_enemy(world) {
                return;
            }
            self.blackboard.set_conditions(Conditions::NEW_ENEMY);
        }
    }

    fn lose_enemy(&mut self) {
        self.blackboard.set_conditions(Conditions::ENEMY_LOST);
        self.blackboard.remember(Memory::SUSPICIOUS);
        self.enemy.clear_current();
    }

    fn check_attacks(&mut self, enemy_position: Vec3, distance: f32) {
        let dot = flat(yaw_forward(self.yaw)).dot(flat(enemy_position - self.position).normalize_or_zero());
        let behavior = self.behavior();

        let checks = [
            (behavior.check_range_attack1(self, dot, distance), Conditions::CAN_RANGE_ATTACK1),
            (behavior.check_range_attack2(self, dot, distance), Conditions::CAN_RANGE_ATTACK2),
            (behavior.check_melee_attack1(self, dot, distance), Conditions::CAN_MELEE_ATTACK1),
            (behavior.check_melee_attack2(self, dot, distance), Conditions::CAN_MELEE_ATTACK2),
        ];
        for (ok, condition) in checks {
            if ok {
                self.blackboard.set_conditions(condition);
            }
        }
    }
}
