//! Class relationships: how one kind of entity regards another.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Classification of an entity for relationship lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityClass {
    /// Not classified; ignored by everyone
    #[default]
    None,
    /// Turrets, sentries
    Machine,
    /// The player
    Player,
    /// Civilians
    HumanPassive,
    /// Soldiers
    HumanMilitary,
    /// Alien soldiers
    AlienMilitary,
    /// Harmless aliens
    AlienPassive,
    /// Hostile alien creatures
    AlienMonster,
    /// Small creatures that get eaten
    AlienPrey,
    /// Creatures that eat prey
    AlienPredator,
    /// Bugs
    Insect,
    /// Guards and friendly NPCs
    PlayerAlly,
}

/// How one entity regards another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Relationship {
    /// Fights alongside
    Ally,
    /// Runs away from
    Fear,
    /// Ignores
    #[default]
    Neutral,
    /// Attacks when nothing better is around
    Dislike,
    /// Attacks
    Hate,
    /// Attacks before anything else
    Nemesis,
}

impl Relationship {
    /// Checks if this relationship makes the other entity an enemy.
    #[must_use]
    pub const fn is_hostile(self) -> bool {
        matches!(self, Self::Dislike | Self::Hate | Self::Nemesis)
    }

    /// Target priority; higher is more urgent. Zero for non-hostile.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Nemesis => 3,
            Self::Hate => 2,
            Self::Dislike => 1,
            Self::Ally | Self::Fear | Self::Neutral => 0,
        }
    }
}

/// Relationship matrix with per-pair overrides.
#[derive(Debug, Clone, Default)]
pub struct RelationshipTable {
    overrides: AHashMap<(EntityClass, EntityClass), Relationship>,
}

impl RelationshipTable {
    /// Creates a table using only the built-in matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides how `subject` regards `other`.
    pub fn set(&mut self, subject: EntityClass, other: EntityClass, relationship: Relationship) {
        self.overrides.insert((subject, other), relationship);
    }

    /// Builder form of [`Self::set`].
    #[must_use]
    pub fn with(mut self, subject: EntityClass, other: EntityClass, relationship: Relationship) -> Self {
        self.set(subject, other, relationship);
        self
    }

    /// How `subject` regards `other`.
    #[must_use]
    pub fn relationship(&self, subject: EntityClass, other: EntityClass) -> Relationship {
        self.overrides
            .get(&(subject, other))
            .copied()
            .unwrap_or_else(|| default_relationship(subject, other))
    }
}

/// Built-in relationship matrix.
#[must_use]
pub const fn default_relationship(subject: EntityClass, other: EntityClass) -> Relationship {
    use EntityClass as C;
    use Relationship as R;

    match (subject, other) {
        (C::None, _) | (_, C::None) => R::Neutral,

        // The player's side
        (C::Player | C::PlayerAlly, C::Player | C::PlayerAlly | C::HumanPassive) => R::Ally,
        (C::Player | C::PlayerAlly, C::HumanMilitary | C::AlienMilitary | C::AlienMonster | C::AlienPredator | C::Machine) => R::Hate,
        (C::Player | C::PlayerAlly, C::AlienPrey | C::Insect) => R::Dislike,
        (C::Player | C::PlayerAlly, C::AlienPassive) => R::Neutral,
        (C::HumanPassive, C::Player | C::PlayerAlly | C::HumanPassive) => R::Ally,
        (C::HumanPassive, C::AlienPassive | C::Insect) => R::Neutral,
        (C::HumanPassive, _) => R::Fear,

        // Soldiers and their machines
        (C::HumanMilitary | C::Machine, C::HumanMilitary | C::Machine) => R::Ally,
        (C::HumanMilitary | C::Machine, C::Player) => R::Nemesis,
        (C::HumanMilitary | C::Machine, C::AlienPassive | C::Insect) => R::Neutral,
        (C::HumanMilitary | C::Machine, _) => R::Hate,

        // Alien soldiers
        (C::AlienMilitary, C::AlienMilitary | C::AlienMonster) => R::Ally,
        (C::AlienMilitary, C::AlienPassive | C::AlienPrey | C::AlienPredator | C::Insect) => R::Neutral,
        (C::AlienMilitary, C::HumanMilitary) => R::Nemesis,
        (C::AlienMilitary, _) => R::Hate,

        // Creatures
        (C::AlienMonster, C::AlienMonster | C::AlienMilitary) => R::Ally,
        (C::AlienMonster, C::Player | C::PlayerAlly | C::HumanPassive | C::HumanMilitary) => R::Hate,
        (C::AlienMonster, _) => R::Neutral,
        (C::AlienPredator, C::AlienPrey) => R::Hate,
        (C::AlienPredator, C::Player | C::PlayerAlly | C::HumanPassive | C::HumanMilitary) => R::Dislike,
        (C::AlienPredator, _) => R::Neutral,
        (C::AlienPrey, C::AlienPredator) => R::Fear,
        (C::AlienPrey, C::Player | C::PlayerAlly | C::HumanPassive | C::HumanMilitary) => R::Dislike,
        (C::AlienPrey, _) => R::Neutral,
        (C::AlienPassive, _) => R::Neutral,
        (C::Insect, C::Insect) => R::Neutral,
        (C::Insect, _) => R::Fear,
    }
}
