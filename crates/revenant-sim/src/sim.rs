//! Simulation loop: spawns the agents, ticks them, and resolves what they do.

use crate::config::{MonsterSpawn, SimConfig};
use crate::world::GridWorld;
use anyhow::Result;
use glam::Vec3;
use revenant_ai::{
    Activity, AiTuning, AiWorld, Capabilities, EntityInfo, Monster, MonsterEvent, MonsterKind, MonsterState,
    Sound, SoundKind,
};
use revenant_common::{yaw_forward, EntityHandle};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Extra reach granted to melee hits over the kind's melee range.
const MELEE_REACH_SLACK: f32 = 1.5;
/// Audible radius of a ranged attack.
const RANGED_ATTACK_VOLUME: f32 = 15.0;
/// How far a corpse can be smelled.
const CORPSE_SCENT_RADIUS: f32 = 10.0;

/// Per-agent counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentStats {
    /// Attacks started
    pub attacks: u32,
    /// Attacks that landed
    pub hits: u32,
    /// Damage dealt
    pub damage_dealt: f32,
    /// State changes seen
    pub state_changes: u32,
    /// Tick the agent died on
    pub died_at: Option<u64>,
}

/// End-of-run summary line for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReport {
    /// Kind name
    pub name: String,
    /// Final state
    pub state: MonsterState,
    /// Remaining health
    pub health: f32,
    /// Final position
    pub position: Vec3,
    /// Name of the running schedule
    pub schedule: Option<String>,
    /// Schedules selected over the run
    pub schedule_changes: u64,
    /// Counters
    pub stats: AgentStats,
}

/// A monster and what the host tracks about it.
#[derive(Debug)]
struct Agent {
    name: String,
    monster: Monster,
    damage: f32,
    stats: AgentStats,
}

/// The player: walks a patrol loop and shoots the nearest monster in range.
#[derive(Debug)]
struct Player {
    handle: EntityHandle,
    patrol: Vec<Vec3>,
    next_waypoint: usize,
    health: f32,
    next_shot: f32,
}

/// Settings the loop needs after setup.
#[derive(Debug, Clone, Copy)]
struct Rules {
    dt: f32,
    player_speed: f32,
    player_damage: f32,
    player_range: f32,
    player_fire_interval: f32,
    gunshot_volume: f32,
    sound_lifetime: f32,
    scent_lifetime: f32,
}

/// A running simulation.
#[derive(Debug)]
pub struct Simulation {
    world: GridWorld,
    player: Player,
    agents: Vec<Agent>,
    rules: Rules,
    tick: u64,
}

/// Builds a monster kind from a spawn entry.
fn build_kind(spawn: &MonsterSpawn) -> MonsterKind {
    let attack = if spawn.ranged {
        Capabilities::RANGE_ATTACK1
    } else {
        Capabilities::MELEE_ATTACK1
    };
    let tuning = spawn
        .tuning
        .as_ref()
        .map_or_else(AiTuning::default, AiTuning::load_from);

    MonsterKind::new(spawn.name.clone(), spawn.class)
        .with_locomotion(spawn.locomotion)
        .with_capabilities(attack | Capabilities::HEAR)
        .with_tuning(tuning)
}

fn floor_point(p: [f32; 2]) -> Vec3 {
    Vec3::new(p[0], p[1], 0.0)
}

impl Simulation {
    /// Sets up the grid, the player and every configured monster.
    #[must_use]
    pub fn new(config: &SimConfig) -> Self {
        let mut world = GridWorld::from_config(config);

        let player_start = floor_point(config.player_start);
        let player = Player {
            handle: world.spawn(EntityInfo::player(player_start)),
            patrol: config.player_patrol.iter().copied().map(floor_point).collect(),
            next_waypoint: 0,
            health: config.player_health,
            next_shot: 0.0,
        };

        let agents = config
            .monsters
            .iter()
            .map(|spawn| {
                let kind = Arc::new(build_kind(spawn));
                let position = floor_point(spawn.position);
                let mut info = EntityInfo::new(spawn.class, position);
                info.view_height = kind.tuning.view_height;
                let handle = world.spawn(info);

                let monster = Monster::new(handle, kind, position);
                world.sync_agent(
                    handle,
                    position,
                    yaw_forward(monster.yaw()),
                    true,
                    monster.activity(),
                    monster.sequence_serial(),
                );
                debug!("Spawned {} as {handle} at {position}", spawn.name);

                Agent {
                    name: spawn.name.clone(),
                    monster,
                    damage: spawn.damage,
                    stats: AgentStats::default(),
                }
            })
            .collect();

        info!(
            "Simulation ready: {}x{} grid, {} monsters",
            config.width,
            config.height,
            config.monsters.len()
        );

        Self {
            world,
            player,
            agents,
            rules: Rules {
                dt: config.dt,
                player_speed: config.player_speed,
                player_damage: config.player_damage,
                player_range: config.player_range,
                player_fire_interval: config.player_fire_interval,
                gunshot_volume: config.gunshot_volume,
                sound_lifetime: config.sound_lifetime,
                scent_lifetime: config.scent_lifetime,
            },
            tick: 0,
        }
    }

    /// Runs `ticks` ticks, logging a report every `report_interval` ticks.
    pub fn run(&mut self, ticks: u32, report_interval: u32) {
        for _ in 0..ticks {
            self.step();
            if report_interval > 0 && self.tick % u64::from(report_interval) == 0 {
                for report in self.report() {
                    info!(
                        "[tick {}] {}: {:?} hp={:.0} schedule={}",
                        self.tick,
                        report.name,
                        report.state,
                        report.health,
                        report.schedule.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }

    /// Advances the simulation by one tick.
    pub fn step(&mut self) {
        let dt = self.rules.dt;
        let mut events = Vec::new();

        for (index, agent) in self.agents.iter_mut().enumerate() {
            agent.monster.think(&self.world, dt);

            let monster = &agent.monster;
            self.world.sync_agent(
                monster.handle(),
                monster.position(),
                yaw_forward(monster.yaw()),
                monster.is_alive(),
                monster.activity(),
                monster.sequence_serial(),
            );
            events.extend(agent.monster.drain_events().into_iter().map(|e| (index, e)));
        }

        for (index, event) in events {
            self.resolve_event(index, event);
        }

        self.step_player();
        self.world.advance(dt);
        self.tick += 1;
    }

    fn resolve_event(&mut self, index: usize, event: MonsterEvent) {
        match event {
            MonsterEvent::Attack { activity, target } => {
                let agent = &self.agents[index];
                let attacker = agent.monster.handle();
                let origin = agent.monster.position();
                let damage = agent.damage;
                let melee = matches!(activity, Activity::MeleeAttack1 | Activity::MeleeAttack2);
                let tuning = &agent.monster.kind().tuning;
                let reach = if melee {
                    tuning.melee_range * MELEE_REACH_SLACK
                } else {
                    tuning.range_attack_max
                };

                let landed = self.world.resolve(target).is_some_and(|info| {
                    info.alive
                        && info.position.distance(origin) <= reach
                        && self.world.line_of_sight(origin, info.position)
                });
                if !melee {
                    self.world.emit_sound(
                        Sound::new(SoundKind::COMBAT, origin, RANGED_ATTACK_VOLUME),
                        self.rules.sound_lifetime,
                    );
                }

                let stats = &mut self.agents[index].stats;
                stats.attacks += 1;
                if landed {
                    stats.hits += 1;
                    stats.damage_dealt += damage;
                    self.apply_damage(attacker, target, damage);
                }
            },
            MonsterEvent::Died => {
                let agent = &mut self.agents[index];
                agent.stats.died_at = Some(self.tick);
                info!("{} died at tick {}", agent.name, self.tick);
                let corpse = Sound::new(SoundKind::CARCASS, agent.monster.position(), CORPSE_SCENT_RADIUS);
                self.world.emit_sound(corpse, self.rules.scent_lifetime);
            },
            MonsterEvent::StateChanged { from, to } => {
                let agent = &mut self.agents[index];
                agent.stats.state_changes += 1;
                debug!("{}: {from:?} -> {to:?}", agent.name);
            },
        }
    }

    fn apply_damage(&mut self, attacker: EntityHandle, target: EntityHandle, amount: f32) {
        if target == self.player.handle {
            self.player.health -= amount;
            if self.player.health <= 0.0 {
                info!("Player killed at tick {}", self.tick);
                if let Some(info) = self.world.entity_mut(target) {
                    info.alive = false;
                }
            }
            return;
        }

        if let Some(victim) = self.agents.iter_mut().find(|a| a.monster.handle() == target) {
            victim.monster.take_damage(&self.world, Some(attacker), amount);
        }
    }

    fn step_player(&mut self) {
        if self.player.health <= 0.0 {
            return;
        }
        let Some(info) = self.world.entity(self.player.handle).copied() else {
            return;
        };

        // Walk the patrol loop
        let mut position = info.position;
        let mut forward = info.forward;
        if let Some(&waypoint) = self.player.patrol.get(self.player.next_waypoint) {
            let step = self.rules.player_speed * self.rules.dt;
            let to_waypoint = waypoint - position;
            if to_waypoint.length() <= step {
                position = waypoint;
                self.player.next_waypoint = (self.player.next_waypoint + 1) % self.player.patrol.len();
            } else {
                let next = position + to_waypoint.normalize() * step;
                if self.world.check_local_move(position, next, None).is_valid() {
                    position = next;
                    forward = to_waypoint.normalize();
                } else {
                    self.player.next_waypoint = (self.player.next_waypoint + 1) % self.player.patrol.len();
                }
            }
        }
        if let Some(info) = self.world.entity_mut(self.player.handle) {
            info.position = position;
            info.forward = forward;
        }

        // Shoot the nearest monster in sight
        let now = self.world.time();
        if now < self.player.next_shot || self.rules.player_damage <= 0.0 {
            return;
        }
        let eye = position + Vec3::Z * info.view_height;
        let target = self
            .agents
            .iter()
            .filter(|a| a.monster.is_alive())
            .map(|a| (a.monster.handle(), a.monster.position().distance(position), a.monster.eye()))
            .filter(|&(_, distance, target_eye)| {
                distance <= self.rules.player_range && self.world.line_of_sight(eye, target_eye)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(handle, _, _)| handle);

        if let Some(target) = target {
            debug!("Player shoots {target}");
            self.world.emit_sound(
                Sound::new(SoundKind::COMBAT, position, self.rules.gunshot_volume),
                self.rules.sound_lifetime,
            );
            self.apply_damage(self.player.handle, target, self.rules.player_damage);
            self.player.next_shot = now + self.rules.player_fire_interval;
        }
    }

    /// Ticks simulated so far.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Remaining player health.
    #[must_use]
    pub const fn player_health(&self) -> f32 {
        self.player.health
    }

    /// The world the agents live in.
    #[must_use]
    pub const fn world(&self) -> &GridWorld {
        &self.world
    }

    /// Summarizes every agent.
    #[must_use]
    pub fn report(&self) -> Vec<AgentReport> {
        self.agents
            .iter()
            .map(|agent| AgentReport {
                name: agent.name.clone(),
                state: agent.monster.state(),
                health: agent.monster.health(),
                position: agent.monster.position(),
                schedule: agent.monster.current_schedule().map(|s| s.name.clone()),
                schedule_changes: agent.monster.schedule_changes(),
                stats: agent.stats.clone(),
            })
            .collect()
    }

    /// Writes one snapshot per agent into `dir`. Returns how many were written.
    pub fn save_snapshots(&self, dir: &Path) -> Result<usize> {
        for (index, agent) in self.agents.iter().enumerate() {
            let path = dir.join(format!("{}-{index}.rvms", agent.name));
            agent.monster.snapshot().save_to(&path)?;
        }
        info!("Saved {} snapshots to {}", self.agents.len(), dir.display());
        Ok(self.agents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revenant_ai::MonsterSnapshot;
    use tempfile::TempDir;

    /// Open 20x20 arena with one monster and a stationary player.
    fn arena(spawn: MonsterSpawn, player_damage: f32) -> SimConfig {
        SimConfig {
            width: 20,
            height: 20,
            walls: Vec::new(),
            player_start: [10.5, 10.5],
            player_patrol: Vec::new(),
            player_damage,
            monsters: vec![spawn],
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_monster_hunts_down_player() {
        let spawn = MonsterSpawn {
            position: [4.5, 10.5],
            damage: 1.0,
            ..MonsterSpawn::default()
        };
        let mut sim = Simulation::new(&arena(spawn, 0.0));
        let start_health = sim.player_health();

        sim.run(150, 0);

        let report = &sim.report()[0];
        assert!(report.stats.hits > 0, "Monster should have landed a bite");
        assert!(sim.player_health() < start_health);
        assert_eq!(report.state, MonsterState::Combat);
        assert!(report.schedule_changes >= 2);
    }

    #[test]
    fn test_attacks_wait_for_their_sequence() {
        let spawn = MonsterSpawn {
            position: [9.5, 10.5],
            damage: 1.0,
            ..MonsterSpawn::default()
        };
        let mut config = arena(spawn, 0.0);
        config.dt = 0.1;
        config.sequence_length = 0.6;
        let mut sim = Simulation::new(&config);

        sim.run(100, 0);

        // Ten seconds of 0.6 second bites
        let report = &sim.report()[0];
        assert!(report.stats.attacks > 0);
        assert!(report.stats.attacks <= 17, "attacks = {}", report.stats.attacks);
    }

    #[test]
    fn test_player_kills_monster() {
        let spawn = MonsterSpawn {
            position: [4.5, 10.5],
            damage: 0.0,
            ..MonsterSpawn::default()
        };
        let mut config = arena(spawn, 60.0);
        config.player_fire_interval = 0.5;
        let mut sim = Simulation::new(&config);

        sim.run(30, 0);

        let report = &sim.report()[0];
        assert_eq!(report.state, MonsterState::Dead);
        assert!(report.health <= 0.0);
        assert!(report.stats.died_at.is_some());
        // The corpse keeps smelling
        assert!(sim.world().active_sounds() > 0);
    }

    #[test]
    fn test_wall_blocks_sight() {
        // Wall between the two; nobody can see anybody
        let mut config = arena(
            MonsterSpawn {
                position: [4.5, 10.5],
                ..MonsterSpawn::default()
            },
            0.0,
        );
        config.walls = vec![crate::config::WallRect {
            min: [7, 0],
            max: [7, 19],
        }];
        let mut sim = Simulation::new(&config);
        sim.run(5, 0);
        assert_eq!(sim.report()[0].state, MonsterState::Idle);
        assert_eq!(sim.report()[0].stats.attacks, 0);
    }

    #[test]
    fn test_snapshots_written_and_readable() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let spawn = MonsterSpawn {
            name: "houndeye".to_string(),
            position: [4.5, 10.5],
            ..MonsterSpawn::default()
        };
        let mut sim = Simulation::new(&arena(spawn, 0.0));
        sim.run(5, 0);

        let written = sim.save_snapshots(temp_dir.path()).expect("Failed to save snapshots");
        assert_eq!(written, 1);

        let loaded =
            MonsterSnapshot::load_from(temp_dir.path().join("houndeye-0.rvms")).expect("Failed to load snapshot");
        let report = &sim.report()[0];
        assert_eq!(loaded.state, report.state);
        assert_eq!(loaded.schedule.as_deref(), report.schedule.as_deref());
    }

    #[test]
    fn test_default_config_runs() {
        let mut sim = Simulation::new(&SimConfig::default());
        sim.run(50, 25);
        assert_eq!(sim.tick(), 50);
        assert_eq!(sim.report().len(), 3);
    }
}
