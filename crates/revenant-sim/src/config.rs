//! Simulation configuration.
//!
//! Describes the grid, the player, and the monsters to spawn.
//! Configuration can be loaded from and saved to a TOML file.

use revenant_ai::{EntityClass, Locomotion};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "revenant.toml";

/// A solid rectangle of cells, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallRect {
    /// Lower corner cell
    pub min: [i32; 2],
    /// Upper corner cell
    pub max: [i32; 2],
}

impl WallRect {
    /// Iterates the cells covered by the rectangle.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> {
        let (x0, x1) = (self.min[0].min(self.max[0]), self.min[0].max(self.max[0]));
        let (y0, y1) = (self.min[1].min(self.max[1]), self.min[1].max(self.max[1]));
        (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
    }
}

/// One monster to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonsterSpawn {
    /// Kind name, also used for snapshot file names
    pub name: String,
    /// Relationship class
    pub class: EntityClass,
    /// How the kind moves
    pub locomotion: Locomotion,
    /// Spawn position in world units
    pub position: [f32; 2],
    /// Attacks from range instead of melee
    pub ranged: bool,
    /// Damage dealt per attack
    pub damage: f32,
    /// Optional tuning file for this kind
    pub tuning: Option<PathBuf>,
}

impl Default for MonsterSpawn {
    fn default() -> Self {
        Self {
            name: "houndeye".to_string(),
            class: EntityClass::AlienMonster,
            locomotion: Locomotion::Ground,
            position: [0.0, 0.0],
            ranged: false,
            damage: 10.0,
            tuning: None,
        }
    }
}

/// Simulation configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Run Settings ===
    /// Number of ticks to simulate
    pub ticks: u32,
    /// Seconds per tick
    pub dt: f32,
    /// Log every agent's state every this many ticks (0 = only at the end)
    pub report_interval: u32,

    // === World Settings ===
    /// Grid width in cells
    pub width: i32,
    /// Grid height in cells
    pub height: i32,
    /// Cell edge length in world units
    pub cell_size: f32,
    /// Solid cells
    pub walls: Vec<WallRect>,
    /// Length of one animation sequence in seconds
    pub sequence_length: f32,
    /// How long noises stay audible in seconds
    pub sound_lifetime: f32,
    /// How long corpses keep smelling in seconds
    pub scent_lifetime: f32,

    // === Player Settings ===
    /// Player spawn position
    pub player_start: [f32; 2],
    /// Patrol waypoints the player walks in a loop
    pub player_patrol: Vec<[f32; 2]>,
    /// Player walking speed
    pub player_speed: f32,
    /// Player health
    pub player_health: f32,
    /// Damage per player shot
    pub player_damage: f32,
    /// Player weapon range
    pub player_range: f32,
    /// Seconds between player shots
    pub player_fire_interval: f32,
    /// Audible radius of a shot
    pub gunshot_volume: f32,

    // === Monsters ===
    /// Monsters to spawn
    pub monsters: Vec<MonsterSpawn>,

    // === Output ===
    /// Directory for end-of-run monster snapshots (None = don't save)
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            // Run
            ticks: 600,
            dt: 0.1,
            report_interval: 100,

            // World
            width: 32,
            height: 32,
            cell_size: 1.0,
            walls: vec![
                WallRect {
                    min: [14, 4],
                    max: [15, 20],
                },
                WallRect {
                    min: [4, 24],
                    max: [20, 24],
                },
            ],
            sequence_length: 0.6,
            sound_lifetime: 0.5,
            scent_lifetime: 30.0,

            // Player
            player_start: [24.5, 24.5],
            player_patrol: vec![[24.5, 24.5], [24.5, 8.5], [8.5, 8.5], [8.5, 20.5]],
            player_speed: 2.5,
            player_health: 200.0,
            player_damage: 15.0,
            player_range: 12.0,
            player_fire_interval: 1.0,
            gunshot_volume: 25.0,

            // Monsters
            monsters: vec![
                MonsterSpawn {
                    name: "houndeye".to_string(),
                    position: [4.5, 4.5],
                    ..MonsterSpawn::default()
                },
                MonsterSpawn {
                    name: "bullsquid".to_string(),
                    position: [28.5, 4.5],
                    ranged: true,
                    damage: 8.0,
                    ..MonsterSpawn::default()
                },
                MonsterSpawn {
                    name: "grunt".to_string(),
                    class: EntityClass::HumanMilitary,
                    position: [4.5, 28.5],
                    ranged: true,
                    damage: 6.0,
                    ..MonsterSpawn::default()
                },
            ],

            // Output
            snapshot_dir: None,
        }
    }
}

impl SimConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let mut config = match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        return Self::default();
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                return Self::default();
            },
        };

        config.validate();
        config
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Run
        self.dt = self.dt.clamp(0.001, 1.0);

        // World
        self.width = self.width.clamp(1, 4096);
        self.height = self.height.clamp(1, 4096);
        self.cell_size = self.cell_size.clamp(0.1, 100.0);
        self.sequence_length = self.sequence_length.max(0.0);
        self.sound_lifetime = self.sound_lifetime.max(self.dt);
        self.scent_lifetime = self.scent_lifetime.max(0.0);

        // Player
        self.player_speed = self.player_speed.max(0.0);
        self.player_health = self.player_health.max(1.0);
        self.player_damage = self.player_damage.max(0.0);
        self.player_range = self.player_range.max(0.0);
        self.player_fire_interval = self.player_fire_interval.max(self.dt);
        self.gunshot_volume = self.gunshot_volume.max(0.0);

        // Monsters
        for spawn in &mut self.monsters {
            spawn.damage = spawn.damage.max(0.0);
        }
    }

    /// World-space extent of the grid.
    #[must_use]
    pub fn extent(&self) -> [f32; 2] {
        [self.width as f32 * self.cell_size, self.height as f32 * self.cell_size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.ticks, 600);
        assert_eq!(config.monsters.len(), 3);
        assert!(config.snapshot_dir.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimConfig::default();

        // Set invalid values
        config.dt = 0.0;
        config.width = -5;
        config.player_fire_interval = 0.0;
        config.monsters[0].damage = -3.0;

        config.validate();

        // Should be clamped
        assert!((config.dt - 0.001).abs() < 1e-6);
        assert_eq!(config.width, 1);
        assert!(config.player_fire_interval >= config.dt);
        assert_eq!(config.monsters[0].damage, 0.0);
    }

    #[test]
    fn test_wall_rect_cells() {
        let rect = WallRect {
            min: [2, 3],
            max: [1, 4],
        };
        let cells: Vec<_> = rect.cells().collect();
        assert_eq!(cells, vec![(1, 3), (1, 4), (2, 3), (2, 4)]);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        // Create and save config
        let mut config = SimConfig::default();
        config.ticks = 42;
        config.monsters.truncate(1);
        config.monsters[0].tuning = Some(PathBuf::from("tuning/houndeye.toml"));
        config.snapshot_dir = Some(PathBuf::from("snapshots"));

        config.save_to(&config_path).expect("Failed to save config");

        // Load and verify
        let loaded = SimConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_partial_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(
            &config_path,
            "ticks = 10\n\n[[monsters]]\nname = \"barnacle\"\nposition = [3.0, 3.0]\n",
        )
        .expect("Failed to write config");

        let loaded = SimConfig::load_from(&config_path);
        assert_eq!(loaded.ticks, 10);
        assert_eq!(loaded.monsters.len(), 1);
        assert_eq!(loaded.monsters[0].name, "barnacle");
        assert_eq!(loaded.monsters[0].class, EntityClass::AlienMonster);
        assert_eq!(loaded.width, 32);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = SimConfig::load_from("/nonexistent/path/revenant.toml");
        // Should return defaults
        assert_eq!(config, SimConfig::default());
    }
}
