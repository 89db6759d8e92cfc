//! Scheduler tuning.
//!
//! Distances are world units, angles are degrees, times are seconds.
//! Tuning can be loaded from and saved to a TOML file.

use revenant_common::{AiError, AiResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Per-kind AI tuning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    // === Senses ===
    /// How far the monster can see
    pub sight_range: f32,
    /// How far the monster can hear
    pub hearing_range: f32,
    /// Cosine of the half view cone; `-1.0` sees all around
    pub field_of_view: f32,
    /// Enemies further than this flag `ENEMY_TOO_FAR`
    pub max_enemy_distance: f32,
    /// Eye height above the feet
    pub view_height: f32,

    // === Movement ===
    /// Walking speed
    pub walk_speed: f32,
    /// Running speed
    pub run_speed: f32,
    /// Turn rate in degrees per second
    pub yaw_speed: f32,
    /// Facing tasks complete within this many degrees
    pub face_tolerance: f32,
    /// Horizontal waypoint arrival radius
    pub arrival_tolerance: f32,
    /// Vertical waypoint arrival tolerance for ground movers
    pub step_height: f32,
    /// Shortcut routes through clear local moves after building them
    pub simplify_routes: bool,

    // === Combat ===
    /// Melee reach
    pub melee_range: f32,
    /// Closest distance for ranged attacks
    pub range_attack_min: f32,
    /// Furthest distance for ranged attacks
    pub range_attack_max: f32,
    /// Damage at or above this in one hit counts as heavy
    pub heavy_damage: f32,
    /// Starting health
    pub max_health: f32,

    // === Scheduler ===
    /// Old enemies remembered
    pub old_enemy_capacity: usize,
    /// Tasks started or advanced per think at most
    pub max_task_steps_per_tick: u32,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            sight_range: 40.0,
            hearing_range: 30.0,
            field_of_view: 0.5,
            max_enemy_distance: 60.0,
            view_height: 1.5,

            walk_speed: 2.0,
            run_speed: 5.0,
            yaw_speed: 180.0,
            face_tolerance: 5.0,
            arrival_tolerance: 0.5,
            step_height: 0.5,
            simplify_routes: true,

            melee_range: 1.5,
            range_attack_min: 2.0,
            range_attack_max: 25.0,
            heavy_damage: 20.0,
            max_health: 100.0,

            old_enemy_capacity: 4,
            max_task_steps_per_tick: 10,
        }
    }
}

impl AiTuning {
    /// Parses tuning from TOML text and clamps it.
    pub fn from_toml_str(text: &str) -> AiResult<Self> {
        let mut tuning: Self = toml::from_str(text).map_err(|e| AiError::Config(e.to_string()))?;
        tuning.validate();
        Ok(tuning)
    }

    /// Load tuning from a specific path.
    /// Returns defaults if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Tuning file not found, using defaults");
            return Self::default();
        }

        let mut contents = String::new();
        match fs::File::open(path) {
            Ok(mut file) => {
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read tuning file: {e}");
                    return Self::default();
                }
            },
            Err(e) => {
                warn!("Failed to open tuning file: {e}");
                return Self::default();
            },
        }

        match Self::from_toml_str(&contents) {
            Ok(tuning) => {
                info!("Loaded tuning from {}", path.display());
                tuning
            },
            Err(e) => {
                warn!("Failed to parse tuning file: {e}");
                Self::default()
            },
        }
    }

    /// Save tuning to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved tuning to {}", path.display());
        Ok(())
    }

    /// Validate and clamp values to sensible ranges.
    pub fn validate(&mut self) {
        // Senses
        self.sight_range = self.sight_range.max(0.0);
        self.hearing_range = self.hearing_range.max(0.0);
        self.field_of_view = self.field_of_view.clamp(-1.0, 1.0);
        self.max_enemy_distance = self.max_enemy_distance.max(0.0);
        self.view_height = self.view_height.max(0.0);

        // Movement
        self.walk_speed = self.walk_speed.max(0.0);
        self.run_speed = self.run_speed.max(self.walk_speed);
        self.yaw_speed = self.yaw_speed.clamp(1.0, 3600.0);
        self.face_tolerance = self.face_tolerance.clamp(0.1, 90.0);
        self.arrival_tolerance = self.arrival_tolerance.max(0.01);
        self.step_height = self.step_height.max(0.0);

        // Combat
        self.melee_range = self.melee_range.max(0.0);
        self.range_attack_min = self.range_attack_min.max(0.0);
        self.range_attack_max = self.range_attack_max.max(self.range_attack_min);
        self.heavy_damage = self.heavy_damage.max(0.0);
        self.max_health = self.max_health.max(1.0);

        // Scheduler
        self.old_enemy_capacity = self.old_enemy_capacity.clamp(1, 64);
        self.max_task_steps_per_tick = self.max_task_steps_per_tick.clamp(1, 64);
    }
}
