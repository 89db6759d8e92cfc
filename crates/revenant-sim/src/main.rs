//! # Revenant
//!
//! Headless host for the Revenant monster AI.
//!
//! Builds a grid world from `revenant.toml` (or the path given as the first
//! argument), spawns the configured monsters and a patrolling player, runs
//! the simulation and prints a per-agent summary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod sim;
mod world;

use anyhow::Result;
use config::SimConfig;
use sim::Simulation;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("revenant=info".parse()?))
        .init();

    info!("Project Revenant starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load_from(path),
        None => SimConfig::load(),
    };

    let mut sim = Simulation::new(&config);
    sim.run(config.ticks, config.report_interval);

    info!(
        "Finished after {} ticks, player health {:.0}, {} sounds active",
        sim.tick(),
        sim.player_health(),
        sim.world().active_sounds()
    );
    for report in sim.report() {
        info!(
            "{}: state={:?} hp={:.0} pos=({:.1}, {:.1}) schedule={} changes={} attacks={}/{} died={}",
            report.name,
            report.state,
            report.health,
            report.position.x,
            report.position.y,
            report.schedule.as_deref().unwrap_or("-"),
            report.schedule_changes,
            report.stats.hits,
            report.stats.attacks,
            report.stats.died_at.map_or_else(|| "no".to_string(), |t| format!("tick {t}")),
        );
    }

    if let Some(dir) = &config.snapshot_dir {
        sim.save_snapshots(dir)?;
    }

    info!("Project Revenant shutdown complete");
    Ok(())
}
