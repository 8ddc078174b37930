//! Runs one of two demo models from a JSON config and prints the model
//! table as JSON on stdout.
//!
//! A grid space runs a forest fire; a continuous space runs a flock.

mod config;
mod flock;
mod forest;
mod telemetry;

use abm_core::SpaceConfig;
use abm_engine::DataTable;
use anyhow::Result;
use config::DemoConfig;
use serde::Serialize;
use tracing::info;

/// Summary of one demo run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub demo: &'static str,
    pub seed: u64,
    pub steps: u64,
    /// Agents alive at the end of the run
    pub agents: usize,
    pub model_data: DataTable,
}

fn main() -> Result<()> {
    telemetry::init_telemetry()?;

    let config = match std::env::args().nth(1) {
        Some(path) => DemoConfig::from_file(&path)?,
        None => DemoConfig::default(),
    };
    info!(seed = config.model.seed, steps = config.steps, "Starting abm-demo");

    let report = match &config.model.space {
        SpaceConfig::Grid(grid) => forest::run(&config, grid)?,
        SpaceConfig::Continuous(space) => flock::run(&config, space)?,
    };
    info!(demo = report.demo, steps = report.steps, agents = report.agents, "Demo finished");

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
