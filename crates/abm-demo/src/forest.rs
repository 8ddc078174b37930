//! Forest fire on a grid: burning trees ignite their von Neumann
//! neighbours, then burn out.

use crate::config::DemoConfig;
use crate::Report;
use abm_core::{AgentId, GridConfig, Metric, Position};
use abm_engine::{Agent, Model, Simulation, Stop, Value};
use abm_space::GridSpace;
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tree {
    Green,
    Burning,
    Burnt,
}

pub type Forest = Model<GridSpace, Tree>;

/// Plant trees at `density`; the trees in the first column start burning.
pub fn plant(grid: &GridConfig, seed: u64, density: f64) -> Result<Forest> {
    let mut model = Model::new(GridSpace::from_config(grid)?, (), seed);
    let cells: Vec<Position> = model.space().positions().collect();
    for pos in cells {
        if model.rng().gen_bool(density) {
            let state = if pos.x == 0 { Tree::Burning } else { Tree::Green };
            model.add_agent(pos, state)?;
        }
    }
    Ok(model)
}

fn spread(id: AgentId, model: &mut Forest) -> abm_core::CallbackResult {
    let tree = model.agent(id)?;
    if tree.fields != Tree::Burning {
        return Ok(());
    }
    let pos = tree.pos();
    let neighbours: Vec<AgentId> = model.nearby_ids_by(pos, 1.0, Metric::Manhattan).collect();
    for other in neighbours {
        let tree = model.agent_mut(other)?;
        if tree.fields == Tree::Green {
            tree.fields = Tree::Burning;
        }
    }
    model.agent_mut(id)?.fields = Tree::Burnt;
    Ok(())
}

fn is(state: Tree) -> impl Fn(&Agent<Position, Tree>) -> bool {
    move |tree| tree.fields == state
}

pub fn run(config: &DemoConfig, grid: &GridConfig) -> Result<Report> {
    let model = plant(grid, config.model.seed, config.density)?;
    let planted = model.len();
    info!(event = "forest_planted", trees = planted, width = grid.width, height = grid.height);

    let mut sim = Simulation::new(model)
        .with_config(&config.model)?
        .with_agent_step(spread)
        .with_agent_count("green", is(Tree::Green))
        .with_agent_count("burning", is(Tree::Burning))
        .with_agent_count("burnt", is(Tree::Burnt))
        .with_model_column("burnt_fraction", move |model: &Forest| {
            let burnt = model.agents().all().filter(|t| t.fields == Tree::Burnt).count();
            Value::from(burnt as f64 / planted.max(1) as f64)
        });

    let output = sim.run(Stop::when_or_after(
        |model: &Forest| !model.agents().all().any(|t| t.fields == Tree::Burning),
        config.steps,
    ))?;

    Ok(Report {
        demo: "forest_fire",
        seed: config.model.seed,
        steps: output.steps,
        agents: sim.model().len(),
        model_data: output.model_data,
    })
}
