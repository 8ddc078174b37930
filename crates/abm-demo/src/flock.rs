//! Vicsek-style flocking in continuous space.
//!
//! Headings align in parallel against the frozen flock; the model step
//! then adds noise from the model generator and moves every bird.

use crate::config::DemoConfig;
use crate::Report;
use abm_core::{ContinuousConfig, Error, Point};
use abm_engine::{Agent, Model, Simulation, Stop, Value};
use abm_space::ContinuousSpace;
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bird {
    pub heading: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Flock {
    pub radius: f64,
    pub speed: f64,
    pub noise: f64,
}

pub type Sky = Model<ContinuousSpace, Bird, Flock>;

pub fn release(space: &ContinuousConfig, config: &DemoConfig) -> Result<Sky> {
    let flock = Flock {
        radius: config.radius,
        speed: config.speed,
        noise: config.noise,
    };
    let mut model = Model::new(ContinuousSpace::from_config(space)?, flock, config.model.seed);
    for _ in 0..config.birds {
        let heading = model.rng().gen_range(-PI..PI);
        model.add_agent_random(Bird { heading })?;
    }
    Ok(model)
}

/// Mean heading of the bird and its neighbours.
fn align(bird: &Agent<Point, Bird>, model: &Sky) -> std::result::Result<Bird, abm_core::BoxError> {
    let (mut x, mut y) = (0.0, 0.0);
    for other in model.nearby_agents(bird.pos(), model.properties().radius) {
        x += other.fields.heading.cos();
        y += other.fields.heading.sin();
    }
    Ok(Bird { heading: y.atan2(x) })
}

fn fly(model: &mut Sky) -> abm_core::CallbackResult {
    let Flock { speed, noise, .. } = *model.properties();
    for id in model.ids() {
        let jitter = model.rng().gen_range(-noise..=noise) * PI;
        let heading = {
            let bird = model.agent_mut(id)?;
            bird.fields.heading += jitter;
            bird.fields.heading
        };
        let velocity = Point::new(heading.cos() * speed, heading.sin() * speed);
        match model.walk(id, velocity) {
            // Bounded sky: turn back at the wall.
            Err(Error::OutOfBounds { .. }) => model.agent_mut(id)?.fields.heading += PI,
            other => {
                other?;
            }
        }
    }
    Ok(())
}

/// Length of the mean unit heading: 0 for disorder, 1 for a single direction.
pub fn polarization(model: &Sky) -> f64 {
    if model.is_empty() {
        return 0.0;
    }
    let (x, y) = model.agents().all().fold((0.0, 0.0), |(x, y), bird| {
        (x + bird.fields.heading.cos(), y + bird.fields.heading.sin())
    });
    (x * x + y * y).sqrt() / model.len() as f64
}

pub fn run(config: &DemoConfig, space: &ContinuousConfig) -> Result<Report> {
    let model = release(space, config)?;
    info!(
        event = "flock_released",
        birds = model.len(),
        radius = config.radius,
        noise = config.noise
    );

    let mut sim = Simulation::new(model)
        .with_config(&config.model)?
        .with_parallel_agent_step(align)
        .with_model_step(fly)
        .with_model_column("polarization", |model: &Sky| Value::from(polarization(model)));

    let output = sim.run(Stop::steps(config.steps))?;
    info!(event = "flock_settled", polarization = polarization(sim.model()));

    Ok(Report {
        demo: "flocking",
        seed: config.model.seed,
        steps: output.steps,
        agents: sim.model().len(),
        model_data: output.model_data,
    })
}
