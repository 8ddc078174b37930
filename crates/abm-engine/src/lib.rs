//! Agent store, scheduling and the stepping driver.
//!
//! A [`Model`] owns a space, the agents placed in it, user properties and
//! a seeded generator. A [`Simulation`] drives the model: per step it asks
//! a [`Scheduler`] for an activation order, runs the agent and model
//! updates, and samples a [`DataCollector`] into [`DataTable`]s.

pub mod agent;
pub mod store;
pub mod scheduler;
pub mod model;
pub mod collect;
pub mod simulation;
mod parallel;
mod sampling;
mod snapshot;

pub use agent::Agent;
pub use collect::{DataCollector, DataTable, Reduction, Value};
pub use model::Model;
pub use scheduler::Scheduler;
pub use simulation::{RunOutput, Simulation, Stop};
pub use store::AgentStore;
