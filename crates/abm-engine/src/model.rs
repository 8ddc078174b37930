//! The model: space, agents, global properties and the run's generator.

use crate::agent::Agent;
use crate::scheduler::Scheduler;
use crate::store::AgentStore;
use abm_core::{AgentId, Error, Metric, Point, Position, Result};
use abm_space::{ContinuousSpace, GridSpace, Space};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Everything a simulation step may read or mutate.
///
/// Callbacks receive the model by reference; there is no ambient global
/// state, so independent models can run side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "S: Serialize, S::Pos: Serialize, F: Serialize, P: Serialize",
    deserialize = "S: Deserialize<'de>, S::Pos: Deserialize<'de>, F: Deserialize<'de>, P: Deserialize<'de>"
))]
pub struct Model<S: Space, F, P = ()> {
    space: S,
    agents: AgentStore<S::Pos, F>,
    properties: P,
    rng: ChaCha8Rng,
    seed: u64,
    steps: u64,
}

impl<S: Space, F, P> Model<S, F, P> {
    pub fn new(space: S, properties: P, seed: u64) -> Self {
        Self {
            space,
            agents: AgentStore::new(),
            properties,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            steps: 0,
        }
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    pub fn properties(&self) -> &P {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut P {
        &mut self.properties
    }

    /// The run's generator. Every random decision should draw from here so
    /// a seed fully determines the run.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Completed steps
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn advance_step(&mut self) {
        self.steps += 1;
    }

    pub fn agents(&self) -> &AgentStore<S::Pos, F> {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains(id)
    }

    /// Snapshot of live ids, ascending
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.ids()
    }

    pub fn agent(&self, id: AgentId) -> Result<&Agent<S::Pos, F>> {
        self.agents.get(id)
    }

    /// Mutable access to an agent's fields. Use [`move_agent`] or [`walk`]
    /// to change its position.
    ///
    /// [`move_agent`]: Model::move_agent
    /// [`walk`]: Model::walk
    pub fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent<S::Pos, F>> {
        self.agents.get_mut(id)
    }

    /// Place a new agent at `pos`, wrapped if the space is periodic.
    pub fn add_agent(&mut self, pos: S::Pos, fields: F) -> Result<AgentId> {
        let pos = self.space.insert(self.agents.peek_id(), pos)?;
        let id = self.agents.create(pos, fields, self.steps);
        trace!(event = "agent_added", agent = %id, position = ?pos, step = self.steps);
        Ok(id)
    }

    /// Place a new agent at a uniformly random position.
    pub fn add_agent_random(&mut self, fields: F) -> Result<AgentId> {
        let pos = self.space.random_position(&mut self.rng);
        self.add_agent(pos, fields)
    }

    pub fn remove_agent(&mut self, id: AgentId) -> Result<Agent<S::Pos, F>> {
        let agent = self.agents.remove(id)?;
        self.space.remove(id, agent.pos);
        trace!(event = "agent_removed", agent = %id, step = self.steps);
        Ok(agent)
    }

    /// Move an agent to an absolute position.
    pub fn move_agent(&mut self, id: AgentId, pos: S::Pos) -> Result<S::Pos> {
        let from = self.agents.get(id)?.pos;
        let to = self.space.relocate(id, from, pos)?;
        self.agents.get_mut(id)?.pos = to;
        trace!(event = "agent_moved", agent = %id, from = ?from, to = ?to);
        Ok(to)
    }

    /// Move an agent by a displacement.
    pub fn walk(&mut self, id: AgentId, delta: S::Pos) -> Result<S::Pos> {
        let from = self.agents.get(id)?.pos;
        let target = self.space.translate(from, delta)?;
        self.move_agent(id, target)
    }

    /// Agents within `radius` of `pos` under the space's default metric.
    pub fn nearby_ids(&self, pos: S::Pos, radius: f64) -> impl Iterator<Item = AgentId> + '_ {
        self.space.nearby_ids(pos, radius, self.space.metric())
    }

    pub fn nearby_ids_by(
        &self,
        pos: S::Pos,
        radius: f64,
        metric: Metric,
    ) -> impl Iterator<Item = AgentId> + '_ {
        self.space.nearby_ids(pos, radius, metric)
    }

    pub fn nearby_agents(&self, pos: S::Pos, radius: f64) -> impl Iterator<Item = &Agent<S::Pos, F>> + '_ {
        self.nearby_ids(pos, radius)
            .filter_map(move |id| self.agents.get(id).ok())
    }

    /// Agents near agent `id`, excluding `id` itself.
    pub fn neighbors_of(&self, id: AgentId, radius: f64) -> Result<Vec<AgentId>> {
        let pos = self.agents.get(id)?.pos;
        Ok(self.nearby_ids(pos, radius).filter(|&other| other != id).collect())
    }

    pub fn random_agent(&mut self) -> Option<AgentId> {
        self.agents.ids().choose(&mut self.rng).copied()
    }

    pub fn random_agent_where(&mut self, predicate: impl Fn(&Agent<S::Pos, F>) -> bool) -> Option<AgentId> {
        let matching: Vec<AgentId> = self
            .agents
            .all()
            .filter(|agent| predicate(agent))
            .map(|agent| agent.id())
            .collect();
        matching.choose(&mut self.rng).copied()
    }

    pub(crate) fn schedule(&mut self, scheduler: &mut Scheduler<S::Pos, F>) -> Result<Vec<AgentId>> {
        scheduler.order(&self.agents, &mut self.rng)
    }

    /// Put a previously removed record back under its own id.
    pub(crate) fn restore_agent(&mut self, agent: Agent<S::Pos, F>) -> Result<()> {
        self.space.insert(agent.id(), agent.pos)?;
        self.agents.restore(agent);
        Ok(())
    }
}

impl<F, P> Model<GridSpace, F, P> {
    pub fn ids_at(&self, pos: Position) -> &[AgentId] {
        self.space.ids_at(pos)
    }

    pub fn random_empty_position(&mut self) -> Option<Position> {
        self.space.random_empty(&mut self.rng)
    }

    /// Add an agent to a random unoccupied cell.
    pub fn add_agent_to_random_empty(&mut self, fields: F) -> Result<AgentId> {
        let pos = self
            .random_empty_position()
            .ok_or_else(|| Error::Occupied("every cell".to_string()))?;
        self.add_agent(pos, fields)
    }

    pub fn move_agent_to_random_empty(&mut self, id: AgentId) -> Result<Position> {
        let pos = self
            .random_empty_position()
            .ok_or_else(|| Error::Occupied("every cell".to_string()))?;
        self.move_agent(id, pos)
    }
}

impl<F, P> Model<ContinuousSpace, F, P> {
    /// Closest other agent within `radius` of agent `id`.
    pub fn nearest_neighbor(&self, id: AgentId, radius: f64) -> Result<Option<AgentId>> {
        let pos: Point = self.agents.get(id)?.pos;
        Ok(self.space.nearest(pos, radius, Some(id)))
    }
}
