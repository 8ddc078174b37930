//! Canonical agent storage with monotonic id allocation.

use crate::agent::Agent;
use abm_core::{AgentId, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owns every live agent record.
///
/// Records are kept in ascending id order so iteration is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStore<P, F> {
    agents: BTreeMap<AgentId, Agent<P, F>>,
    next_id: u64,
}

impl<P, F> Default for AgentStore<P, F> {
    fn default() -> Self {
        Self {
            agents: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<P: Copy, F> AgentStore<P, F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next `create` will hand out.
    pub fn peek_id(&self) -> AgentId {
        AgentId(self.next_id)
    }

    /// Insert a new record under the next unused id.
    pub fn create(&mut self, pos: P, fields: F, born: u64) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        self.agents.insert(id, Agent::new(id, pos, fields, born));
        id
    }

    /// Reinsert a removed record. Its id was allocated here, so `next_id`
    /// already lies past it.
    pub(crate) fn restore(&mut self, agent: Agent<P, F>) {
        self.agents.insert(agent.id(), agent);
    }

    pub fn remove(&mut self, id: AgentId) -> Result<Agent<P, F>> {
        self.agents.remove(&id).ok_or(Error::UnknownAgent(id))
    }

    pub fn get(&self, id: AgentId) -> Result<&Agent<P, F>> {
        self.agents.get(&id).ok_or(Error::UnknownAgent(id))
    }

    pub fn get_mut(&mut self, id: AgentId) -> Result<&mut Agent<P, F>> {
        self.agents.get_mut(&id).ok_or(Error::UnknownAgent(id))
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Live view over current agents, ascending id.
    ///
    /// The shared borrow rules out mutation while iterating; use [`ids`]
    /// to take a snapshot when the loop body needs to add or remove agents.
    ///
    /// [`ids`]: AgentStore::ids
    pub fn all(&self) -> impl Iterator<Item = &Agent<P, F>> + '_ {
        self.agents.values()
    }

    /// Snapshot of the ids live at call time, ascending.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abm_core::Position;

    #[test]
    fn test_create_then_get_round_trip() {
        let mut store = AgentStore::new();
        let id = store.create(Position::new(1, 2), "wolf", 0);
        let agent = store.get(id).unwrap();
        assert_eq!(agent.id(), id);
        assert_eq!(agent.pos(), Position::new(1, 2));
        assert_eq!(agent.fields, "wolf");
    }

    #[test]
    fn test_remove_then_get_fails() {
        let mut store = AgentStore::new();
        let id = store.create(Position::new(0, 0), (), 0);
        store.remove(id).unwrap();
        assert!(matches!(store.get(id), Err(Error::UnknownAgent(missing)) if missing == id));
        assert!(matches!(store.remove(id), Err(Error::UnknownAgent(_))));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = AgentStore::new();
        let a = store.create(Position::new(0, 0), (), 0);
        let b = store.create(Position::new(0, 0), (), 0);
        store.remove(b).unwrap();
        let c = store.create(Position::new(0, 0), (), 1);
        assert_eq!(a, AgentId(1));
        assert_eq!(b, AgentId(2));
        assert_eq!(c, AgentId(3));
        assert_eq!(store.ids(), vec![a, c]);
        assert_eq!(store.peek_id(), AgentId(4));
    }

    #[test]
    fn test_all_is_ascending() {
        let mut store = AgentStore::new();
        for i in 0..5 {
            store.create(Position::new(i, 0), i, 0);
        }
        let ids: Vec<AgentId> = store.all().map(|a| a.id()).collect();
        assert_eq!(ids, store.ids());
        assert_eq!(store.len(), 5);
    }
}
