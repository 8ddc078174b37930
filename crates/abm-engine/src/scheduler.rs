//! Activation order for one step.

use crate::agent::Agent;
use crate::store::AgentStore;
use abm_core::{AgentId, Error, Result, SchedulerConfig};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::fmt;

type KeyFn<P, F> = Box<dyn Fn(&Agent<P, F>) -> f64>;
type OrderFn<P, F> = Box<dyn FnMut(&AgentStore<P, F>, &mut ChaCha8Rng) -> Vec<AgentId>>;

/// Decides the order in which agents are activated each step.
///
/// Every variant lists each live agent exactly once.
pub enum Scheduler<P, F> {
    /// Ascending agent id
    Sequential,
    /// A fresh permutation drawn from the model generator every step
    Randomized,
    /// Descending key, ties by ascending id
    ByProperty(KeyFn<P, F>),
    /// User-supplied ordering, checked against the live set
    Custom(OrderFn<P, F>),
}

impl<P, F> fmt::Debug for Scheduler<P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scheduler::Sequential => "Sequential",
            Scheduler::Randomized => "Randomized",
            Scheduler::ByProperty(_) => "ByProperty",
            Scheduler::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

impl<P: Copy, F> Scheduler<P, F> {
    pub fn from_config(config: SchedulerConfig) -> Self {
        match config {
            SchedulerConfig::Sequential => Scheduler::Sequential,
            SchedulerConfig::Randomized => Scheduler::Randomized,
        }
    }

    pub fn by_property(key: impl Fn(&Agent<P, F>) -> f64 + 'static) -> Self {
        Scheduler::ByProperty(Box::new(key))
    }

    pub fn custom(
        order: impl FnMut(&AgentStore<P, F>, &mut ChaCha8Rng) -> Vec<AgentId> + 'static,
    ) -> Self {
        Scheduler::Custom(Box::new(order))
    }

    /// Activation order for the coming step.
    pub fn order(&mut self, store: &AgentStore<P, F>, rng: &mut ChaCha8Rng) -> Result<Vec<AgentId>> {
        match self {
            Scheduler::Sequential => Ok(store.ids()),
            Scheduler::Randomized => {
                let mut ids = store.ids();
                ids.shuffle(rng);
                Ok(ids)
            }
            Scheduler::ByProperty(key) => {
                let mut keyed: Vec<(f64, AgentId)> =
                    store.all().map(|agent| (key(agent), agent.id())).collect();
                keyed.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
                Ok(keyed.into_iter().map(|(_, id)| id).collect())
            }
            Scheduler::Custom(order) => {
                let ids = order(store, rng);
                check_permutation(&ids, store)?;
                Ok(ids)
            }
        }
    }
}

fn check_permutation<P: Copy, F>(ids: &[AgentId], store: &AgentStore<P, F>) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for &id in ids {
        if !store.contains(id) {
            return Err(Error::InvalidSchedule(format!("{id} is not a live agent")));
        }
        if !seen.insert(id) {
            return Err(Error::InvalidSchedule(format!("{id} is scheduled twice")));
        }
    }
    if seen.len() != store.len() {
        return Err(Error::InvalidSchedule(format!(
            "{} of {} live agents scheduled",
            seen.len(),
            store.len()
        )));
    }
    Ok(())
}
