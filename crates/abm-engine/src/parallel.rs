//! Synchronous agent updates computed on the rayon pool.
//!
//! Every update sees the same frozen model and returns the agent's new
//! fields. Results are committed afterwards in schedule order, so the
//! outcome does not depend on thread timing. Updates get no mutable access
//! to the space, the store, other agents or the generator.

use crate::agent::Agent;
use crate::model::Model;
use abm_core::{AgentId, BoxError, Error, Result};
use abm_space::Space;
use rayon::prelude::*;
use tracing::debug;

/// Compute updates for `order` in parallel, then commit them in order.
///
/// If any update fails, nothing is committed and the error of the earliest
/// failing agent in `order` is returned.
pub(crate) fn step<S, F, P, U>(model: &mut Model<S, F, P>, order: &[AgentId], update: &U) -> Result<()>
where
    S: Space + Sync,
    S::Pos: Sync,
    F: Send + Sync,
    P: Sync,
    U: Fn(&Agent<S::Pos, F>, &Model<S, F, P>) -> std::result::Result<F, BoxError> + Sync,
{
    let step = model.steps() + 1;
    let frozen: &Model<S, F, P> = model;
    let results: Vec<(AgentId, std::result::Result<F, BoxError>)> = order
        .par_iter()
        .filter_map(|&id| {
            frozen
                .agent(id)
                .ok()
                .map(|agent| (id, update(agent, frozen)))
        })
        .collect();

    let mut updates = Vec::with_capacity(results.len());
    for (id, result) in results {
        match result {
            Ok(fields) => updates.push((id, fields)),
            Err(source) => {
                return Err(Error::Callback {
                    step,
                    agent: Some(id),
                    source,
                })
            }
        }
    }

    debug!(event = "parallel_commit", step, updates = updates.len());
    for (id, fields) in updates {
        model.agent_mut(id)?.fields = fields;
    }
    Ok(())
}
