//! Resampling a population with replacement.

use crate::agent::Agent;
use crate::model::Model;
use abm_core::{AgentId, Error, Result};
use abm_space::Space;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::debug;

impl<S: Space, F: Clone, P> Model<S, F, P> {
    /// Replace the population with `n` draws, with replacement, from the
    /// current agents.
    ///
    /// Draws are uniform, or proportional to `weight` when given. Each draw
    /// becomes a new agent with fresh id, copying the source's fields and
    /// position. The old agents are removed. Returns the new ids in draw
    /// order.
    ///
    /// On error the population is left as it was. Ids handed to copies that
    /// were rolled back are not reused.
    pub fn sample(
        &mut self,
        n: usize,
        weight: Option<&dyn Fn(&Agent<S::Pos, F>) -> f64>,
    ) -> Result<Vec<AgentId>> {
        let population = self.ids();
        if population.is_empty() && n > 0 {
            return Err(Error::InvalidPropensity(
                "cannot sample from an empty population".to_string(),
            ));
        }

        let picks: Vec<usize> = match weight {
            None => (0..n)
                .map(|_| self.rng().gen_range(0..population.len()))
                .collect(),
            Some(weight) => {
                let weights = population
                    .iter()
                    .map(|&id| self.agent(id).map(weight))
                    .collect::<Result<Vec<f64>>>()?;
                let dist = WeightedIndex::new(&weights)
                    .map_err(|err| Error::InvalidPropensity(format!("sampling weights: {err}")))?;
                (0..n).map(|_| dist.sample(self.rng())).collect()
            }
        };

        let mut copies = Vec::with_capacity(n);
        for index in picks {
            let id = population[index];
            let source = self.agent(id)?;
            copies.push((source.pos(), source.fields.clone()));
        }

        let originals = population
            .iter()
            .map(|&id| self.remove_agent(id))
            .collect::<Result<Vec<_>>>()?;
        let mut ids = Vec::with_capacity(copies.len());
        for (pos, fields) in copies {
            match self.add_agent(pos, fields) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    // A copy did not fit (e.g. two copies on a single-occupancy
                    // cell): put the old population back.
                    for id in ids {
                        self.remove_agent(id)?;
                    }
                    for agent in originals {
                        self.restore_agent(agent)?;
                    }
                    debug!(event = "resample_rolled_back", step = self.steps(), error = %err);
                    return Err(err);
                }
            }
        }

        debug!(
            event = "population_resampled",
            step = self.steps(),
            from = population.len(),
            to = ids.len(),
            weighted = weight.is_some()
        );
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abm_core::{CellCapacity, Position};
    use abm_space::GridSpace;

    fn traits(seed: u64) -> Model<GridSpace, f64> {
        let mut model = Model::new(GridSpace::new(4, 1, false).unwrap(), (), seed);
        for (x, value) in [0.0, 0.0, 1.0, 1.0].into_iter().enumerate() {
            model.add_agent(Position::new(x as i32, 0), value).unwrap();
        }
        model
    }

    #[test]
    fn test_sample_gives_fresh_ids_and_size() {
        let mut model = traits(1);
        let ids = model.sample(6, None).unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(model.len(), 6);
        assert!(ids.iter().all(|id| id.get() > 4));
        assert_eq!(model.space().occupancy(), 6);
    }

    #[test]
    fn test_zero_weight_is_never_drawn() {
        let mut model = traits(2);
        let weight = |agent: &Agent<Position, f64>| agent.fields;
        model.sample(20, Some(&weight)).unwrap();
        assert!(model.agents().all().all(|a| a.fields == 1.0));
        assert!(model.agents().all().all(|a| a.pos().x >= 2));
    }

    #[test]
    fn test_failed_placement_restores_population() {
        let mut failures = 0;
        for seed in 0..10 {
            let space = GridSpace::new(4, 1, false).unwrap().with_capacity(CellCapacity::Single);
            let mut model: Model<GridSpace, f64> = Model::new(space, (), seed);
            for x in 0..4 {
                model.add_agent(Position::new(x, 0), x as f64).unwrap();
            }
            let before: Vec<Agent<Position, f64>> = model.agents().all().cloned().collect();

            match model.sample(4, None) {
                Ok(ids) => assert_eq!(model.ids(), ids),
                Err(err) => {
                    failures += 1;
                    assert!(matches!(err, Error::Occupied(_)));
                    let after: Vec<Agent<Position, f64>> = model.agents().all().cloned().collect();
                    assert_eq!(after, before);
                    assert_eq!(model.space().occupancy(), 4);
                    for agent in &after {
                        assert_eq!(model.ids_at(agent.pos()), &[agent.id()]);
                    }
                    assert!(model.add_agent(Position::new(0, 0), 9.0).is_err());
                }
            }
        }
        // Four uniform draws rarely hit four distinct cells.
        assert!(failures > 0);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut model = traits(3);
        let zero = |_: &Agent<Position, f64>| 0.0;
        assert!(matches!(model.sample(2, Some(&zero)), Err(Error::InvalidPropensity(_))));
        assert_eq!(model.len(), 4);

        let mut empty: Model<GridSpace, f64> = Model::new(GridSpace::new(2, 2, false).unwrap(), (), 0);
        assert!(empty.sample(1, None).is_err());
        assert!(empty.sample(0, None).unwrap().is_empty());
    }
}
