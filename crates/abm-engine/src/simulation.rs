//! The stepping driver.

use crate::agent::Agent;
use crate::collect::{DataCollector, DataTable, Reduction, Value};
use crate::model::Model;
use crate::parallel;
use crate::scheduler::Scheduler;
use abm_core::{AgentId, BoxError, CallbackResult, Error, ModelConfig, Result};
use abm_space::Space;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

type AgentStepFn<S, F, P> = Box<dyn FnMut(AgentId, &mut Model<S, F, P>) -> CallbackResult>;
type BatchStepFn<S, F, P> = Box<dyn FnMut(&mut Model<S, F, P>, &[AgentId]) -> Result<()>>;
type ModelStepFn<S, F, P> = Box<dyn FnMut(&mut Model<S, F, P>) -> CallbackResult>;
type StopFn<S, F, P> = Box<dyn FnMut(&Model<S, F, P>) -> bool>;

enum AgentPhase<S: Space, F, P> {
    Sequential(AgentStepFn<S, F, P>),
    Batch(BatchStepFn<S, F, P>),
}

/// When a run ends.
///
/// Predicates are checked after each completed step, never mid-step, so a
/// run always takes at least one step unless bounded by zero.
pub enum Stop<S: Space, F, P = ()> {
    Steps(u64),
    When(StopFn<S, F, P>),
    WhenOrAfter(StopFn<S, F, P>, u64),
}

impl<S: Space, F, P> Stop<S, F, P> {
    pub fn steps(n: u64) -> Self {
        Stop::Steps(n)
    }

    pub fn when(predicate: impl FnMut(&Model<S, F, P>) -> bool + 'static) -> Self {
        Stop::When(Box::new(predicate))
    }

    pub fn when_or_after(predicate: impl FnMut(&Model<S, F, P>) -> bool + 'static, max_steps: u64) -> Self {
        Stop::WhenOrAfter(Box::new(predicate), max_steps)
    }

    fn limit(&self) -> Option<u64> {
        match self {
            Stop::Steps(n) | Stop::WhenOrAfter(_, n) => Some(*n),
            Stop::When(_) => None,
        }
    }

    fn holds(&mut self, model: &Model<S, F, P>) -> bool {
        match self {
            Stop::Steps(_) => false,
            Stop::When(predicate) | Stop::WhenOrAfter(predicate, _) => predicate(model),
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Steps taken by this run
    pub steps: u64,
    pub agent_data: DataTable,
    pub model_data: DataTable,
}

/// Owns a model and advances it step by step.
///
/// Each step asks the scheduler for an activation order, runs the agent
/// update for every id in that order that is still live, then the model
/// update (or the reverse with `agents_first(false)`), and finally
/// advances the step counter. Any callback error aborts the step and is
/// returned with the step number and agent attached.
pub struct Simulation<S: Space, F, P = ()> {
    model: Model<S, F, P>,
    scheduler: Scheduler<S::Pos, F>,
    agent_phase: Option<AgentPhase<S, F, P>>,
    model_step: Option<ModelStepFn<S, F, P>>,
    agents_first: bool,
    collector: DataCollector<S, F, P>,
    collect_every: u64,
    log_every: u64,
}

impl<S, F, P> Simulation<S, F, P>
where
    S: Space + 'static,
    F: 'static,
    P: 'static,
{
    pub fn new(model: Model<S, F, P>) -> Self {
        Self {
            model,
            scheduler: Scheduler::Randomized,
            agent_phase: None,
            model_step: None,
            agents_first: true,
            collector: DataCollector::new(),
            collect_every: 1,
            log_every: 1000,
        }
    }

    /// Apply the scheduler, collection interval and log interval of `config`.
    pub fn with_config(mut self, config: &ModelConfig) -> Result<Self> {
        config.validate()?;
        self.scheduler = Scheduler::from_config(config.scheduler);
        self.collect_every = config.collect_every;
        self.log_every = config.log_every;
        Ok(self)
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler<S::Pos, F>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Sequential per-agent update with full mutable access to the model.
    pub fn with_agent_step(
        mut self,
        update: impl FnMut(AgentId, &mut Model<S, F, P>) -> CallbackResult + 'static,
    ) -> Self {
        self.agent_phase = Some(AgentPhase::Sequential(Box::new(update)));
        self
    }

    /// Per-agent update computed in parallel against the model as it was
    /// at the start of the step. The update returns the agent's new fields.
    pub fn with_parallel_agent_step<U>(mut self, update: U) -> Self
    where
        U: Fn(&Agent<S::Pos, F>, &Model<S, F, P>) -> std::result::Result<F, BoxError>
            + Send
            + Sync
            + 'static,
        S: Sync,
        S::Pos: Sync,
        F: Send + Sync,
        P: Sync,
    {
        let batch = move |model: &mut Model<S, F, P>, order: &[AgentId]| {
            parallel::step(model, order, &update)
        };
        self.agent_phase = Some(AgentPhase::Batch(Box::new(batch)));
        self
    }

    pub fn with_model_step(
        mut self,
        update: impl FnMut(&mut Model<S, F, P>) -> CallbackResult + 'static,
    ) -> Self {
        self.model_step = Some(Box::new(update));
        self
    }

    /// Run the model update after the agent pass (default) or before it.
    pub fn agents_first(mut self, agents_first: bool) -> Self {
        self.agents_first = agents_first;
        self
    }

    pub fn collect_every(mut self, steps: u64) -> Self {
        self.collect_every = steps.max(1);
        self
    }

    pub fn log_every(mut self, steps: u64) -> Self {
        self.log_every = steps;
        self
    }

    pub fn with_agent_column(
        mut self,
        name: impl Into<String>,
        probe: impl Fn(&Agent<S::Pos, F>) -> Value + 'static,
    ) -> Self {
        self.collector.agent_column(name, probe);
        self
    }

    pub fn with_model_column(
        mut self,
        name: impl Into<String>,
        probe: impl Fn(&Model<S, F, P>) -> Value + 'static,
    ) -> Self {
        self.collector.model_column(name, probe);
        self
    }

    pub fn with_agent_aggregate(
        mut self,
        name: impl Into<String>,
        quantity: impl Fn(&Agent<S::Pos, F>) -> f64 + 'static,
        reduction: Reduction,
    ) -> Self {
        self.collector.agent_aggregate(name, quantity, reduction);
        self
    }

    pub fn with_agent_count(
        mut self,
        name: impl Into<String>,
        filter: impl Fn(&Agent<S::Pos, F>) -> bool + 'static,
    ) -> Self {
        self.collector.agent_count(name, filter);
        self
    }

    pub fn model(&self) -> &Model<S, F, P> {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model<S, F, P> {
        &mut self.model
    }

    pub fn into_model(self) -> Model<S, F, P> {
        self.model
    }

    /// Advance `n` steps without collecting data.
    pub fn step(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            self.step_logged()?;
        }
        Ok(())
    }

    /// Run until `stop` is reached, collecting the initial state and then
    /// every `collect_every` steps.
    #[instrument(skip_all, fields(seed = self.model.seed()))]
    pub fn run(&mut self, mut stop: Stop<S, F, P>) -> Result<RunOutput> {
        info!(
            event = "run_started",
            start_step = self.model.steps(),
            agents = self.model.len(),
            "Starting run"
        );

        let (mut agent_data, mut model_data) = self.collector.tables();
        self.collector
            .collect(&self.model, &mut agent_data, &mut model_data);

        let mut taken = 0u64;
        loop {
            if stop.limit().is_some_and(|limit| taken >= limit) {
                break;
            }
            self.step_logged()?;
            taken += 1;

            if taken % self.collect_every == 0 {
                self.collector
                    .collect(&self.model, &mut agent_data, &mut model_data);
            }
            if stop.holds(&self.model) {
                debug!(event = "stop_condition_met", step = self.model.steps());
                break;
            }
        }

        info!(
            event = "run_finished",
            steps = taken,
            final_step = self.model.steps(),
            agents = self.model.len(),
            agent_rows = agent_data.len(),
            model_rows = model_data.len(),
            "Run complete"
        );

        Ok(RunOutput {
            steps: taken,
            agent_data,
            model_data,
        })
    }

    fn step_logged(&mut self) -> Result<()> {
        let before = self.model.len();
        if let Err(err) = self.step_once() {
            warn!(event = "run_aborted", step = ?err.step(), agent = ?err.agent(), error = %err);
            return Err(err);
        }

        let step = self.model.steps();
        let after = self.model.len();
        if before != after {
            debug!(event = "population_changed", step, from = before, to = after);
        }
        if self.log_every > 0 && step % self.log_every == 0 {
            info!(event = "progress", step, agents = after, "Step {} complete", step);
        }
        Ok(())
    }

    fn step_once(&mut self) -> Result<()> {
        let step = self.model.steps() + 1;
        if !self.agents_first {
            self.run_model_step(step)?;
        }
        self.run_agent_phase(step)?;
        if self.agents_first {
            self.run_model_step(step)?;
        }
        self.model.advance_step();
        Ok(())
    }

    fn run_agent_phase(&mut self, step: u64) -> Result<()> {
        let Some(phase) = self.agent_phase.as_mut() else {
            return Ok(());
        };
        let order = self
            .model
            .schedule(&mut self.scheduler)
            .map_err(|source| Error::Schedule {
                step,
                source: Box::new(source),
            })?;
        match phase {
            AgentPhase::Sequential(update) => {
                for id in order {
                    // Removed earlier in this step.
                    if !self.model.contains(id) {
                        continue;
                    }
                    update(id, &mut self.model).map_err(|source| Error::Callback {
                        step,
                        agent: Some(id),
                        source,
                    })?;
                }
                Ok(())
            }
            AgentPhase::Batch(batch) => batch(&mut self.model, &order),
        }
    }

    fn run_model_step(&mut self, step: u64) -> Result<()> {
        match self.model_step.as_mut() {
            Some(update) => update(&mut self.model).map_err(|source| Error::Callback {
                step,
                agent: None,
                source,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AgentStore;
    use abm_core::Position;
    use abm_space::GridSpace;
    use rand_chacha::ChaCha8Rng;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Grid = Model<GridSpace, u32>;

    fn populated(n: i32) -> Grid {
        let mut model = Model::new(GridSpace::new(10, 10, true).unwrap(), (), 5);
        for i in 0..n {
            model.add_agent(Position::new(i, i), 0).unwrap();
        }
        model
    }

    #[test]
    fn test_step_counts_and_updates_every_agent() {
        let mut sim = Simulation::new(populated(4)).with_agent_step(|id, model: &mut Grid| {
            model.agent_mut(id)?.fields += 1;
            Ok(())
        });
        sim.step(3).unwrap();
        assert_eq!(sim.model().steps(), 3);
        assert!(sim.model().agents().all().all(|a| a.fields == 3));
    }

    #[test]
    fn test_model_step_ordering() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let agent_log = Rc::clone(&log);
        let model_log = Rc::clone(&log);
        let mut sim = Simulation::new(populated(1))
            .with_agent_step(move |_, _: &mut Grid| {
                agent_log.borrow_mut().push("agent");
                Ok(())
            })
            .with_model_step(move |_: &mut Grid| {
                model_log.borrow_mut().push("model");
                Ok(())
            })
            .agents_first(false);
        sim.step(2).unwrap();
        assert_eq!(*log.borrow(), vec!["model", "agent", "model", "agent"]);
    }

    #[test]
    fn test_run_collects_initial_state_and_interval() {
        let mut sim = Simulation::new(populated(2))
            .with_scheduler(Scheduler::Sequential)
            .with_agent_step(|id, model: &mut Grid| {
                model.agent_mut(id)?.fields += 1;
                Ok(())
            })
            .with_agent_column("count", |agent: &Agent<Position, u32>| Value::from(agent.fields))
            .with_model_column("population", |model: &Grid| Value::from(model.len()))
            .collect_every(2);
        let output = sim.run(Stop::steps(5)).unwrap();

        assert_eq!(output.steps, 5);
        let steps: Vec<i64> = output
            .model_data
            .column("step")
            .unwrap()
            .into_iter()
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(steps, vec![0, 2, 4]);
        assert_eq!(output.agent_data.len(), 6);
        assert_eq!(output.agent_data.rows()[5][2], Value::Int(4));
    }

    #[test]
    fn test_predicate_stops_after_step() {
        let mut sim = Simulation::new(populated(3)).with_model_step(|model: &mut Grid| {
            if let Some(id) = model.ids().first().copied() {
                model.remove_agent(id)?;
            }
            Ok(())
        });
        let output = sim.run(Stop::when(|model: &Grid| model.is_empty())).unwrap();
        assert_eq!(output.steps, 3);
        assert_eq!(sim.model().steps(), 3);
    }

    #[test]
    fn test_when_or_after_caps_steps() {
        let mut sim: Simulation<GridSpace, u32> = Simulation::new(populated(1));
        let output = sim
            .run(Stop::when_or_after(|_: &Grid| false, 4))
            .unwrap();
        assert_eq!(output.steps, 4);
        assert!(output.model_data.is_empty());
    }

    #[test]
    fn test_bad_custom_order_reports_step() {
        let mut sim = Simulation::new(populated(3))
            .with_scheduler(Scheduler::custom(|store: &AgentStore<Position, u32>, _: &mut ChaCha8Rng| {
                let mut ids = store.ids();
                if store.all().any(|agent| agent.fields > 0) {
                    ids.pop();
                }
                ids
            }))
            .with_agent_step(|id, model: &mut Grid| {
                model.agent_mut(id)?.fields += 1;
                Ok(())
            });
        let err = sim.run(Stop::steps(5)).unwrap_err();
        assert_eq!(err.step(), Some(2));
        assert_eq!(err.agent(), None);
        assert_eq!(
            err.to_string(),
            "scheduling failed at step 2: invalid schedule: 2 of 3 live agents scheduled"
        );
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("invalid schedule: 2 of 3 live agents scheduled"));
        assert_eq!(sim.model().steps(), 1);
    }

    #[test]
    fn test_model_step_error_has_no_agent() {
        let mut sim = Simulation::new(populated(1))
            .with_model_step(|model: &mut Grid| {
                if model.steps() == 1 {
                    return Err("drought".into());
                }
                Ok(())
            });
        let err = sim.run(Stop::steps(10)).unwrap_err();
        assert_eq!(err.step(), Some(2));
        assert_eq!(err.agent(), None);
        assert_eq!(err.to_string(), "callback failed at step 2 (model step): drought");
        assert_eq!(sim.model().steps(), 1);
    }
}
