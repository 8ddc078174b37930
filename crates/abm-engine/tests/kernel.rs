//! Driver-level guarantees: determinism, removal safety, error context,
//! snapshot continuation and the bounds/id invariants.

use abm_core::{AgentId, CallbackResult, Error, Point, Position};
use abm_engine::{Agent, Model, Reduction, Scheduler, Simulation, Stop, Value};
use abm_space::{ContinuousSpace, GridSpace, Space};
use proptest::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

// ── Helpers ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Walker {
    energy: i64,
}

type WalkerModel = Model<GridSpace, Walker>;

fn walker_model(seed: u64, periodic: bool) -> WalkerModel {
    let mut model = Model::new(GridSpace::new(12, 12, periodic).unwrap(), (), seed);
    for _ in 0..20 {
        model.add_agent_random(Walker { energy: 6 }).unwrap();
    }
    model
}

/// Random walk that burns energy, dies at zero and sometimes splits.
fn wander(id: AgentId, model: &mut WalkerModel) -> CallbackResult {
    let delta = Position::new(model.rng().gen_range(-1..=1), model.rng().gen_range(-1..=1));
    match model.walk(id, delta) {
        Err(Error::OutOfBounds { .. }) => {}
        other => {
            other?;
        }
    }

    let energy = {
        let agent = model.agent_mut(id)?;
        agent.fields.energy -= 1;
        agent.fields.energy
    };
    if energy <= 0 {
        model.remove_agent(id)?;
    } else if model.rng().gen_bool(0.25) {
        let pos = model.agent(id)?.pos();
        model.add_agent(pos, Walker { energy: 4 })?;
    }
    Ok(())
}

fn walker_sim(model: WalkerModel) -> Simulation<GridSpace, Walker> {
    Simulation::new(model)
        .with_agent_step(wander)
        .with_agent_column("x", |a: &Agent<Position, Walker>| Value::from(a.pos().x))
        .with_agent_column("y", |a: &Agent<Position, Walker>| Value::from(a.pos().y))
        .with_agent_column("energy", |a: &Agent<Position, Walker>| Value::from(a.fields.energy))
        .with_agent_aggregate(
            "mean_energy",
            |a: &Agent<Position, Walker>| a.fields.energy as f64,
            Reduction::Mean,
        )
        .with_model_column("population", |m: &WalkerModel| Value::from(m.len()))
}

fn assert_consistent<S: Space, F>(model: &Model<S, F>) {
    let ids = model.ids();
    let unique: HashSet<AgentId> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(model.space().occupancy(), ids.len());
}

// ── Determinism ─────────────────────────────────────────────────

#[test]
fn same_seed_gives_byte_identical_tables() {
    let first = walker_sim(walker_model(77, true)).run(Stop::steps(15)).unwrap();
    let second = walker_sim(walker_model(77, true)).run(Stop::steps(15)).unwrap();

    let a = serde_json::to_string(&first).unwrap();
    let b = serde_json::to_string(&second).unwrap();
    assert_eq!(a, b);
    assert!(first.agent_data.len() > 20);
}

#[test]
fn different_seeds_diverge() {
    let first = walker_sim(walker_model(1, true)).run(Stop::steps(10)).unwrap();
    let second = walker_sim(walker_model(2, true)).run(Stop::steps(10)).unwrap();
    assert_ne!(first.agent_data, second.agent_data);
}

// ── Removal safety ──────────────────────────────────────────────

#[test]
fn removed_agents_are_not_activated_later_in_the_step() {
    let mut model: Model<GridSpace, ()> = Model::new(GridSpace::new(5, 5, true).unwrap(), (), 0);
    for x in 0..6 {
        model.add_agent(Position::new(x % 5, 0), ()).unwrap();
    }
    let visited = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&visited);

    let mut sim = Simulation::new(model)
        .with_scheduler(Scheduler::Sequential)
        .with_agent_step(move |id, model: &mut Model<GridSpace, ()>| {
            log.borrow_mut().push(id);
            let next = AgentId(id.get() + 1);
            if model.contains(next) {
                model.remove_agent(next)?;
            }
            Ok(())
        });
    sim.step(1).unwrap();

    let expected: Vec<AgentId> = [1, 3, 5].into_iter().map(AgentId).collect();
    assert_eq!(*visited.borrow(), expected);
    assert_eq!(sim.model().ids(), expected);
}

#[test]
fn random_predation_never_activates_the_dead() {
    let mut model: Model<GridSpace, ()> = Model::new(GridSpace::new(8, 8, true).unwrap(), (), 9);
    for _ in 0..40 {
        model.add_agent_random(()).unwrap();
    }
    let removed = Rc::new(RefCell::new(HashSet::new()));
    let graveyard = Rc::clone(&removed);

    let mut sim = Simulation::new(model).with_agent_step(move |id, model: &mut Model<GridSpace, ()>| {
        assert!(!graveyard.borrow().contains(&id), "{id} activated after removal");
        if let Some(prey) = model.random_agent_where(|a| a.id() != id) {
            if model.rng().gen_bool(0.3) {
                model.remove_agent(prey)?;
                graveyard.borrow_mut().insert(prey);
            }
        }
        Ok(())
    });
    sim.step(5).unwrap();
    assert!(sim.model().len() < 40);
    assert_consistent(sim.model());
}

// ── Error context ───────────────────────────────────────────────

#[test]
fn callback_error_carries_step_and_agent() {
    let mut model: Model<GridSpace, u32> = Model::new(GridSpace::new(4, 4, false).unwrap(), (), 0);
    for x in 0..4 {
        model.add_agent(Position::new(x, 0), 0).unwrap();
    }
    let mut sim = Simulation::new(model)
        .with_scheduler(Scheduler::Sequential)
        .with_agent_step(|id, model: &mut Model<GridSpace, u32>| {
            if model.steps() == 1 && id == AgentId(3) {
                return Err("negative biomass".into());
            }
            model.agent_mut(id)?.fields += 1;
            Ok(())
        });

    let err = sim.run(Stop::steps(5)).unwrap_err();
    assert!(matches!(err, Error::Callback { step: 2, agent: Some(AgentId(3)), .. }));
    assert_eq!(err.to_string(), "callback failed at step 2 (agent #3): negative biomass");
    let source = std::error::Error::source(&err).map(|s| s.to_string());
    assert_eq!(source.as_deref(), Some("negative biomass"));

    // Agents before #3 in the aborted step were already updated.
    let fields: Vec<u32> = sim.model().agents().all().map(|a| a.fields).collect();
    assert_eq!(fields, vec![2, 2, 1, 1]);
}

#[test]
fn kernel_errors_inside_callbacks_propagate() {
    let mut model: Model<GridSpace, ()> = Model::new(GridSpace::new(3, 3, false).unwrap(), (), 0);
    let id = model.add_agent(Position::new(2, 2), ()).unwrap();
    let mut sim = Simulation::new(model).with_agent_step(|id, model: &mut Model<GridSpace, ()>| {
        model.walk(id, Position::new(1, 0))?;
        Ok(())
    });
    let err = sim.step(1).unwrap_err();
    assert_eq!(err.agent(), Some(id));
    assert!(err.to_string().contains("outside the space bounds"), "{err}");
}

// ── Snapshots ───────────────────────────────────────────────────

#[test]
fn restored_snapshot_continues_identically() {
    let mut original = walker_sim(walker_model(31, true));
    original.step(5).unwrap();
    let bytes = original.model().to_bytes().unwrap();
    let expected = original.run(Stop::steps(6)).unwrap();

    let restored = WalkerModel::from_bytes(&bytes).unwrap();
    assert_eq!(restored.steps(), 5);
    let actual = walker_sim(restored).run(Stop::steps(6)).unwrap();
    assert_eq!(actual, expected);
}

// ── Invariants ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn grid_positions_stay_in_bounds(seed in any::<u64>(), periodic in any::<bool>()) {
        let mut sim = walker_sim(walker_model(seed, periodic));
        for _ in 0..8 {
            sim.step(1).unwrap();
            let model = sim.model();
            assert_consistent(model);
            for agent in model.agents().all() {
                prop_assert!(agent.pos().in_bounds(12, 12));
                prop_assert!(model.space().ids_at(agent.pos()).contains(&agent.id()));
            }
        }
    }

    #[test]
    fn continuous_positions_stay_in_bounds(seed in any::<u64>()) {
        let space = ContinuousSpace::new(10.0, 5.0, true, 1.0).unwrap();
        let mut model: Model<ContinuousSpace, ()> = Model::new(space, (), seed);
        for _ in 0..15 {
            model.add_agent_random(()).unwrap();
        }
        let mut sim = Simulation::new(model).with_agent_step(|id, model: &mut Model<ContinuousSpace, ()>| {
            let delta = Point::new(model.rng().gen_range(-3.0..3.0), model.rng().gen_range(-3.0..3.0));
            model.walk(id, delta)?;
            Ok(())
        });
        sim.step(10).unwrap();
        for agent in sim.model().agents().all() {
            prop_assert!(agent.pos().in_bounds(10.0, 5.0));
            prop_assert_eq!(sim.model().space().position_of(agent.id()), Some(agent.pos()));
        }
    }

    #[test]
    fn ids_are_never_reused(seed in any::<u64>()) {
        let mut sim = walker_sim(walker_model(seed, true));
        let mut seen: HashSet<AgentId> = sim.model().ids().into_iter().collect();
        let mut highest = sim.model().ids().last().copied().unwrap_or(AgentId(0));
        for _ in 0..6 {
            sim.step(1).unwrap();
            for id in sim.model().ids() {
                if seen.insert(id) {
                    prop_assert!(id > highest);
                    highest = id;
                }
            }
        }
    }
}
