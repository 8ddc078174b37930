//! Per-step data collection into serializable tables.

use crate::agent::Agent;
use crate::model::Model;
use abm_space::Space;
use serde::{Deserialize, Serialize};

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Ordered rows under named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }

    pub(crate) fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }
}

/// How an agent quantity collapses into one model-table value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Sum,
    Mean,
    Min,
    Max,
}

impl Reduction {
    /// `Sum` of nothing is zero; the others have no value over an empty
    /// population and yield `Value::Null`.
    pub fn reduce(self, values: impl Iterator<Item = f64>) -> Value {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        match (self, count) {
            (Reduction::Sum, _) => Value::Float(sum),
            (_, 0) => Value::Null,
            (Reduction::Mean, n) => Value::Float(sum / n as f64),
            (Reduction::Min, _) => Value::Float(min),
            (Reduction::Max, _) => Value::Float(max),
        }
    }
}

type AgentProbe<S, F> = Box<dyn Fn(&Agent<<S as Space>::Pos, F>) -> Value>;
type AgentQuantity<S, F> = Box<dyn Fn(&Agent<<S as Space>::Pos, F>) -> f64>;
type AgentFilter<S, F> = Box<dyn Fn(&Agent<<S as Space>::Pos, F>) -> bool>;
type ModelProbeFn<S, F, P> = Box<dyn Fn(&Model<S, F, P>) -> Value>;

enum ModelProbe<S: Space, F, P> {
    Model(ModelProbeFn<S, F, P>),
    Aggregate(AgentQuantity<S, F>, Reduction),
    Count(AgentFilter<S, F>),
}

impl<S: Space, F, P> ModelProbe<S, F, P> {
    fn sample(&self, model: &Model<S, F, P>) -> Value {
        match self {
            ModelProbe::Model(probe) => probe(model),
            ModelProbe::Aggregate(quantity, reduction) => {
                reduction.reduce(model.agents().all().map(|agent| quantity(agent)))
            }
            ModelProbe::Count(filter) => {
                Value::from(model.agents().all().filter(|agent| filter(agent)).count())
            }
        }
    }
}

/// Named probes sampled at collection points.
pub struct DataCollector<S: Space, F, P> {
    agent_columns: Vec<(String, AgentProbe<S, F>)>,
    model_columns: Vec<(String, ModelProbe<S, F, P>)>,
}

impl<S: Space, F, P> Default for DataCollector<S, F, P> {
    fn default() -> Self {
        Self {
            agent_columns: Vec::new(),
            model_columns: Vec::new(),
        }
    }
}

impl<S: Space, F, P> DataCollector<S, F, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.agent_columns.is_empty() && self.model_columns.is_empty()
    }

    pub fn agent_column(
        &mut self,
        name: impl Into<String>,
        probe: impl Fn(&Agent<S::Pos, F>) -> Value + 'static,
    ) {
        self.agent_columns.push((name.into(), Box::new(probe)));
    }

    pub fn model_column(
        &mut self,
        name: impl Into<String>,
        probe: impl Fn(&Model<S, F, P>) -> Value + 'static,
    ) {
        self.model_columns
            .push((name.into(), ModelProbe::Model(Box::new(probe))));
    }

    pub fn agent_aggregate(
        &mut self,
        name: impl Into<String>,
        quantity: impl Fn(&Agent<S::Pos, F>) -> f64 + 'static,
        reduction: Reduction,
    ) {
        self.model_columns.push((
            name.into(),
            ModelProbe::Aggregate(Box::new(quantity), reduction),
        ));
    }

    pub fn agent_count(
        &mut self,
        name: impl Into<String>,
        filter: impl Fn(&Agent<S::Pos, F>) -> bool + 'static,
    ) {
        self.model_columns
            .push((name.into(), ModelProbe::Count(Box::new(filter))));
    }

    /// Empty tables with this collector's headers.
    pub fn tables(&self) -> (DataTable, DataTable) {
        let mut agent = vec!["step".to_string(), "id".to_string()];
        agent.extend(self.agent_columns.iter().map(|(name, _)| name.clone()));
        let mut model = vec!["step".to_string()];
        model.extend(self.model_columns.iter().map(|(name, _)| name.clone()));
        (DataTable::new(agent), DataTable::new(model))
    }

    /// Append one row per live agent and one model row, tagged with the
    /// model's step counter.
    pub fn collect(
        &self,
        model: &Model<S, F, P>,
        agent_table: &mut DataTable,
        model_table: &mut DataTable,
    ) {
        let step = Value::Int(model.steps() as i64);
        if !self.agent_columns.is_empty() {
            for agent in model.agents().all() {
                let mut row = Vec::with_capacity(self.agent_columns.len() + 2);
                row.push(step.clone());
                row.push(Value::Int(agent.id().get() as i64));
                row.extend(self.agent_columns.iter().map(|(_, probe)| probe(agent)));
                agent_table.push_row(row);
            }
        }
        if !self.model_columns.is_empty() {
            let mut row = Vec::with_capacity(self.model_columns.len() + 1);
            row.push(step);
            row.extend(self.model_columns.iter().map(|(_, probe)| probe.sample(model)));
            model_table.push_row(row);
        }
    }
}
