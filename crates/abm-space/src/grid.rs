//! 2D grid space with per-cell occupancy.

use crate::space::Space;
use abm_core::{AgentId, CellCapacity, Error, GridConfig, Metric, Position, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// Random probes before `random_empty` falls back to a full scan.
const RANDOM_EMPTY_PROBES: usize = 16;

/// A 2D grid, optionally toroidal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSpace {
    pub width: i32,
    pub height: i32,
    periodic: bool,
    metric: Metric,
    capacity: CellCapacity,
    /// Agent ids per cell in row-major order, each list sorted ascending
    cells: Vec<Vec<AgentId>>,
    occupancy: usize,
}

impl GridSpace {
    pub fn new(width: i32, height: i32, periodic: bool) -> Result<Self> {
        Self::from_config(&GridConfig {
            width,
            height,
            periodic,
            ..Default::default()
        })
    }

    /// Create a grid from configuration
    pub fn from_config(config: &GridConfig) -> Result<Self> {
        config.validate()?;
        let size = (config.width as usize) * (config.height as usize);
        Ok(Self {
            width: config.width,
            height: config.height,
            periodic: config.periodic,
            metric: config.metric,
            capacity: config.capacity,
            cells: vec![Vec::new(); size],
            occupancy: 0,
        })
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_capacity(mut self, capacity: CellCapacity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn capacity(&self) -> CellCapacity {
        self.capacity
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn bounds(&self) -> String {
        format!("[0, {}) x [0, {})", self.width, self.height)
    }

    fn pos_to_index(&self, pos: Position) -> usize {
        (pos.y * self.width + pos.x) as usize
    }

    /// Get position from index
    pub fn index_to_pos(&self, index: usize) -> Position {
        let x = (index as i32) % self.width;
        let y = (index as i32) / self.width;
        Position::new(x, y)
    }

    /// Agents in the cell at `pos`, ascending. Empty for invalid positions.
    pub fn ids_at(&self, pos: Position) -> &[AgentId] {
        match self.normalize(pos) {
            Ok(pos) => &self.cells[self.pos_to_index(pos)],
            Err(_) => &[],
        }
    }

    pub fn is_empty(&self, pos: Position) -> bool {
        self.ids_at(pos).is_empty()
    }

    /// Iterator over all positions
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.cells.len()).map(move |i| self.index_to_pos(i))
    }

    /// Iterator over all cells with positions
    pub fn iter(&self) -> impl Iterator<Item = (Position, &[AgentId])> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, ids)| (self.index_to_pos(i), ids.as_slice()))
    }

    pub fn empty_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.iter()
            .filter(|(_, ids)| ids.is_empty())
            .map(|(pos, _)| pos)
    }

    /// Random unoccupied cell, or `None` if the grid is full.
    pub fn random_empty<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Position> {
        if self.occupancy < self.cells.len() {
            for _ in 0..RANDOM_EMPTY_PROBES {
                let pos = self.random_position(rng);
                if self.is_empty(pos) {
                    return Some(pos);
                }
            }
        }
        let empty: Vec<Position> = self.empty_positions().collect();
        empty.choose(rng).copied()
    }

    /// Offsets within `radius` under `metric`, excluding the origin, with
    /// neither component larger than `reach` in magnitude.
    ///
    /// Ordered by `dy`, then `dx`, so queries enumerate cells row-major.
    pub fn offsets(radius: f64, metric: Metric, reach: i32) -> Vec<(i32, i32)> {
        if !(radius >= 1.0) || reach < 1 {
            return Vec::new();
        }
        let r = radius.min(reach as f64).floor() as i32;
        let mut offsets = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if metric.within(dx as f64, dy as f64, radius) {
                    offsets.push((dx, dy));
                }
            }
        }
        offsets
    }

    /// Cells within `radius` of `pos`, excluding `pos` itself.
    ///
    /// Out-of-range cells are dropped on a bounded grid and wrapped on a
    /// periodic one; a cell reached through more than one wrapped offset is
    /// reported once. Offsets are enumerated no further than the larger grid
    /// side, which already reaches every cell, so huge or infinite radii
    /// cost no more than a full scan.
    pub fn nearby_positions(
        &self,
        pos: Position,
        radius: f64,
        metric: Metric,
    ) -> impl Iterator<Item = Position> {
        let mut cells = Vec::new();
        if let Ok(center) = self.normalize(pos) {
            let mut seen = HashSet::new();
            seen.insert(center);
            let reach = self.width.max(self.height);
            for (dx, dy) in Self::offsets(radius, metric, reach) {
                let Some(target) = center.checked_add(dx, dy) else {
                    continue;
                };
                if let Ok(candidate) = self.normalize(target) {
                    if seen.insert(candidate) {
                        cells.push(candidate);
                    }
                }
            }
        }
        cells.into_iter()
    }
}

impl Space for GridSpace {
    type Pos = Position;

    fn normalize(&self, pos: Position) -> Result<Position> {
        if pos.in_bounds(self.width, self.height) {
            Ok(pos)
        } else if self.periodic {
            Ok(pos.wrap(self.width, self.height))
        } else {
            Err(Error::OutOfBounds {
                position: pos.to_string(),
                bounds: self.bounds(),
            })
        }
    }

    fn translate(&self, pos: Position, delta: Position) -> Result<Position> {
        // On a torus only the displacement modulo the grid size matters.
        let (pos, delta) = if self.periodic {
            let delta = Position::new(delta.x.rem_euclid(self.width), delta.y.rem_euclid(self.height));
            (self.normalize(pos)?, delta)
        } else {
            (pos, delta)
        };
        match pos.checked_add(delta.x, delta.y) {
            Some(target) => self.normalize(target),
            None => Err(Error::OutOfBounds {
                position: format!("{pos} + {delta}"),
                bounds: self.bounds(),
            }),
        }
    }

    fn insert(&mut self, id: AgentId, pos: Position) -> Result<Position> {
        let pos = self.normalize(pos)?;
        let index = self.pos_to_index(pos);
        let cell = &mut self.cells[index];
        if self.capacity == CellCapacity::Single && cell.iter().any(|&other| other != id) {
            return Err(Error::Occupied(format!("cell {pos}")));
        }
        if let Err(slot) = cell.binary_search(&id) {
            cell.insert(slot, id);
            self.occupancy += 1;
        }
        Ok(pos)
    }

    fn remove(&mut self, id: AgentId, pos: Position) {
        let Ok(pos) = self.normalize(pos) else {
            return;
        };
        let index = self.pos_to_index(pos);
        let cell = &mut self.cells[index];
        if let Ok(slot) = cell.binary_search(&id) {
            cell.remove(slot);
            self.occupancy -= 1;
        }
    }

    fn nearby_ids(
        &self,
        pos: Position,
        radius: f64,
        metric: Metric,
    ) -> impl Iterator<Item = AgentId> + '_ {
        let here = self.ids_at(pos).iter().copied();
        let around = self
            .nearby_positions(pos, radius, metric)
            .flat_map(move |cell| self.ids_at(cell).iter().copied());
        here.chain(around)
    }

    fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        Position::new(rng.gen_range(0..self.width), rng.gen_range(0..self.height))
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn periodic(&self) -> bool {
        self.periodic
    }

    fn occupancy(&self) -> usize {
        self.occupancy
    }
}
