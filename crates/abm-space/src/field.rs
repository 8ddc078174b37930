//! Dense per-cell scalar fields (heat, pheromone, nutrient) over a grid.

use crate::grid::GridSpace;
use crate::space::Space;
use abm_core::{Error, Position, Result};
use serde::{Deserialize, Serialize};

const MOORE: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// A matrix of `f64` values, one per grid cell, sharing the grid's topology.
///
/// Diffusion honours the topology: on a periodic field shares wrap to the
/// opposite edge, on a bounded field shares leaving the grid are lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellField {
    pub width: i32,
    pub height: i32,
    periodic: bool,
    values: Vec<f64>,
}

impl CellField {
    pub fn new(width: i32, height: i32, periodic: bool, initial: f64) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidConfig(format!(
                "field dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            periodic,
            values: vec![initial; (width as usize) * (height as usize)],
        })
    }

    /// A field matching the dimensions and topology of `grid`.
    pub fn for_grid(grid: &GridSpace, initial: f64) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            periodic: grid.periodic(),
            values: vec![initial; grid.num_cells()],
        }
    }

    fn index(&self, pos: Position) -> Result<usize> {
        let pos = if pos.in_bounds(self.width, self.height) {
            pos
        } else if self.periodic {
            pos.wrap(self.width, self.height)
        } else {
            return Err(Error::OutOfBounds {
                position: pos.to_string(),
                bounds: format!("[0, {}) x [0, {})", self.width, self.height),
            });
        };
        Ok((pos.y * self.width + pos.x) as usize)
    }

    pub fn get(&self, pos: Position) -> Result<f64> {
        Ok(self.values[self.index(pos)?])
    }

    pub fn set(&mut self, pos: Position, value: f64) -> Result<()> {
        let index = self.index(pos)?;
        self.values[index] = value;
        Ok(())
    }

    pub fn add(&mut self, pos: Position, amount: f64) -> Result<f64> {
        let index = self.index(pos)?;
        self.values[index] += amount;
        Ok(self.values[index])
    }

    pub fn fill(&mut self, value: f64) {
        self.values.fill(value);
    }

    /// Row-major values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Spread a `rate` fraction of every cell equally over its eight Moore
    /// neighbours.
    pub fn diffuse(&mut self, rate: f64) -> Result<()> {
        check_rate(rate)?;
        let share = rate / MOORE.len() as f64;
        let mut next: Vec<f64> = self.values.iter().map(|v| v * (1.0 - rate)).collect();
        for y in 0..self.height {
            for x in 0..self.width {
                let outgoing = self.values[(y * self.width + x) as usize] * share;
                if outgoing == 0.0 {
                    continue;
                }
                for (dx, dy) in MOORE {
                    // Bounded fields drop shares that leave the grid.
                    if let Ok(target) = self.index(Position::new(x + dx, y + dy)) {
                        next[target] += outgoing;
                    }
                }
            }
        }
        self.values = next;
        Ok(())
    }

    /// Multiply every cell by `1 - rate`.
    pub fn evaporate(&mut self, rate: f64) -> Result<()> {
        check_rate(rate)?;
        for value in &mut self.values {
            *value *= 1.0 - rate;
        }
        Ok(())
    }
}

fn check_rate(rate: f64) -> Result<()> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("rate {rate} is outside [0, 1]")))
    }
}
