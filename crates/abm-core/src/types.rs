//! Core type definitions shared by spaces and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an agent.
///
/// Allocated monotonically by the agent store and never reused within a model,
/// even after the agent is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl AgentId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Discrete cell position on a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// `None` if either coordinate overflows `i32`.
    pub fn checked_add(&self, dx: i32, dy: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
        })
    }

    /// Apply toroidal wrapping for given grid dimensions
    pub fn wrap(&self, width: i32, height: i32) -> Self {
        Self {
            x: self.x.rem_euclid(width),
            y: self.y.rem_euclid(height),
        }
    }

    pub fn in_bounds(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.x < width && self.y >= 0 && self.y < height
    }

    /// Manhattan distance to another position (no wrapping)
    pub fn manhattan_distance(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Chebyshev distance to another position (no wrapping)
    pub fn chebyshev_distance(&self, other: &Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Point in a continuous plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Wrap into `[0, width) x [0, height)`.
    pub fn wrap(&self, width: f64, height: f64) -> Self {
        Self {
            x: wrap_coord(self.x, width),
            y: wrap_coord(self.y, height),
        }
    }

    pub fn in_bounds(&self, width: f64, height: f64) -> bool {
        self.x >= 0.0 && self.x < width && self.y >= 0.0 && self.y < height
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

// rem_euclid can round up to exactly `extent` for tiny negative inputs.
fn wrap_coord(value: f64, extent: f64) -> f64 {
    let wrapped = value.rem_euclid(extent);
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}

/// Distance function used by neighbor queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// max(|dx|, |dy|): the Moore neighbourhood on grids
    #[default]
    Chebyshev,
    /// |dx| + |dy|: the von Neumann neighbourhood on grids
    Manhattan,
    /// sqrt(dx² + dy²)
    Euclidean,
}

impl Metric {
    pub fn distance(&self, dx: f64, dy: f64) -> f64 {
        let (dx, dy) = (dx.abs(), dy.abs());
        match self {
            Metric::Chebyshev => dx.max(dy),
            Metric::Manhattan => dx + dy,
            Metric::Euclidean => dx.hypot(dy),
        }
    }

    /// Whether an offset lies within `radius` under this metric.
    ///
    /// Euclidean compares squared lengths so integer grid offsets on the
    /// boundary circle are included exactly.
    pub fn within(&self, dx: f64, dy: f64, radius: f64) -> bool {
        match self {
            Metric::Euclidean => dx * dx + dy * dy <= radius * radius,
            _ => self.distance(dx, dy) <= radius,
        }
    }
}
