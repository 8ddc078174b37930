//! Continuous 2D space with a bucketed spatial index.

use crate::space::Space;
use abm_core::{AgentId, ContinuousConfig, Error, Metric, Point, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bounded (or toroidal) plane `[0, width) x [0, height)`.
///
/// Agents are bucketed into square cells of `cell_size` so radius queries
/// only inspect buckets overlapping the query, then filter by exact distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuousSpace {
    pub width: f64,
    pub height: f64,
    periodic: bool,
    metric: Metric,
    cell_size: f64,
    cols: i32,
    rows: i32,
    buckets: Vec<Vec<AgentId>>,
    positions: BTreeMap<AgentId, Point>,
}

impl ContinuousSpace {
    pub fn new(width: f64, height: f64, periodic: bool, cell_size: f64) -> Result<Self> {
        Self::from_config(&ContinuousConfig {
            width,
            height,
            periodic,
            cell_size,
            ..Default::default()
        })
    }

    pub fn from_config(config: &ContinuousConfig) -> Result<Self> {
        config.validate()?;
        let cols = ((config.width / config.cell_size).ceil() as i32).max(1);
        let rows = ((config.height / config.cell_size).ceil() as i32).max(1);
        Ok(Self {
            width: config.width,
            height: config.height,
            periodic: config.periodic,
            metric: config.metric,
            cell_size: config.cell_size,
            cols,
            rows,
            buckets: vec![Vec::new(); (cols as usize) * (rows as usize)],
            positions: BTreeMap::new(),
        })
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn position_of(&self, id: AgentId) -> Option<Point> {
        self.positions.get(&id).copied()
    }

    /// Distance between two in-bounds points. Periodic spaces use the
    /// shortest displacement across the wrap.
    pub fn distance(&self, a: Point, b: Point, metric: Metric) -> f64 {
        let (dx, dy) = self.displacement(a, b);
        metric.distance(dx, dy)
    }

    fn displacement(&self, a: Point, b: Point) -> (f64, f64) {
        let mut dx = (a.x - b.x).abs();
        let mut dy = (a.y - b.y).abs();
        if self.periodic {
            dx = dx.min(self.width - dx);
            dy = dy.min(self.height - dy);
        }
        (dx, dy)
    }

    /// Closest agent within `radius`, ties broken by ascending id.
    pub fn nearest(&self, pos: Point, radius: f64, exclude: Option<AgentId>) -> Option<AgentId> {
        let Ok(pos) = self.normalize(pos) else {
            return None;
        };
        self.candidates(pos, radius)
            .into_iter()
            .filter(|&id| Some(id) != exclude)
            .filter_map(|id| {
                let (dx, dy) = self.displacement(pos, *self.positions.get(&id)?);
                self.metric
                    .within(dx, dy, radius)
                    .then(|| (self.metric.distance(dx, dy), id))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }

    fn bucket_of(&self, pos: Point) -> usize {
        let cx = ((pos.x / self.cell_size) as i32).clamp(0, self.cols - 1);
        let cy = ((pos.y / self.cell_size) as i32).clamp(0, self.rows - 1);
        (cy * self.cols + cx) as usize
    }

    /// Inclusive bucket index ranges covering `[center - r, center + r]`
    /// along one axis.
    fn axis_ranges(&self, center: f64, r: f64, extent: f64, buckets: i32) -> Vec<(i32, i32)> {
        let to_bucket = |coord: f64| ((coord / self.cell_size).floor() as i32).clamp(0, buckets - 1);
        let (lo, hi) = (center - r, center + r);
        if !self.periodic {
            return vec![(to_bucket(lo.max(0.0)), to_bucket(hi.min(extent)))];
        }
        if 2.0 * r >= extent {
            return vec![(0, buckets - 1)];
        }
        if lo < 0.0 {
            vec![(to_bucket(lo + extent), buckets - 1), (0, to_bucket(hi))]
        } else if hi >= extent {
            vec![(to_bucket(lo), buckets - 1), (0, to_bucket(hi - extent))]
        } else {
            vec![(to_bucket(lo), to_bucket(hi))]
        }
    }

    /// Ids in every bucket overlapping the query square, ascending, unique.
    fn candidates(&self, pos: Point, radius: f64) -> Vec<AgentId> {
        if !(radius >= 0.0) {
            return Vec::new();
        }
        let xs = self.axis_ranges(pos.x, radius, self.width, self.cols);
        let ys = self.axis_ranges(pos.y, radius, self.height, self.rows);
        let mut ids = Vec::new();
        for &(y0, y1) in &ys {
            for cy in y0..=y1 {
                for &(x0, x1) in &xs {
                    for cx in x0..=x1 {
                        ids.extend_from_slice(&self.buckets[(cy * self.cols + cx) as usize]);
                    }
                }
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

impl Space for ContinuousSpace {
    type Pos = Point;

    fn normalize(&self, pos: Point) -> Result<Point> {
        if !pos.is_finite() {
            return Err(Error::OutOfBounds {
                position: pos.to_string(),
                bounds: format!("[0, {}) x [0, {})", self.width, self.height),
            });
        }
        if pos.in_bounds(self.width, self.height) {
            Ok(pos)
        } else if self.periodic {
            Ok(pos.wrap(self.width, self.height))
        } else {
            Err(Error::OutOfBounds {
                position: pos.to_string(),
                bounds: format!("[0, {}) x [0, {})", self.width, self.height),
            })
        }
    }

    fn translate(&self, pos: Point, delta: Point) -> Result<Point> {
        self.normalize(pos.add(delta.x, delta.y))
    }

    fn insert(&mut self, id: AgentId, pos: Point) -> Result<Point> {
        let pos = self.normalize(pos)?;
        if let Some(previous) = self.positions.get(&id).copied() {
            self.remove(id, previous);
        }
        let bucket = self.bucket_of(pos);
        let ids = &mut self.buckets[bucket];
        if let Err(slot) = ids.binary_search(&id) {
            ids.insert(slot, id);
        }
        self.positions.insert(id, pos);
        Ok(pos)
    }

    fn remove(&mut self, id: AgentId, _pos: Point) {
        if let Some(stored) = self.positions.remove(&id) {
            let bucket = self.bucket_of(stored);
            let ids = &mut self.buckets[bucket];
            if let Ok(slot) = ids.binary_search(&id) {
                ids.remove(slot);
            }
        }
    }

    fn nearby_ids(
        &self,
        pos: Point,
        radius: f64,
        metric: Metric,
    ) -> impl Iterator<Item = AgentId> + '_ {
        let (center, candidates) = match self.normalize(pos) {
            Ok(center) => (center, self.candidates(center, radius)),
            Err(_) => (pos, Vec::new()),
        };
        candidates.into_iter().filter(move |id| {
            self.positions.get(id).is_some_and(|&p| {
                let (dx, dy) = self.displacement(center, p);
                metric.within(dx, dy, radius)
            })
        })
    }

    fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        Point::new(rng.gen_range(0.0..self.width), rng.gen_range(0.0..self.height))
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn periodic(&self) -> bool {
        self.periodic
    }

    fn occupancy(&self) -> usize {
        self.positions.len()
    }
}
