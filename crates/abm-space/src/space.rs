//! The `Space` trait shared by grid and continuous spaces.

use abm_core::{AgentId, Metric, Result};
use rand::Rng;
use std::fmt::Debug;

/// A coordinate domain that tracks which agent occupies which position.
///
/// A space only owns the occupancy index. Agent records live in the engine's
/// store, which keeps both sides consistent by routing every placement
/// through these methods.
pub trait Space {
    type Pos: Copy + PartialEq + Debug;

    /// Bring `pos` inside the domain: unchanged if in bounds, wrapped if the
    /// space is periodic, otherwise `OutOfBounds`.
    fn normalize(&self, pos: Self::Pos) -> Result<Self::Pos>;

    /// Position reached from `pos` by adding `delta`, under the bounds policy.
    fn translate(&self, pos: Self::Pos, delta: Self::Pos) -> Result<Self::Pos>;

    /// Record `id` at `pos` and return the stored (normalized) position.
    fn insert(&mut self, id: AgentId, pos: Self::Pos) -> Result<Self::Pos>;

    /// Forget `id` at `pos`. Unknown pairs are ignored.
    fn remove(&mut self, id: AgentId, pos: Self::Pos);

    /// Move `id` from `from` to `to`. On error the occupancy is unchanged.
    fn relocate(&mut self, id: AgentId, from: Self::Pos, to: Self::Pos) -> Result<Self::Pos> {
        let to = self.normalize(to)?;
        if from == to {
            return Ok(to);
        }
        self.remove(id, from);
        match self.insert(id, to) {
            Ok(stored) => Ok(stored),
            Err(err) => {
                // `from` was a valid slot for this agent a moment ago.
                let _ = self.insert(id, from);
                Err(err)
            }
        }
    }

    /// Ids of agents within `radius` of `pos` under `metric`, including
    /// agents located exactly at `pos`.
    fn nearby_ids(
        &self,
        pos: Self::Pos,
        radius: f64,
        metric: Metric,
    ) -> impl Iterator<Item = AgentId> + '_;

    /// Uniformly random in-bounds position.
    fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Pos;

    /// Default metric for neighbor queries.
    fn metric(&self) -> Metric;

    fn periodic(&self) -> bool;

    /// Number of agents currently placed.
    fn occupancy(&self) -> usize;
}
