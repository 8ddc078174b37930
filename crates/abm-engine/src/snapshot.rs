//! Binary model snapshots.

use crate::model::Model;
use abm_core::Result;
use abm_space::Space;
use serde::de::DeserializeOwned;
use serde::Serialize;

impl<S, F, P> Model<S, F, P>
where
    S: Space + Serialize + DeserializeOwned,
    S::Pos: Serialize + DeserializeOwned,
    F: Serialize + DeserializeOwned,
    P: Serialize + DeserializeOwned,
{
    /// Encode space, agents, properties, generator state and step counter.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Restore a model written by [`Model::to_bytes`]. The restored model
    /// continues exactly where the original left off.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
