//! Agent records.

use abm_core::AgentId;
use serde::{Deserialize, Serialize};

/// An agent in the simulation.
///
/// `fields` is the model's fixed agent schema: a struct, or an enum when a
/// model mixes several kinds of agent. The position is only changed through
/// the model so the space index and the record never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent<P, F> {
    id: AgentId,
    pub(crate) pos: P,
    born: u64,
    pub fields: F,
}

impl<P: Copy, F> Agent<P, F> {
    pub(crate) fn new(id: AgentId, pos: P, fields: F, born: u64) -> Self {
        Self {
            id,
            pos,
            born,
            fields,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn pos(&self) -> P {
        self.pos
    }

    /// Step count of the model when this agent was added
    pub fn born(&self) -> u64 {
        self.born
    }

    /// Steps survived so far at model step `now`
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.born)
    }
}
