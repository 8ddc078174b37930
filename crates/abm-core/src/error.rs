//! Error types for the simulation kernel.

use crate::AgentId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for agent and model update callbacks.
pub type CallbackResult = std::result::Result<(), BoxError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("position {position} is outside the space bounds {bounds}")]
    OutOfBounds { position: String, bounds: String },

    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error("{0} is already occupied")]
    Occupied(String),

    #[error("callback failed at step {step}{}: {source}", agent_suffix(.agent))]
    Callback {
        step: u64,
        agent: Option<AgentId>,
        #[source]
        source: BoxError,
    },

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("scheduling failed at step {step}: {source}")]
    Schedule {
        step: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid propensity: {0}")]
    InvalidPropensity(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn agent_suffix(agent: &Option<AgentId>) -> String {
    match agent {
        Some(id) => format!(" (agent {id})"),
        None => " (model step)".to_string(),
    }
}

impl Error {
    /// Step at which a callback or the scheduler failed.
    pub fn step(&self) -> Option<u64> {
        match self {
            Error::Callback { step, .. } | Error::Schedule { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Agent whose callback failed, if any.
    pub fn agent(&self) -> Option<AgentId> {
        match self {
            Error::Callback { agent, .. } => *agent,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
