//! Core types and utilities for the agent-based simulation kernel.

pub mod types;
pub mod config;
pub mod error;
pub mod events;

pub use error::{BoxError, CallbackResult, Error, Result};
pub use types::*;
pub use config::*;
