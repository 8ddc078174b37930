//! Spaces for the simulation kernel.
//!
//! A space maps agent ids to positions and answers proximity queries. Two
//! topologies are provided: a discrete [`GridSpace`] and a continuous
//! [`ContinuousSpace`]. [`CellField`] stores per-cell scalar quantities
//! that share a grid's dimensions and edge policy.

pub mod space;
pub mod grid;
pub mod continuous;
pub mod field;

pub use space::Space;
pub use grid::GridSpace;
pub use continuous::ContinuousSpace;
pub use field::CellField;
