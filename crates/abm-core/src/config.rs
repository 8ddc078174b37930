//! Configuration types for models and spaces.

use crate::{Error, Metric, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How many agents a grid cell may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellCapacity {
    /// Any number of agents per cell
    #[default]
    Many,
    /// At most one agent per cell
    Single,
}

/// Discrete grid parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of columns
    pub width: i32,
    /// Number of rows
    pub height: i32,
    /// Wrap at the edges (torus) instead of rejecting out-of-range cells
    pub periodic: bool,
    /// Default metric for neighbor queries
    pub metric: Metric,
    /// Agents allowed per cell
    pub capacity: CellCapacity,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            periodic: true,
            metric: Metric::Chebyshev,
            capacity: CellCapacity::Many,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::InvalidConfig(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Continuous plane parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousConfig {
    /// Extent along x
    pub width: f64,
    /// Extent along y
    pub height: f64,
    /// Wrap at the edges (torus) instead of rejecting out-of-range points
    pub periodic: bool,
    /// Default metric for neighbor queries
    pub metric: Metric,
    /// Side length of a spatial index bucket. Queries are cheapest when this
    /// is close to the typical query radius.
    pub cell_size: f64,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
            periodic: true,
            metric: Metric::Euclidean,
            cell_size: 1.0,
        }
    }
}

impl ContinuousConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "continuous extent must be positive and finite, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        Ok(())
    }
}

/// Which kind of space a model runs in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpaceConfig {
    Grid(GridConfig),
    Continuous(ContinuousConfig),
}

impl Default for SpaceConfig {
    fn default() -> Self {
        SpaceConfig::Grid(GridConfig::default())
    }
}

impl SpaceConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            SpaceConfig::Grid(grid) => grid.validate(),
            SpaceConfig::Continuous(continuous) => continuous.validate(),
        }
    }
}

/// Activation order that can be chosen from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerConfig {
    /// Ascending agent id
    Sequential,
    /// Fresh random permutation each step
    #[default]
    Randomized,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Space descriptor
    pub space: SpaceConfig,
    /// Agent activation order
    pub scheduler: SchedulerConfig,
    /// Collect data every N steps
    pub collect_every: u64,
    /// Emit a progress log line every N steps (0 disables)
    pub log_every: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            space: SpaceConfig::default(),
            scheduler: SchedulerConfig::default(),
            collect_every: 1,
            log_every: 1000,
        }
    }
}

impl ModelConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ModelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.collect_every == 0 {
            return Err(Error::InvalidConfig("collect_every must be at least 1".to_string()));
        }
        self.space.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = ModelConfig::default();
        assert_eq!(config.collect_every, 1);
        assert_eq!(config.scheduler, SchedulerConfig::Randomized);
        assert!(config.validate().is_ok());

        let grid = GridConfig::default();
        assert_eq!(grid.width, 50);
        assert!(grid.periodic);
    }

    #[test]
    fn test_model_config_from_json() {
        let json = r#"{
            "seed": 42,
            "scheduler": "sequential",
            "space": { "kind": "grid", "width": 3, "height": 4, "periodic": false, "capacity": "single" }
        }"#;
        let config = ModelConfig::from_json_str(json).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.scheduler, SchedulerConfig::Sequential);
        match config.space {
            SpaceConfig::Grid(grid) => {
                assert_eq!((grid.width, grid.height), (3, 4));
                assert!(!grid.periodic);
                assert_eq!(grid.capacity, CellCapacity::Single);
                assert_eq!(grid.metric, Metric::Chebyshev);
            }
            other => panic!("expected grid, got {other:?}"),
        }
    }

    #[test]
    fn test_continuous_config_from_json() {
        let json = r#"{ "space": { "kind": "continuous", "width": 10.0, "height": 5.0, "metric": "manhattan" } }"#;
        let config = ModelConfig::from_json_str(json).unwrap();
        match config.space {
            SpaceConfig::Continuous(c) => {
                assert_eq!(c.metric, Metric::Manhattan);
                assert_eq!(c.cell_size, 1.0);
            }
            other => panic!("expected continuous, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let bad_grid = r#"{ "space": { "kind": "grid", "width": 0, "height": 4 } }"#;
        assert!(matches!(
            ModelConfig::from_json_str(bad_grid),
            Err(Error::InvalidConfig(_))
        ));

        let bad_collect = r#"{ "collect_every": 0 }"#;
        assert!(ModelConfig::from_json_str(bad_collect).is_err());

        assert!(matches!(
            ModelConfig::from_json_str("{ not json"),
            Err(Error::Serialization(_))
        ));
    }
}
