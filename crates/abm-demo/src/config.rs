//! Demo configuration: a kernel `ModelConfig` plus the demo's own knobs.

use abm_core::ModelConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    #[serde(flatten)]
    pub model: ModelConfig,
    /// Upper bound on steps for either demo
    pub steps: u64,
    /// Fraction of grid cells that start with a tree
    pub density: f64,
    /// Number of birds in the flocking demo
    pub birds: usize,
    /// Alignment radius for the flocking demo
    pub radius: f64,
    pub speed: f64,
    /// Heading noise as a fraction of a half turn
    pub noise: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            steps: 100,
            density: 0.6,
            birds: 200,
            radius: 3.0,
            speed: 0.5,
            noise: 0.1,
        }
    }
}

impl DemoConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        if !(0.0..=1.0).contains(&self.density) {
            bail!("density must be within [0, 1], got {}", self.density);
        }
        if !(0.0..=1.0).contains(&self.noise) {
            bail!("noise must be within [0, 1], got {}", self.noise);
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            bail!("radius must be finite and non-negative, got {}", self.radius);
        }
        if !(self.speed.is_finite() && self.speed >= 0.0) {
            bail!("speed must be finite and non-negative, got {}", self.speed);
        }
        Ok(())
    }
}
