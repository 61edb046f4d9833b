//! World configuration

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::scheduler::Schedule;

fn default_absolute_max() -> usize {
    512
}

fn default_initial_min_size() -> usize {
    8
}

fn default_initial_max_size() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level configuration consumed by [`crate::World::with_config`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub pool: PoolConfig,
    /// Scheduling overrides keyed by system name
    #[serde(default)]
    pub systems: HashMap<String, Schedule>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Hard ceiling for any single pool's capacity
    #[serde(default = "default_absolute_max")]
    pub absolute_max: usize,
    /// Seconds between pool trims; zero or less disables trimming
    #[serde(default)]
    pub removal_period_secs: f32,
    #[serde(default = "default_initial_min_size")]
    pub initial_min_size: usize,
    #[serde(default = "default_initial_max_size")]
    pub initial_max_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            absolute_max: default_absolute_max(),
            removal_period_secs: 0.0,
            initial_min_size: default_initial_min_size(),
            initial_max_size: default_initial_max_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl WorldConfig {
    pub fn from_yaml_str(data: &str) -> Result<Self> {
        let config: WorldConfig = serde_yaml::from_str(data).context("Failed to parse world config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read world config {}", path.display()))?;
        Self::from_yaml_str(&data).with_context(|| format!("Invalid world config {}", path.display()))
    }

    /// Save configuration to YAML file
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write world config {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let pool = &self.pool;
        if pool.absolute_max == 0 {
            bail!("pool.absolute_max must be positive");
        }
        if pool.initial_min_size == 0 {
            bail!("pool.initial_min_size must be positive");
        }
        if pool.initial_min_size > pool.initial_max_size {
            bail!(
                "pool.initial_min_size ({}) exceeds pool.initial_max_size ({})",
                pool.initial_min_size,
                pool.initial_max_size
            );
        }
        for (name, schedule) in &self.systems {
            if schedule.periodic && !schedule.period.is_finite() {
                bail!("system '{name}' has a non-finite period");
            }
        }
        Ok(())
    }
}
