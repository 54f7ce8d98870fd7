//! balance.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BalanceConfig {
    #[serde(default)]
    pub plugin: PluginConfig,
    #[serde(default)]
    pub framework: FrameworkConfig,
}

/// Which node figure is treated as the node's capacity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CapacitySource {
    /// Raw hardware capacity.
    Capacity,
    /// Capacity minus system reservations. Falls back to `capacity` when a
    /// node publishes no allocatable figures.
    #[default]
    Allocatable,
}

/// Dispersion statistic used for the balance score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviationKind {
    #[default]
    StdDev,
    MeanAbsolute,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PluginConfig {
    pub capacity_source: CapacitySource,
    pub deviation: DeviationKind,
    pub max_node_score: i64,
    /// Per-operation bound on node reads.
    pub lookup_timeout_ms: u64,
    /// Resources whose quantities are tracked in milli-units.
    pub milli_resources: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            capacity_source: CapacitySource::default(),
            deviation: DeviationKind::default(),
            max_node_score: 100,
            lookup_timeout_ms: 2000,
            milli_resources: vec!["cpu".to_string()],
        }
    }
}

impl PluginConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Maximum node evaluations in flight per cycle.
    pub parallelism: usize,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self { parallelism: 16 }
    }
}

impl BalanceConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BalanceConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.plugin.max_node_score <= 0 {
            anyhow::bail!("plugin.max_node_score must be positive");
        }
        if self.framework.parallelism == 0 {
            anyhow::bail!("framework.parallelism must be at least 1");
        }
        Ok(())
    }
}
