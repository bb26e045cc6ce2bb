use std::path::PathBuf;

use config as cfg;
use serde::{Deserialize, Serialize};

use crate::error::{FeedRecError, Result};

/// Per-node-type default tunables, overridable by a graph definition's own
/// node config block. Mirrors the scattered module-level defaults the
/// original recall/rank nodes hardcoded (e.g. recall size, rank pool size).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefaults {
    #[serde(default = "NodeDefaults::default_recall_size")]
    pub recall_size: usize,
    #[serde(default = "NodeDefaults::default_rank_pool_size")]
    pub rank_pool_size: usize,
    #[serde(default = "NodeDefaults::default_final_count")]
    pub final_count: usize,
}

impl NodeDefaults {
    fn default_recall_size() -> usize {
        100
    }
    fn default_rank_pool_size() -> usize {
        200
    }
    fn default_final_count() -> usize {
        10
    }
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            recall_size: Self::default_recall_size(),
            rank_pool_size: Self::default_rank_pool_size(),
            final_count: Self::default_final_count(),
        }
    }
}

/// Top-level engine configuration: where DAG definitions live and the
/// shared defaults nodes fall back to when a graph definition leaves a
/// field unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_dag_dir")]
    pub dag_dir: PathBuf,

    #[serde(default)]
    pub node_defaults: NodeDefaults,

    /// Hard ceiling for the page size accepted by the public entry point.
    #[serde(default = "EngineConfig::default_max_count")]
    pub max_count: usize,
}

impl EngineConfig {
    fn default_dag_dir() -> PathBuf {
        PathBuf::from("config/dags")
    }

    fn default_max_count() -> usize {
        10
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let builder = cfg::Config::builder()
            .add_source(cfg::File::from(path.as_ref()).required(false))
            .add_source(cfg::Environment::with_prefix("FEEDREC").separator("__"));

        let raw = builder
            .build()
            .map_err(|e| FeedRecError::Configuration(e.to_string()))?;

        raw.try_deserialize()
            .map_err(|e| FeedRecError::Configuration(e.to_string()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dag_dir: Self::default_dag_dir(),
            node_defaults: NodeDefaults::default(),
            max_count: Self::default_max_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_count, 10);
        assert_eq!(cfg.node_defaults.recall_size, 100);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let cfg = EngineConfig::load("does/not/exist.toml").expect("env-only config still builds");
        assert_eq!(cfg.dag_dir, EngineConfig::default_dag_dir());
    }
}
