//! TOML settings for every pipeline stage.
//!
//! ```toml
//! max_jobs = 4
//!
//! [partitioner]
//! strategy = "community"
//! seed = 7
//!
//! [worker]
//! layout_iterations = 100
//! time_budget_ms = 60000
//!
//! [merge]
//! cell_size = 250.0
//! ```
//!
//! Missing tables and keys keep their defaults.

use anyhow::{Context, Result};
use pam_algo::{MergeConfig, PartitionerConfig, WorkerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub partitioner: PartitionerConfig,
    pub worker: WorkerConfig,
    pub merge: MergeConfig,
    /// Partitions analyzed concurrently; 0 uses every core.
    pub max_jobs: usize,
}

impl PipelineConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        let config: PipelineConfig = toml::from_str(&contents)
            .with_context(|| format!("parsing config '{}'", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).with_context(|| format!("writing config '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pam_algo::PartitionStrategy;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pam.toml");
        fs::write(
            &path,
            r#"
max_jobs = 3

[partitioner]
strategy = "community"

[worker]
layout_iterations = 10

[worker.louvain]
resolution = 0.5
"#,
        )
        .unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_jobs, 3);
        assert_eq!(config.partitioner.strategy, PartitionStrategy::Community);
        assert_eq!(config.partitioner.seed, 42);
        assert_eq!(config.worker.layout_iterations, 10);
        assert_eq!(config.worker.louvain.resolution, 0.5);
        assert_eq!(config.merge, MergeConfig::default());
    }

    #[test]
    fn no_file_means_defaults() {
        assert_eq!(PipelineConfig::load(None).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pam.toml");
        let mut config = PipelineConfig::default();
        config.worker.time_budget_ms = Some(500);
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn bad_toml_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "max_jobs = \"many\"").unwrap();
        let err = PipelineConfig::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }
}
