//! Per-partition analysis.
//!
//! A [`PartitionWorker`] turns one partition into a [`PartitionResult`]:
//! communities, betweenness, a local layout, boundary-node candidates and
//! summary metrics. Each call builds its own bounded rayon pool and drops it
//! before returning, so nothing outlives the call.
//!
//! The three algorithm stages are guarded independently. If one of them
//! fails, panics, produces non-finite numbers or runs past the optional time
//! budget, the worker substitutes a neutral default (singleton communities,
//! zero centrality, degree-based layout), logs a warning and lists the stage
//! in `metrics.degraded_stages`. One bad partition never aborts a batch.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use pam_core::{
    KeyedGraph, NodeKey, PamError, PamResult, PartitionMetrics, PartitionResult, ResourceProfile,
};
use pam_io::{load_partition, save_result, ArtifactStore};
use pam_viz::{degree_layout, spring_layout, LayoutParams};
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::centrality::{betweenness, SourceSelection};
use crate::community::Louvain;
use crate::deadline::{Deadline, StageError};

/// Worker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seed shared by community detection, source sampling and layout.
    pub seed: u64,
    /// Partitions with more nodes than this get sampled betweenness.
    pub approx_threshold: usize,
    pub sample_size: usize,
    pub layout_iterations: usize,
    /// Nodes whose degree is below `boundary_ratio * node_count` are
    /// reported as boundary candidates.
    pub boundary_ratio: f64,
    /// Wall-clock budget for the whole analysis; unlimited when unset.
    pub time_budget_ms: Option<u64>,
    pub louvain: Louvain,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            approx_threshold: 10_000,
            sample_size: 1_000,
            layout_iterations: 50,
            boundary_ratio: 0.01,
            time_budget_ms: None,
            louvain: Louvain::default(),
        }
    }
}

impl WorkerConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}

/// Analysis stages that can degrade independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Communities,
    Centrality,
    Layout,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Communities => "communities",
            Stage::Centrality => "centrality",
            Stage::Layout => "layout",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analyzes one partition.
#[derive(Debug, Clone)]
pub struct PartitionWorker {
    partition_id: usize,
    profile: ResourceProfile,
    config: WorkerConfig,
}

impl PartitionWorker {
    pub fn new(partition_id: usize, profile: ResourceProfile) -> Self {
        Self::with_config(partition_id, profile, WorkerConfig::default())
    }

    pub fn with_config(partition_id: usize, profile: ResourceProfile, config: WorkerConfig) -> Self {
        Self {
            partition_id,
            profile,
            config,
        }
    }

    pub fn partition_id(&self) -> usize {
        self.partition_id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Analyze `partition` in isolation.
    ///
    /// Only pool construction can fail; every algorithm stage degrades
    /// instead of erroring.
    pub fn analyze<K: NodeKey>(&self, partition: &KeyedGraph<K>) -> PamResult<PartitionResult<K>> {
        let started = Instant::now();
        let deadline = Deadline::from_budget(self.config.time_budget());
        let threads = self.profile.worker_threads(partition.node_count());
        info!(
            partition_id = self.partition_id,
            nodes = partition.node_count(),
            edges = partition.edge_count(),
            threads,
            "analyzing partition"
        );

        let partition_id = self.partition_id;
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("pam-worker-{partition_id}-{i}"))
            .build()
            .map_err(|err| {
                PamError::Analysis(format!(
                    "partition {partition_id}: failed to build worker pool: {err}"
                ))
            })?;

        let mut result = pool.install(|| self.run_stages(partition, &deadline));
        drop(pool);

        result.metrics.analysis_ms = started.elapsed().as_millis() as u64;
        info!(
            partition_id = self.partition_id,
            communities = result.metrics.community_count,
            boundary_nodes = result.metrics.boundary_node_count,
            degraded = result.metrics.degraded_stages.len(),
            elapsed_ms = result.metrics.analysis_ms,
            "partition analyzed"
        );
        Ok(result)
    }

    /// Load this worker's partition from `partitions`, analyze it and store
    /// the result in `results`.
    pub fn run<K, P, R>(&self, partitions: &P, results: &R) -> PamResult<PartitionResult<K>>
    where
        K: NodeKey,
        P: ArtifactStore + ?Sized,
        R: ArtifactStore + ?Sized,
    {
        let partition: KeyedGraph<K> = load_partition(partitions, self.partition_id)?;
        let result = self.analyze(&partition)?;
        let locator = save_result(results, &result)?;
        debug!(partition_id = self.partition_id, artifact = %locator, "stored result");
        Ok(result)
    }

    fn run_stages<K: NodeKey>(&self, partition: &KeyedGraph<K>, deadline: &Deadline) -> PartitionResult<K> {
        let n = partition.node_count();
        let keys: Vec<&K> = partition.keys().collect();
        let mut degraded: Vec<String> = Vec::new();

        let groups = self.guarded(
            Stage::Communities,
            &mut degraded,
            || {
                let undirected = partition.undirected();
                self.config.louvain.run(&undirected, self.config.seed, deadline)
            },
            || (0..n).map(|node| vec![node]).collect(),
        );
        let mut communities = BTreeMap::new();
        for (community, members) in groups.iter().enumerate() {
            for &node in members {
                communities.insert(keys[node].clone(), community);
            }
        }

        let (scores, approximate) = self.guarded(
            Stage::Centrality,
            &mut degraded,
            || {
                let selection = if n > self.config.approx_threshold {
                    SourceSelection::Sample {
                        size: self.config.sample_size,
                        seed: self.config.seed,
                    }
                } else {
                    SourceSelection::All
                };
                let out_adj = partition.out_adjacency();
                betweenness(&out_adj, selection, deadline).map(|b| (b.scores, b.approximate))
            },
            || (vec![0.0; n], false),
        );
        let centrality: BTreeMap<K, f64> = keys
            .iter()
            .zip(&scores)
            .map(|(key, &score)| ((*key).clone(), score))
            .collect();

        let layout = self.guarded(
            Stage::Layout,
            &mut degraded,
            || {
                let params = LayoutParams {
                    iterations: self.config.layout_iterations,
                    seed: self.config.seed,
                    ..LayoutParams::default()
                };
                deadline.check()?;
                spring_layout(partition, &params, || deadline.expired()).map_err(|err| match err {
                    pam_viz::LayoutError::Interrupted { .. } => StageError::BudgetExhausted,
                    pam_viz::LayoutError::NonFinite => StageError::NonFinite("layout"),
                })
            },
            || degree_layout(partition),
        );

        let boundary_nodes = self.boundary_nodes(partition);
        let metrics = PartitionMetrics {
            node_count: n,
            edge_count: partition.edge_count(),
            community_count: groups.len(),
            boundary_node_count: boundary_nodes.len(),
            density: partition.density(),
            approximate_centrality: approximate,
            analysis_ms: 0,
            degraded_stages: degraded,
        };

        PartitionResult {
            partition_id: self.partition_id,
            communities,
            centrality,
            layout,
            boundary_nodes,
            metrics,
        }
    }

    /// Low-degree heuristic: without the pre-partition graph the worker
    /// cannot see cut edges, so nodes with local degree below
    /// `boundary_ratio * node_count` are reported as likely boundary nodes.
    fn boundary_nodes<K: NodeKey>(&self, partition: &KeyedGraph<K>) -> Vec<K> {
        let threshold = partition.node_count() as f64 * self.config.boundary_ratio;
        partition
            .keys()
            .zip(partition.degrees())
            .filter(|(_, degree)| (*degree as f64) < threshold)
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn guarded<T>(
        &self,
        stage: Stage,
        degraded: &mut Vec<String>,
        run: impl FnOnce() -> Result<T, StageError>,
        neutral: impl FnOnce() -> T,
    ) -> T {
        let outcome = panic::catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(StageError::Panicked(message))
        });
        match outcome {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    partition_id = self.partition_id,
                    stage = %stage,
                    error = %err,
                    "analysis stage degraded to neutral default"
                );
                degraded.push(stage.to_string());
                neutral()
            }
        }
    }
}
