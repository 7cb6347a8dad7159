//! Recombining per-partition results into one global annotation.
//!
//! Results are always processed in discovery order (ascending partition
//! index). That order fixes the community offsets and the grid cell each
//! partition's layout lands in, so the same artifact set always merges to the
//! same output.

use std::collections::{BTreeMap, BTreeSet};

use pam_core::{KeyedGraph, MergedResult, NodeKey, PamError, PamResult, PartitionResult, Position};
use pam_io::{load_all_results, load_results_for, ArtifactStore};
use pam_viz::grid::{GridSpec, DEFAULT_CELL_SIZE, DEFAULT_PADDING_RATIO};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use web_time::Instant;

/// Grid geometry for layout stitching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub cell_size: f64,
    /// Inward padding on each side of a cell, as a fraction of `cell_size`.
    pub padding_ratio: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            padding_ratio: DEFAULT_PADDING_RATIO,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultsMerger {
    config: MergeConfig,
}

impl ResultsMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Every stored result, ascending by partition index. Not-found when the
    /// store is missing, holds no results, or skips an index, so a partial
    /// run is never merged as if it were complete.
    pub fn load_all<K, S>(&self, store: &S) -> PamResult<Vec<PartitionResult<K>>>
    where
        K: NodeKey,
        S: ArtifactStore + ?Sized,
    {
        let results = load_all_results(store)?;
        info!(results = results.len(), "loaded partition results");
        Ok(results)
    }

    /// [`load_all`](Self::load_all) checked against the number of stored
    /// partitions, which also catches results left over from a larger run.
    pub fn load_expected<K, S>(&self, store: &S, partition_count: usize) -> PamResult<Vec<PartitionResult<K>>>
    where
        K: NodeKey,
        S: ArtifactStore + ?Sized,
    {
        let results = load_results_for(store, partition_count)?;
        info!(results = results.len(), "loaded partition results");
        Ok(results)
    }

    /// Offset local community ids into disjoint global ranges.
    ///
    /// Each result's distinct local ids are ranked densely and shifted by a
    /// running offset, which then grows by the number of distinct ids.
    pub fn merge_communities<K: NodeKey>(&self, results: &[PartitionResult<K>]) -> BTreeMap<K, usize> {
        let mut global = BTreeMap::new();
        let mut offset = 0usize;
        for result in results {
            let distinct: BTreeSet<usize> = result.communities.values().copied().collect();
            let rank: BTreeMap<usize, usize> = distinct
                .iter()
                .enumerate()
                .map(|(rank, &local)| (local, rank))
                .collect();
            for (node, local) in &result.communities {
                if global.insert(node.clone(), rank[local] + offset).is_some() {
                    warn!(partition_id = result.partition_id, node = %node, "node appears in several partitions");
                }
            }
            debug!(
                partition_id = result.partition_id,
                offset,
                communities = distinct.len(),
                "merged communities"
            );
            offset += distinct.len();
        }
        global
    }

    /// Union of all scores divided by the global maximum, when positive.
    pub fn merge_centrality<K: NodeKey>(&self, results: &[PartitionResult<K>]) -> BTreeMap<K, f64> {
        let mut global: BTreeMap<K, f64> = results
            .iter()
            .flat_map(|result| result.centrality.iter())
            .map(|(node, &score)| (node.clone(), score))
            .collect();
        let max = global
            .values()
            .copied()
            .filter(|score| score.is_finite())
            .fold(0.0f64, f64::max);
        if max > 0.0 {
            for score in global.values_mut() {
                *score /= max;
            }
        }
        global
    }

    /// Place each partition's layout in its own grid cell.
    pub fn merge_layouts<K: NodeKey>(&self, results: &[PartitionResult<K>]) -> BTreeMap<K, Position> {
        let grid = GridSpec::with_geometry(results.len(), self.config.cell_size, self.config.padding_ratio);
        let mut global = BTreeMap::new();
        for (cell, result) in results.iter().enumerate() {
            global.extend(grid.place(cell, &result.layout));
        }
        debug!(cells = results.len(), side = grid.side, "merged layouts");
        global
    }

    /// Write `community` and `betweenness` onto the original graph. Keys the
    /// graph does not contain are skipped. Returns the number of nodes
    /// touched.
    pub fn annotate<K: NodeKey>(&self, graph: &mut KeyedGraph<K>, merged: &MergedResult<K>) -> usize {
        let mut touched = BTreeSet::new();
        let mut skipped = 0usize;
        for (node, &community) in &merged.global_communities {
            match graph.node_mut(node) {
                Some(attrs) => {
                    attrs.community = Some(community);
                    touched.insert(node);
                }
                None => skipped += 1,
            }
        }
        for (node, &score) in &merged.global_centrality {
            if let Some(attrs) = graph.node_mut(node) {
                attrs.betweenness = Some(score);
                touched.insert(node);
            }
        }
        if skipped > 0 {
            warn!(skipped, "merged nodes missing from the original graph");
        }
        touched.len()
    }

    /// Merge everything, annotate `graph` in place and return the summary.
    pub fn merge_all<K: NodeKey>(
        &self,
        results: &[PartitionResult<K>],
        graph: &mut KeyedGraph<K>,
    ) -> PamResult<MergedResult<K>> {
        if results.is_empty() {
            return Err(PamError::EmptyInput(
                "no partition results to merge".to_string(),
            ));
        }
        let started = Instant::now();
        let global_communities = self.merge_communities(results);
        let global_centrality = self.merge_centrality(results);
        let global_layout = self.merge_layouts(results);

        let total_nodes = global_communities
            .keys()
            .chain(global_centrality.keys())
            .chain(global_layout.keys())
            .collect::<BTreeSet<_>>()
            .len();
        let mut merged = MergedResult {
            global_communities,
            global_centrality,
            global_layout,
            partition_count: results.len(),
            total_nodes,
            merge_duration: started.elapsed(),
        };

        let annotated = self.annotate(graph, &merged);
        merged.merge_duration = started.elapsed();
        info!(
            partitions = merged.partition_count,
            nodes = merged.total_nodes,
            communities = merged.community_count(),
            annotated,
            elapsed_ms = merged.merge_duration.as_millis() as u64,
            "merge complete"
        );
        Ok(merged)
    }
}
