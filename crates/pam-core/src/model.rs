//! Records exchanged between pipeline stages.
//!
//! [`PartitionInfo`] is produced when a partition is stored,
//! [`PartitionResult`] once per analyzed partition, and [`MergedResult`] once
//! per merge. The first two cross process boundaries as artifacts, so their
//! node-keyed maps are written as key/value pairs (see [`crate::serde_pairs`]).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::NodeKey;

/// A 2-D layout coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Structural metadata written when a partition artifact is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub partition_id: usize,
    pub node_count: usize,
    pub edge_count: usize,
    /// Always `None` here: boundary nodes are only estimated during analysis.
    pub boundary_node_count: Option<usize>,
    pub artifact_path: String,
}

/// Per-partition summary numbers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartitionMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub community_count: usize,
    pub boundary_node_count: usize,
    pub density: f64,
    /// True when betweenness was estimated from a source sample.
    #[serde(default)]
    pub approximate_centrality: bool,
    #[serde(default)]
    pub analysis_ms: u64,
    /// Stages that fell back to neutral defaults (`communities`,
    /// `centrality`, `layout`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_stages: Vec<String>,
}

/// Output of analyzing one partition in isolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "K: NodeKey")]
pub struct PartitionResult<K: NodeKey> {
    pub partition_id: usize,
    /// Node → 0-indexed local community id.
    #[serde(with = "crate::serde_pairs")]
    pub communities: BTreeMap<K, usize>,
    /// Node → betweenness score local to the partition.
    #[serde(with = "crate::serde_pairs")]
    pub centrality: BTreeMap<K, f64>,
    /// Node → unnormalized local layout coordinate.
    #[serde(with = "crate::serde_pairs")]
    pub layout: BTreeMap<K, Position>,
    /// Nodes flagged by the low-degree boundary heuristic.
    pub boundary_nodes: Vec<K>,
    pub metrics: PartitionMetrics,
}

impl<K: NodeKey> PartitionResult<K> {
    /// Number of distinct local community ids.
    pub fn community_count(&self) -> usize {
        let mut ids: Vec<usize> = self.communities.values().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

/// Globally consistent annotation built from every partition result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "K: NodeKey")]
pub struct MergedResult<K: NodeKey> {
    #[serde(with = "crate::serde_pairs")]
    pub global_communities: BTreeMap<K, usize>,
    /// Scores rescaled into `[0, 1]`.
    #[serde(with = "crate::serde_pairs")]
    pub global_centrality: BTreeMap<K, f64>,
    /// Coordinates in the shared grid space.
    #[serde(with = "crate::serde_pairs")]
    pub global_layout: BTreeMap<K, Position>,
    pub partition_count: usize,
    pub total_nodes: usize,
    pub merge_duration: Duration,
}

impl<K: NodeKey> MergedResult<K> {
    /// Number of distinct global community ids.
    pub fn community_count(&self) -> usize {
        let mut ids: Vec<usize> = self.global_communities.values().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    #[test]
    fn result_keeps_integer_keys_through_json() {
        let mut communities = BTreeMap::new();
        communities.insert(NodeId::from(3), 0);
        communities.insert(NodeId::from("3"), 1);
        let result = PartitionResult {
            partition_id: 0,
            communities,
            centrality: BTreeMap::new(),
            layout: BTreeMap::new(),
            boundary_nodes: vec![NodeId::from(3)],
            metrics: PartitionMetrics::default(),
        };
        let text = serde_json::to_string(&result).unwrap();
        let back: PartitionResult<NodeId> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.communities.get(&NodeId::Int(3)), Some(&0));
        assert_eq!(back.communities.get(&NodeId::Text("3".into())), Some(&1));
        assert_eq!(back.community_count(), 2);
    }
}
