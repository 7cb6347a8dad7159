//! Resource-aware graph partitioning.
//!
//! [`Partitioner`] splits a graph into `k` node-disjoint induced subgraphs
//! small enough to analyze on one machine. It tries a min-edge-cut
//! partitioner first (by default [`SpectralBisection`]) and falls back to
//! community detection whenever that attempt fails. The fallback always
//! succeeds, so `partition` never returns an error.
//!
//! # Strategies
//!
//! | Strategy | Primary attempt | Fallback |
//! |----------|-----------------|----------|
//! | [`PartitionStrategy::Auto`] | spectral bisection + boundary refinement | community detection |
//! | [`PartitionStrategy::Spectral`] | spectral bisection only | community detection |
//! | [`PartitionStrategy::Community`] | none | community detection |
//!
//! Edges between partitions are dropped by induced-subgraph extraction.
//! Node and edge attributes are kept.
//!
//! # Example
//!
//! ```ignore
//! use pam_algo::graph::Partitioner;
//! use pam_core::ResourceProfile;
//!
//! let partitioner = Partitioner::new(ResourceProfile::detect());
//! let k = partitioner.calculate_partition_count(graph.node_count());
//! for (id, part) in partitioner.partition(&graph, k).iter().enumerate() {
//!     partitioner.save(part, id, &store)?;
//! }
//! ```

use std::panic::{self, AssertUnwindSafe};

use pam_core::{KeyedGraph, NodeKey, PamResult, PartitionInfo, ResourceProfile, UndirectedAdjacency};
use pam_io::ArtifactStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::community::{CommunityDetector, Louvain};

/// Error type for min-cut partitioning attempts.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// Requested more parts than there are nodes
    #[error("Graph has only {0} nodes, cannot split into {1} partitions")]
    GraphTooSmall(usize, usize),

    /// Invalid partition count
    #[error("Invalid partition count: {0}")]
    InvalidPartitionCount(usize),

    /// Membership vector does not cover the graph
    #[error("Membership has {actual} entries, expected {expected}")]
    MembershipMismatch { expected: usize, actual: usize },

    /// Membership names a part outside `0..k`
    #[error("Node {node} assigned to part {part}, expected < {k}")]
    PartOutOfRange { node: usize, part: usize, k: usize },

    /// Spectral decomposition failed
    #[error("Spectral partitioning failed: {0}")]
    SpectralFailed(String),

    /// External partitioner panicked or reported an error
    #[error("Min-cut partitioner failed: {0}")]
    External(String),
}

/// Seam for min-edge-cut partitioners.
///
/// Receives a 0-indexed undirected adjacency list without self-loops and
/// returns `(edge_cut, membership)` where `membership[i] < k` is the part of
/// node `i`.
pub trait MinCutPartitioner: Send + Sync {
    fn partition(
        &self,
        adjacency: &[Vec<usize>],
        k: usize,
    ) -> Result<(usize, Vec<usize>), PartitionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStrategy {
    #[default]
    Auto,
    Spectral,
    Community,
}

impl std::str::FromStr for PartitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "spectral" => Ok(Self::Spectral),
            "community" => Ok(Self::Community),
            other => Err(format!(
                "unknown partition strategy '{other}' (expected auto, spectral or community)"
            )),
        }
    }
}

/// Partitioner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionerConfig {
    pub strategy: PartitionStrategy,
    /// Seed for the community-detection fallback.
    pub seed: u64,
    /// Boundary refinement sweeps after spectral bisection (`auto` only).
    pub refinement_passes: usize,
    /// Power-iteration cap per bisection.
    pub max_iterations: usize,
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            strategy: PartitionStrategy::Auto,
            seed: 42,
            refinement_passes: 4,
            max_iterations: 300,
        }
    }
}

/// Splits graphs into bounded-size, node-disjoint partitions.
pub struct Partitioner {
    profile: ResourceProfile,
    config: PartitionerConfig,
    min_cut: Option<Box<dyn MinCutPartitioner>>,
    detector: Box<dyn CommunityDetector>,
}

impl Partitioner {
    pub fn new(profile: ResourceProfile) -> Self {
        Self::with_config(profile, PartitionerConfig::default())
    }

    pub fn with_config(profile: ResourceProfile, config: PartitionerConfig) -> Self {
        let min_cut: Option<Box<dyn MinCutPartitioner>> = match config.strategy {
            PartitionStrategy::Auto => Some(Box::new(SpectralBisection {
                max_iterations: config.max_iterations,
                refinement_passes: config.refinement_passes,
                ..SpectralBisection::default()
            })),
            PartitionStrategy::Spectral => Some(Box::new(SpectralBisection {
                max_iterations: config.max_iterations,
                refinement_passes: 0,
                ..SpectralBisection::default()
            })),
            PartitionStrategy::Community => None,
        };
        Self {
            profile,
            config,
            min_cut,
            detector: Box::new(Louvain::default()),
        }
    }

    /// Replace the min-cut partitioner.
    pub fn with_min_cut(mut self, min_cut: Box<dyn MinCutPartitioner>) -> Self {
        self.min_cut = Some(min_cut);
        self
    }

    /// Use only the community-detection path.
    pub fn without_min_cut(mut self) -> Self {
        self.min_cut = None;
        self
    }

    pub fn with_detector(mut self, detector: Box<dyn CommunityDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn profile(&self) -> &ResourceProfile {
        &self.profile
    }

    pub fn config(&self) -> &PartitionerConfig {
        &self.config
    }

    /// Number of partitions that keeps each one near the profile's target
    /// size: `ceil(total_nodes / target)`, 0 for an empty graph.
    pub fn calculate_partition_count(&self, total_nodes: usize) -> usize {
        let target = self.profile.target_partition_size();
        let count = total_nodes.div_ceil(target);
        debug!(total_nodes, target, count, "calculated partition count");
        count
    }

    /// Split `graph` into at most `k` node-disjoint induced subgraphs.
    ///
    /// `k <= 1` returns the graph unchanged. Every node lands in exactly one
    /// partition; fewer than `k` partitions come back only when the graph
    /// has fewer than `k` nodes.
    pub fn partition<K: NodeKey>(&self, graph: &KeyedGraph<K>, k: usize) -> Vec<KeyedGraph<K>> {
        if k <= 1 {
            return vec![graph.clone()];
        }
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            k,
            "partitioning graph"
        );

        let undirected = graph.undirected();
        let groups = match self.min_cut.as_deref() {
            Some(min_cut) => self
                .min_cut_groups(min_cut, &undirected, k)
                .unwrap_or_else(|err| {
                    warn!(error = %err, "min-cut partitioning failed; using community fallback");
                    self.community_groups(&undirected, k)
                }),
            None => self.community_groups(&undirected, k),
        };

        let partitions: Vec<KeyedGraph<K>> = groups
            .iter()
            .map(|group| graph.induced_by_positions(group))
            .collect();
        for (id, part) in partitions.iter().enumerate() {
            debug!(
                partition_id = id,
                nodes = part.node_count(),
                edges = part.edge_count(),
                "built partition"
            );
        }
        info!(partitions = partitions.len(), "partitioning complete");
        partitions
    }

    /// Primary attempt: ask the min-cut partitioner and validate its answer.
    fn min_cut_groups(
        &self,
        min_cut: &dyn MinCutPartitioner,
        undirected: &UndirectedAdjacency,
        k: usize,
    ) -> Result<Vec<Vec<usize>>, PartitionError> {
        let adjacency = undirected.adjacency_list();
        let n = adjacency.len();
        let (edge_cut, membership) =
            panic::catch_unwind(AssertUnwindSafe(|| min_cut.partition(&adjacency, k)))
                .map_err(|payload| PartitionError::External(panic_message(payload.as_ref())))??;

        if membership.len() != n {
            return Err(PartitionError::MembershipMismatch {
                expected: n,
                actual: membership.len(),
            });
        }
        let mut groups = vec![Vec::new(); k];
        for (node, &part) in membership.iter().enumerate() {
            if part >= k {
                return Err(PartitionError::PartOutOfRange { node, part, k });
            }
            groups[part].push(node);
        }
        groups.retain(|group| !group.is_empty());
        debug!(edge_cut, parts = groups.len(), "min-cut partitioning succeeded");
        // empty parts are split back out of the largest ones
        Ok(reconcile(groups, k))
    }

    /// Fallback: community detection reconciled to `k` groups.
    fn community_groups(&self, undirected: &UndirectedAdjacency, k: usize) -> Vec<Vec<usize>> {
        let n = undirected.node_count();
        let detected = match self.detector.detect(undirected, self.config.seed) {
            Ok(communities) => communities,
            Err(err) => {
                warn!(error = %err, "community detection failed; starting from singletons");
                Vec::new()
            }
        };

        // Keep each node's first assignment and ignore anything out of range.
        let mut assigned = vec![false; n];
        let mut groups: Vec<Vec<usize>> = detected
            .into_iter()
            .map(|community| {
                community
                    .into_iter()
                    .filter(|&node| node < n && !std::mem::replace(&mut assigned[node], true))
                    .collect::<Vec<_>>()
            })
            .filter(|community| !community.is_empty())
            .collect();
        let missing: Vec<usize> = (0..n).filter(|&node| !assigned[node]).collect();
        if !missing.is_empty() {
            debug!(missing = missing.len(), "adding unassigned nodes as singletons");
        }
        groups.extend(missing.into_iter().map(|node| vec![node]));

        reconcile(groups, k)
    }

    /// Store one partition artifact.
    pub fn save<K, S>(&self, partition: &KeyedGraph<K>, id: usize, store: &S) -> PamResult<PartitionInfo>
    where
        K: NodeKey,
        S: ArtifactStore + ?Sized,
    {
        pam_io::save_partition(store, id, partition)
    }

    /// Load one partition artifact; not-found if it was never saved.
    pub fn load<K, S>(&self, id: usize, store: &S) -> PamResult<KeyedGraph<K>>
    where
        K: NodeKey,
        S: ArtifactStore + ?Sized,
    {
        pam_io::load_partition(store, id)
    }
}

/// Bring the group count to `k`.
///
/// Too many: the `k` largest groups become seeds (ties keep detection
/// order) and every other group is folded, largest first, into the seed
/// that currently has the fewest nodes. Too few: the largest group is
/// bisected by list order until there are `k` groups or nothing left to
/// split.
pub fn reconcile(mut groups: Vec<Vec<usize>>, k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return groups;
    }
    if groups.len() > k {
        groups.sort_by(|a, b| b.len().cmp(&a.len()));
        let rest = groups.split_off(k);
        for group in rest {
            let smallest = groups
                .iter()
                .enumerate()
                .min_by_key(|(idx, seed)| (seed.len(), *idx))
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            groups[smallest].extend(group);
        }
    }
    while groups.len() < k {
        let Some((largest, len)) = groups
            .iter()
            .enumerate()
            .map(|(idx, group)| (idx, group.len()))
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        else {
            break;
        };
        if len < 2 {
            break;
        }
        let second_half = groups[largest].split_off(len / 2);
        groups.push(second_half);
    }
    groups
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// Recursive spectral bisection with optional boundary refinement.
///
/// Each bisection computes an approximate Fiedler vector of the subset's
/// Laplacian by power iteration on `c·I - L` (with `c` above the largest
/// eigenvalue) while projecting out the constant vector, then splits the
/// nodes by their Fiedler value in proportion to the parts each side must
/// still produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralBisection {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Kernighan–Lin style sweeps moving boundary nodes to the part most of
    /// their neighbors are in.
    pub refinement_passes: usize,
    /// Allowed deviation from the average part size during refinement.
    pub max_imbalance: f64,
}

impl Default for SpectralBisection {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-8,
            refinement_passes: 4,
            max_imbalance: 0.1,
        }
    }
}

impl MinCutPartitioner for SpectralBisection {
    fn partition(
        &self,
        adjacency: &[Vec<usize>],
        k: usize,
    ) -> Result<(usize, Vec<usize>), PartitionError> {
        let n = adjacency.len();
        if k == 0 {
            return Err(PartitionError::InvalidPartitionCount(k));
        }
        if n == 0 || k > n {
            return Err(PartitionError::GraphTooSmall(n, k));
        }

        let mut membership = vec![0usize; n];
        self.bisect(adjacency, (0..n).collect(), 0, k, &mut membership)?;
        if self.refinement_passes > 0 {
            refine(adjacency, &mut membership, k, self.refinement_passes, self.max_imbalance);
        }
        Ok((edge_cut(adjacency, &membership), membership))
    }
}

impl SpectralBisection {
    fn bisect(
        &self,
        adjacency: &[Vec<usize>],
        nodes: Vec<usize>,
        base: usize,
        parts: usize,
        membership: &mut [usize],
    ) -> Result<(), PartitionError> {
        if parts <= 1 || nodes.len() < 2 {
            for &node in &nodes {
                membership[node] = base;
            }
            return Ok(());
        }

        let fiedler = self.fiedler_vector(adjacency, &nodes)?;
        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by(|&a, &b| fiedler[a].total_cmp(&fiedler[b]).then(nodes[a].cmp(&nodes[b])));

        let left_parts = parts / 2;
        let right_parts = parts - left_parts;
        let split = nodes.len() * left_parts / parts;
        let left: Vec<usize> = order[..split].iter().map(|&i| nodes[i]).collect();
        let right: Vec<usize> = order[split..].iter().map(|&i| nodes[i]).collect();

        self.bisect(adjacency, left, base, left_parts, membership)?;
        self.bisect(adjacency, right, base + left_parts, right_parts, membership)
    }

    /// Fiedler vector of the subgraph induced by `nodes`, in `nodes` order.
    fn fiedler_vector(&self, adjacency: &[Vec<usize>], nodes: &[usize]) -> Result<Vec<f64>, PartitionError> {
        let n = nodes.len();
        let mut local = vec![usize::MAX; adjacency.len()];
        for (i, &node) in nodes.iter().enumerate() {
            local[node] = i;
        }
        let neighbors: Vec<Vec<usize>> = nodes
            .iter()
            .map(|&node| {
                adjacency[node]
                    .iter()
                    .filter_map(|&nb| (local[nb] != usize::MAX && nb != node).then_some(local[nb]))
                    .collect()
            })
            .collect();
        let degree: Vec<f64> = neighbors.iter().map(|list| list.len() as f64).collect();
        let max_degree = degree.iter().copied().fold(0.0f64, f64::max);
        // Gershgorin: every Laplacian eigenvalue is at most 2 * max degree
        let shift = 2.0 * max_degree + 1.0;

        let mut v: Vec<f64> = (0..n).map(|i| (i as f64 * 0.1 + 0.1).sin()).collect();
        center(&mut v);
        if !normalize(&mut v, self.tolerance) {
            return Err(PartitionError::SpectralFailed(
                "initial vector degenerate".to_string(),
            ));
        }

        let mut w = vec![0.0; n];
        for _ in 0..self.max_iterations {
            // w = (shift * I - L) v
            for i in 0..n {
                let laplacian_v = degree[i] * v[i] - neighbors[i].iter().map(|&j| v[j]).sum::<f64>();
                w[i] = shift * v[i] - laplacian_v;
            }
            center(&mut w);
            if !normalize(&mut w, self.tolerance) {
                break;
            }
            let diff: f64 = v.iter().zip(&w).map(|(a, b)| (a - b).abs()).sum();
            std::mem::swap(&mut v, &mut w);
            if diff < self.tolerance {
                break;
            }
        }

        if v.iter().any(|x| !x.is_finite()) {
            return Err(PartitionError::SpectralFailed(
                "power iteration diverged".to_string(),
            ));
        }
        Ok(v)
    }
}

fn center(v: &mut [f64]) {
    let mean = v.iter().sum::<f64>() / v.len().max(1) as f64;
    for x in v.iter_mut() {
        *x -= mean;
    }
}

fn normalize(v: &mut [f64], tolerance: f64) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if !(norm > tolerance) {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Move nodes to the part holding most of their neighbors when that lowers
/// the cut and keeps part sizes within the imbalance bounds.
fn refine(adjacency: &[Vec<usize>], membership: &mut [usize], k: usize, passes: usize, max_imbalance: f64) {
    let n = membership.len();
    let average = n as f64 / k as f64;
    let max_size = (average * (1.0 + max_imbalance)).ceil() as usize;
    let min_size = ((average * (1.0 - max_imbalance)).floor() as usize).max(1);

    let mut sizes = vec![0usize; k];
    for &part in membership.iter() {
        sizes[part] += 1;
    }

    let mut counts = vec![0usize; k];
    for _ in 0..passes {
        let mut moves = 0;
        for node in 0..n {
            let own = membership[node];
            for &nb in &adjacency[node] {
                counts[membership[nb]] += 1;
            }
            let best = (0..k)
                .filter(|&p| p != own && sizes[p] < max_size)
                .max_by(|&a, &b| counts[a].cmp(&counts[b]).then(b.cmp(&a)));
            if let Some(best) = best {
                if counts[best] > counts[own] && sizes[own] > min_size {
                    membership[node] = best;
                    sizes[own] -= 1;
                    sizes[best] += 1;
                    moves += 1;
                }
            }
            for &nb in &adjacency[node] {
                counts[membership[nb]] = 0;
            }
        }
        if moves == 0 {
            break;
        }
    }
}

/// Undirected edges whose endpoints sit in different parts.
pub fn edge_cut(adjacency: &[Vec<usize>], membership: &[usize]) -> usize {
    adjacency
        .iter()
        .enumerate()
        .flat_map(|(node, list)| list.iter().map(move |&nb| (node, nb)))
        .filter(|&(a, b)| a < b && membership[a] != membership[b])
        .count()
}
