//! Community detection on the undirected projection of a partition.
//!
//! [`Louvain`] is the built-in detector: greedy modularity optimization with
//! graph aggregation between levels. Node visiting order is shuffled with a
//! seeded RNG, so the same graph and seed always produce the same
//! communities.
//!
//! Communities are returned as lists of node positions (insertion-order
//! indices into the graph), each list sorted ascending and the lists ordered
//! by their smallest member. Every node appears in exactly one list;
//! isolated nodes come back as singletons.

use std::collections::BTreeMap;

use pam_core::UndirectedAdjacency;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::deadline::{Deadline, StageError};

/// Seam for community detection routines: `detect(graph, seed) -> [node set]`.
pub trait CommunityDetector: Send + Sync {
    fn detect(
        &self,
        graph: &UndirectedAdjacency,
        seed: u64,
    ) -> Result<Vec<Vec<usize>>, StageError>;
}

/// Louvain modularity maximization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Louvain {
    /// Modularity resolution; values above 1 favour smaller communities.
    pub resolution: f64,
    /// Aggregation levels before giving up on further improvement.
    pub max_levels: usize,
    /// Local-moving sweeps per level.
    pub max_passes: usize,
    /// Smallest modularity gain (in edge-weight units) worth a move.
    pub min_gain: f64,
}

impl Default for Louvain {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            max_levels: 32,
            max_passes: 64,
            min_gain: 1e-10,
        }
    }
}

impl CommunityDetector for Louvain {
    fn detect(
        &self,
        graph: &UndirectedAdjacency,
        seed: u64,
    ) -> Result<Vec<Vec<usize>>, StageError> {
        self.run(graph, seed, &Deadline::unbounded())
    }
}

/// Weighted graph at one aggregation level. Self-loop weight is kept apart
/// from the neighbor lists and contributes twice to a node's degree.
struct Level {
    adj: Vec<Vec<(usize, f64)>>,
    loops: Vec<f64>,
}

impl Level {
    fn from_adjacency(graph: &UndirectedAdjacency) -> Self {
        let n = graph.node_count();
        let mut adj = vec![Vec::new(); n];
        let mut loops = vec![0.0; n];
        for (node, list) in adj.iter_mut().enumerate() {
            for &(neighbor, weight) in graph.neighbors(node) {
                if neighbor == node {
                    loops[node] += weight;
                } else {
                    list.push((neighbor, weight));
                }
            }
        }
        Self { adj, loops }
    }

    fn len(&self) -> usize {
        self.adj.len()
    }

    fn degrees(&self) -> Vec<f64> {
        self.adj
            .iter()
            .zip(&self.loops)
            .map(|(list, &self_loop)| list.iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * self_loop)
            .collect()
    }

    /// Collapse every community into one node. `community` must be densely
    /// numbered `0..count`.
    fn aggregate(&self, community: &[usize], count: usize) -> Self {
        let mut merged: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut loops = vec![0.0; count];
        for node in 0..self.len() {
            let c = community[node];
            loops[c] += self.loops[node];
            for &(neighbor, weight) in &self.adj[node] {
                let d = community[neighbor];
                if c == d {
                    // seen once from each endpoint
                    loops[c] += weight / 2.0;
                } else {
                    *merged[c].entry(d).or_insert(0.0) += weight;
                }
            }
        }
        Self {
            adj: merged.into_iter().map(|m| m.into_iter().collect()).collect(),
            loops,
        }
    }
}

impl Louvain {
    /// Detect communities, polling `deadline` between sweeps.
    pub fn run(
        &self,
        graph: &UndirectedAdjacency,
        seed: u64,
        deadline: &Deadline,
    ) -> Result<Vec<Vec<usize>>, StageError> {
        let n = graph.node_count();
        if n == 0 {
            return Ok(Vec::new());
        }
        if !self.resolution.is_finite() || self.resolution < 0.0 {
            return Err(StageError::Failed(format!(
                "invalid resolution {}",
                self.resolution
            )));
        }

        let mut level = Level::from_adjacency(graph);
        let total: f64 = level.degrees().iter().sum();
        if !total.is_finite() {
            return Err(StageError::NonFinite("edge weight"));
        }
        let mut membership: Vec<usize> = (0..n).collect();
        if total <= 0.0 {
            return Ok(group(&membership));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..self.max_levels.max(1) {
            deadline.check()?;
            let (community, moved) = self.local_moving(&level, total, &mut rng, deadline)?;
            let (community, count) = renumber(&community);
            for slot in membership.iter_mut() {
                *slot = community[*slot];
            }
            if !moved || count == level.len() {
                break;
            }
            level = level.aggregate(&community, count);
        }
        Ok(group(&membership))
    }

    /// One level of greedy moves. Returns each node's community label (a
    /// node index, not yet dense) and whether anything moved.
    fn local_moving(
        &self,
        level: &Level,
        total: f64,
        rng: &mut StdRng,
        deadline: &Deadline,
    ) -> Result<(Vec<usize>, bool), StageError> {
        let n = level.len();
        let degree = level.degrees();
        let mut community: Vec<usize> = (0..n).collect();
        let mut community_degree = degree.clone();

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        let mut link_weight = vec![0.0; n];
        let mut seen = vec![false; n];
        let mut touched: Vec<usize> = Vec::new();
        let mut moved_any = false;

        for _ in 0..self.max_passes.max(1) {
            deadline.check()?;
            let mut moves = 0usize;
            for &node in &order {
                let current = community[node];
                touched.clear();
                for &(neighbor, weight) in &level.adj[node] {
                    let c = community[neighbor];
                    if !seen[c] {
                        seen[c] = true;
                        touched.push(c);
                    }
                    link_weight[c] += weight;
                }

                let k = degree[node];
                community_degree[current] -= k;
                let gain_of = |c: usize, weight_to: f64, community_degree: &[f64]| {
                    weight_to - self.resolution * community_degree[c] * k / total
                };

                let mut best = current;
                let mut best_gain = gain_of(current, link_weight[current], &community_degree);
                for &c in &touched {
                    let gain = gain_of(c, link_weight[c], &community_degree);
                    if gain > best_gain + self.min_gain {
                        best = c;
                        best_gain = gain;
                    }
                }

                community_degree[best] += k;
                community[node] = best;
                if best != current {
                    moves += 1;
                }

                for &c in &touched {
                    link_weight[c] = 0.0;
                    seen[c] = false;
                }
            }
            if moves == 0 {
                break;
            }
            moved_any = true;
        }
        Ok((community, moved_any))
    }
}

/// Dense renumbering by first appearance.
fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let mut dense = Vec::with_capacity(labels.len());
    for &label in labels {
        let next = mapping.len();
        dense.push(*mapping.entry(label).or_insert(next));
    }
    (dense, mapping.len())
}

/// Node lists per community, ordered by smallest member.
fn group(membership: &[usize]) -> Vec<Vec<usize>> {
    let (dense, count) = renumber(membership);
    let mut groups = vec![Vec::new(); count];
    for (node, &c) in dense.iter().enumerate() {
        groups[c].push(node);
    }
    groups
}

/// Modularity of a node partition (resolution 1). Used by tests and
/// diagnostics; 0 for a graph without edges.
pub fn modularity(graph: &UndirectedAdjacency, communities: &[Vec<usize>]) -> f64 {
    let level = Level::from_adjacency(graph);
    let degree = level.degrees();
    let total: f64 = degree.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut label = vec![usize::MAX; level.len()];
    for (c, members) in communities.iter().enumerate() {
        for &node in members {
            if node < label.len() {
                label[node] = c;
            }
        }
    }
    let mut internal = vec![0.0; communities.len()];
    let mut tot = vec![0.0; communities.len()];
    for node in 0..level.len() {
        let c = label[node];
        if c == usize::MAX {
            continue;
        }
        tot[c] += degree[node];
        internal[c] += 2.0 * level.loops[node];
        for &(neighbor, weight) in &level.adj[node] {
            if label[neighbor] == c {
                internal[c] += weight;
            }
        }
    }
    internal
        .iter()
        .zip(&tot)
        .map(|(&inside, &t)| inside / total - (t / total).powi(2))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cliques() -> UndirectedAdjacency {
        // 0-1-2-3 and 4-5-6-7 fully connected, bridged by 3-4
        let mut edges = Vec::new();
        for block in [0usize, 4] {
            for a in block..block + 4 {
                for b in a + 1..block + 4 {
                    edges.push((a, b, 1.0));
                }
            }
        }
        edges.push((3, 4, 1.0));
        UndirectedAdjacency::from_edges(8, &edges)
    }

    #[test]
    fn finds_the_two_cliques() {
        let communities = Louvain::default().detect(&two_cliques(), 42).unwrap();
        assert_eq!(communities, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    }

    #[test]
    fn same_seed_same_answer() {
        let graph = two_cliques();
        let a = Louvain::default().detect(&graph, 7).unwrap();
        let b = Louvain::default().detect(&graph, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn isolated_nodes_are_singletons() {
        let graph = UndirectedAdjacency::from_edges(4, &[(0, 1, 1.0)]);
        let communities = Louvain::default().detect(&graph, 42).unwrap();
        assert_eq!(communities, vec![vec![0, 1], vec![2], vec![3]]);
    }

    #[test]
    fn every_node_is_assigned_once() {
        let edges: Vec<(usize, usize, f64)> = (0..30).map(|i| (i, (i + 1) % 30, 1.0)).collect();
        let graph = UndirectedAdjacency::from_edges(30, &edges);
        let communities = Louvain::default().detect(&graph, 42).unwrap();
        let mut all: Vec<usize> = communities.concat();
        all.sort_unstable();
        assert_eq!(all, (0..30).collect::<Vec<_>>());
        assert!(communities.len() > 1);
        assert!(modularity(&graph, &communities) > 0.3);
    }

    #[test]
    fn expired_deadline_stops_detection() {
        let deadline = Deadline::after(std::time::Duration::ZERO);
        let err = Louvain::default()
            .run(&two_cliques(), 42, &deadline)
            .unwrap_err();
        assert_eq!(err, StageError::BudgetExhausted);
    }

    #[test]
    fn empty_graph_has_no_communities() {
        let graph = UndirectedAdjacency::from_edges(0, &[]);
        assert!(Louvain::default().detect(&graph, 42).unwrap().is_empty());
    }

    #[test]
    fn modularity_of_clique_split() {
        let graph = two_cliques();
        let good = modularity(&graph, &[vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
        let bad = modularity(&graph, &[(0..8).collect()]);
        assert!(good > bad);
        assert!(bad.abs() < 1e-12);
    }
}
