//! Keyed directed graph used throughout the pipeline.
//!
//! [`KeyedGraph`] wraps a petgraph `DiGraph` and keeps a key→index map next
//! to it. Nodes are never removed, so a node's `NodeIndex::index()` is also
//! its position in insertion order; every dense per-node vector produced by
//! the algorithms (adjacency lists, scores, memberships) is indexed that way.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::node_link::NodeLinkGraph;
use crate::{EdgeAttrs, NodeAttrs, NodeKey};

/// Node payload stored in the underlying petgraph graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData<K> {
    pub key: K,
    pub attrs: NodeAttrs,
}

/// Directed simple graph keyed by `K`.
///
/// Serializes as node-link JSON (see [`crate::node_link`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    into = "NodeLinkGraph<K>",
    from = "NodeLinkGraph<K>",
    bound = "K: NodeKey"
)]
pub struct KeyedGraph<K: NodeKey> {
    graph: DiGraph<NodeData<K>, EdgeAttrs>,
    index: HashMap<K, NodeIndex>,
}

impl<K: NodeKey> Default for KeyedGraph<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NodeKey> KeyedGraph<K> {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: DiGraph::with_capacity(nodes, edges),
            index: HashMap::with_capacity(nodes),
        }
    }

    /// Read-only access to the petgraph representation.
    pub fn inner(&self) -> &DiGraph<NodeData<K>, EdgeAttrs> {
        &self.graph
    }

    /// Insert `key` with `attrs`, replacing the attributes if the node exists.
    pub fn add_node(&mut self, key: K, attrs: NodeAttrs) -> NodeIndex {
        match self.index.get(&key) {
            Some(&idx) => {
                self.graph[idx].attrs = attrs;
                idx
            }
            None => {
                let idx = self.graph.add_node(NodeData {
                    key: key.clone(),
                    attrs,
                });
                self.index.insert(key, idx);
                idx
            }
        }
    }

    /// Index of `key`, inserting it with default attributes if absent.
    pub fn ensure_node(&mut self, key: K) -> NodeIndex {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        self.add_node(key, NodeAttrs::default())
    }

    /// Add `from -> to`, inserting missing endpoints. An existing edge keeps
    /// its index and takes the new attributes.
    pub fn add_edge(&mut self, from: K, to: K, attrs: EdgeAttrs) -> EdgeIndex {
        let a = self.ensure_node(from);
        let b = self.ensure_node(to);
        self.graph.update_edge(a, b, attrs)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains_node(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn node_index(&self, key: &K) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    /// Key stored at `idx`. Panics if `idx` is out of range, like petgraph indexing.
    pub fn key_of(&self, idx: NodeIndex) -> &K {
        &self.graph[idx].key
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.graph.node_weights().map(|node| &node.key)
    }

    /// Keys and attributes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (&K, &NodeAttrs)> + '_ {
        self.graph.node_weights().map(|node| (&node.key, &node.attrs))
    }

    pub fn node(&self, key: &K) -> Option<&NodeAttrs> {
        self.node_index(key).map(|idx| &self.graph[idx].attrs)
    }

    pub fn node_mut(&mut self, key: &K) -> Option<&mut NodeAttrs> {
        let idx = self.node_index(key)?;
        Some(&mut self.graph[idx].attrs)
    }

    /// Edges as `(source, target, attrs)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&K, &K, &EdgeAttrs)> + '_ {
        self.graph.edge_references().map(move |edge| {
            (
                &self.graph[edge.source()].key,
                &self.graph[edge.target()].key,
                edge.weight(),
            )
        })
    }

    pub fn edge(&self, from: &K, to: &K) -> Option<&EdgeAttrs> {
        let a = self.node_index(from)?;
        let b = self.node_index(to)?;
        self.graph.find_edge(a, b).map(|e| &self.graph[e])
    }

    /// Total degree (in + out); a self-loop counts twice.
    pub fn degree(&self, key: &K) -> usize {
        self.node_index(key)
            .map(|idx| self.degree_at(idx))
            .unwrap_or(0)
    }

    pub fn degree_at(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
            + self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Degrees of every node, indexed by insertion order.
    pub fn degrees(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .map(|idx| self.degree_at(idx))
            .collect()
    }

    /// Out-neighbor lists indexed by insertion order (self-loops dropped).
    pub fn out_adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.node_count()];
        for edge in self.graph.edge_references() {
            let (s, t) = (edge.source().index(), edge.target().index());
            if s != t {
                adj[s].push(t);
            }
        }
        for list in &mut adj {
            list.sort_unstable();
        }
        adj
    }

    /// Directed density `m / (n (n - 1))`, 0 for fewer than two nodes.
    pub fn density(&self) -> f64 {
        let n = self.node_count() as f64;
        if self.node_count() < 2 {
            0.0
        } else {
            self.edge_count() as f64 / (n * (n - 1.0))
        }
    }

    /// Undirected projection: reciprocal edges collapse into one undirected
    /// edge whose weight is taken from the edge inserted last.
    pub fn undirected(&self) -> UndirectedAdjacency {
        let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for edge in self.graph.edge_references() {
            let (s, t) = (edge.source().index(), edge.target().index());
            let key = if s <= t { (s, t) } else { (t, s) };
            pairs.insert(key, edge.weight().effective_weight());
        }

        let mut neighbors = vec![Vec::new(); self.node_count()];
        let mut edge_count = 0;
        for ((a, b), w) in pairs {
            edge_count += 1;
            neighbors[a].push((b, w));
            if a != b {
                neighbors[b].push((a, w));
            }
        }
        UndirectedAdjacency {
            neighbors,
            edge_count,
        }
    }

    /// Subgraph containing exactly the given keys (unknown keys are ignored)
    /// and every edge whose endpoints are both kept. Node order follows this
    /// graph's insertion order; attributes are cloned.
    pub fn induced_subgraph<'a, I>(&self, keys: I) -> KeyedGraph<K>
    where
        I: IntoIterator<Item = &'a K>,
    {
        let wanted: HashSet<NodeIndex> = keys
            .into_iter()
            .filter_map(|key| self.node_index(key))
            .collect();

        let mut sub = KeyedGraph::with_capacity(wanted.len(), 0);
        for idx in self.graph.node_indices() {
            if wanted.contains(&idx) {
                let node = &self.graph[idx];
                sub.add_node(node.key.clone(), node.attrs.clone());
            }
        }
        for edge in self.graph.edge_references() {
            if wanted.contains(&edge.source()) && wanted.contains(&edge.target()) {
                sub.add_edge(
                    self.graph[edge.source()].key.clone(),
                    self.graph[edge.target()].key.clone(),
                    edge.weight().clone(),
                );
            }
        }
        sub
    }

    /// Subgraph over node positions (insertion-order indices).
    pub fn induced_by_positions(&self, positions: &[usize]) -> KeyedGraph<K> {
        let keys: Vec<&K> = positions
            .iter()
            .filter(|&&pos| pos < self.node_count())
            .map(|&pos| self.key_of(NodeIndex::new(pos)))
            .collect();
        self.induced_subgraph(keys)
    }
}

/// Weighted undirected adjacency over node positions.
///
/// Neighbor lists are sorted by neighbor position; a self-loop appears once
/// in its node's list.
#[derive(Debug, Clone, PartialEq)]
pub struct UndirectedAdjacency {
    neighbors: Vec<Vec<(usize, f64)>>,
    edge_count: usize,
}

impl UndirectedAdjacency {
    /// Build from explicit undirected edges over `node_count` positions.
    pub fn from_edges(node_count: usize, edges: &[(usize, usize, f64)]) -> Self {
        let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(a, b, w) in edges {
            if a < node_count && b < node_count {
                pairs.insert(if a <= b { (a, b) } else { (b, a) }, w);
            }
        }
        let mut neighbors = vec![Vec::new(); node_count];
        let mut edge_count = 0;
        for ((a, b), w) in pairs {
            edge_count += 1;
            neighbors[a].push((b, w));
            if a != b {
                neighbors[b].push((a, w));
            }
        }
        Self {
            neighbors,
            edge_count,
        }
    }

    pub fn node_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn neighbors(&self, node: usize) -> &[(usize, f64)] {
        &self.neighbors[node]
    }

    /// Unweighted 0-indexed adjacency list without self-loops, the input
    /// format min-cut partitioners expect.
    pub fn adjacency_list(&self) -> Vec<Vec<usize>> {
        self.neighbors
            .iter()
            .enumerate()
            .map(|(node, list)| {
                list.iter()
                    .map(|&(n, _)| n)
                    .filter(|&n| n != node)
                    .collect()
            })
            .collect()
    }
}
