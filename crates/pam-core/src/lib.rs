//! # pam-core: graph model for the partition–analyze–merge pipeline
//!
//! Provides the graph abstraction, attribute types, and data-model records
//! shared by the partitioner, the per-partition worker, and the merger.
//!
//! ## Design Philosophy
//!
//! Graphs are modeled as **directed simple graphs** keyed by an opaque,
//! stable node key:
//! - **Nodes**: a key `K` plus a typed [`NodeAttrs`] record
//! - **Edges**: a typed [`EdgeAttrs`] record (optional `weight` and `type`)
//!
//! The key type is a parameter ([`NodeKey`]) so library users can key by
//! `String`, `u64`, or the CLI's mixed [`NodeId`]. Adjacency iteration and
//! the undirected projection are first-class because both the partitioner
//! and the worker consume them.
//!
//! ## Quick Start
//!
//! ```rust
//! use pam_core::*;
//!
//! let mut graph: KeyedGraph<NodeId> = KeyedGraph::new();
//! graph.add_edge(NodeId::from("a"), NodeId::from("b"), EdgeAttrs::weighted(2.0));
//! graph.add_edge(NodeId::from("b"), NodeId::from(7), EdgeAttrs::default());
//!
//! assert_eq!(graph.node_count(), 3);
//! assert_eq!(graph.degree(&NodeId::from("b")), 2);
//! ```
//!
//! ## Modules
//!
//! - [`graph`] - [`KeyedGraph`], induced subgraphs, undirected projection
//! - [`model`] - partition/result/merge records that cross process boundaries
//! - [`resources`] - CPU/RAM snapshot driving partition and pool sizing
//! - [`graph_utils`] - summary statistics for `pam-cli stats`
//! - [`node_link`] - node-link JSON representation of a graph
//! - [`error`] - unified [`PamError`]

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

pub mod error;
pub mod graph;
pub mod graph_utils;
pub mod model;
pub mod node_link;
pub mod resources;
pub mod serde_pairs;

pub use error::{PamError, PamResult};
pub use graph::{KeyedGraph, NodeData, UndirectedAdjacency};
pub use graph_utils::{graph_stats, GraphStats};
pub use model::{
    MergedResult, PartitionInfo, PartitionMetrics, PartitionResult, Position,
};
pub use petgraph::graph::NodeIndex;
pub use resources::ResourceProfile;

/// Bound for anything usable as a node key.
///
/// Keys must be cheap to clone, totally ordered (deterministic iteration in
/// result maps), hashable, printable, serializable, and shareable across
/// rayon workers.
pub trait NodeKey:
    Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> NodeKey for T where
    T: Clone
        + Eq
        + Hash
        + Ord
        + fmt::Debug
        + fmt::Display
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Mixed integer/text node key as it appears in node-link JSON.
///
/// Integers and strings never compare equal: `7` and `"7"` are different
/// nodes, matching the JSON they came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Text(String),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Int(value) => write!(f, "{value}"),
            NodeId::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        NodeId::Int(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId::Text(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId::Text(value)
    }
}

/// Attribute values the pipeline does not interpret but must carry through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

/// Typed node attributes.
///
/// `community` and `betweenness` are the two attributes the merger writes
/// back onto the original graph; everything the pipeline does not know about
/// lands in `extra` and is preserved verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub betweenness: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, AttrValue>,
}

impl NodeAttrs {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }
}

/// Typed edge attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, AttrValue>,
}

impl EdgeAttrs {
    pub fn weighted(weight: f64) -> Self {
        Self {
            weight: Some(weight),
            ..Self::default()
        }
    }

    /// Weight used by weighted algorithms: missing, non-finite, or
    /// non-positive weights count as 1.0.
    #[inline]
    pub fn effective_weight(&self) -> f64 {
        match self.weight {
            Some(w) if w.is_finite() && w > 0.0 => w,
            _ => 1.0,
        }
    }
}
