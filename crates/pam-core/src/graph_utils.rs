use crate::{KeyedGraph, NodeKey};
use petgraph::algo::connected_components;

/// Summary statistics produced by `pam-cli stats` (density/degree/weak components).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub weak_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub density: f64,
}

/// Calculates graph-level statistics: density, degree distribution, and weakly connected components.
pub fn graph_stats<K: NodeKey>(graph: &KeyedGraph<K>) -> GraphStats {
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();
    let degrees = graph.degrees();
    let min_degree = *degrees.iter().min().unwrap_or(&0);
    let max_degree = *degrees.iter().max().unwrap_or(&0);
    let avg_degree = if node_count == 0 {
        0.0
    } else {
        degrees.iter().copied().sum::<usize>() as f64 / node_count as f64
    };
    // petgraph ignores edge direction here, which is exactly weak connectivity
    let weak_components = connected_components(graph.inner());
    GraphStats {
        node_count,
        edge_count,
        weak_components,
        min_degree,
        avg_degree,
        max_degree,
        density: graph.density(),
    }
}
