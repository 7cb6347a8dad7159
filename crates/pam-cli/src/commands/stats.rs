use std::path::Path;

use anyhow::{Context, Result};
use pam_core::{graph_stats, NodeId};
use pam_io::read_graph;

pub fn handle(graph_path: &Path) -> Result<()> {
    let graph = read_graph::<NodeId>(graph_path)
        .with_context(|| format!("loading graph '{}'", graph_path.display()))?;
    let stats = graph_stats(&graph);
    println!("Graph statistics for {}:", graph_path.display());
    println!("  Nodes         : {}", stats.node_count);
    println!("  Edges         : {}", stats.edge_count);
    println!("  Components    : {}", stats.weak_components);
    println!(
        "  Degree [min/avg/max]: {}/{:.2}/{}",
        stats.min_degree, stats.avg_degree, stats.max_degree
    );
    println!("  Density       : {:.4}", stats.density);
    Ok(())
}
