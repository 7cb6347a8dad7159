use std::path::Path;

use anyhow::{Context, Result};
use pam_algo::ResultsMerger;
use pam_cli::PipelineConfig;
use pam_core::{KeyedGraph, MergedResult, NodeId};
use pam_io::{read_graph, write_graph, write_json, ArtifactKind, ArtifactStore, FsArtifactStore};
use serde::Serialize;

/// Scalar view of a merge for `--summary-out`.
#[derive(Debug, Serialize)]
pub struct MergeSummary {
    pub partition_count: usize,
    pub total_nodes: usize,
    pub community_count: usize,
    pub merge_ms: u64,
}

impl From<&MergedResult<NodeId>> for MergeSummary {
    fn from(merged: &MergedResult<NodeId>) -> Self {
        Self {
            partition_count: merged.partition_count,
            total_nodes: merged.total_nodes,
            community_count: merged.community_count(),
            merge_ms: merged.merge_duration.as_millis() as u64,
        }
    }
}

#[derive(Debug, Serialize)]
struct LayoutRecord<'a> {
    id: &'a NodeId,
    x: f64,
    y: f64,
}

pub fn handle(
    graph_path: &Path,
    results: &Path,
    partitions: Option<&Path>,
    out: &Path,
    layout_out: Option<&Path>,
    summary_out: Option<&Path>,
    config: &PipelineConfig,
) -> Result<()> {
    let mut graph = read_graph::<NodeId>(graph_path)
        .with_context(|| format!("loading graph '{}'", graph_path.display()))?;
    let merged = merge_into(&mut graph, results, partitions, config)?;
    write_outputs(&graph, &merged, out, layout_out, summary_out)?;

    println!("Merged {} partitions:", merged.partition_count);
    println!("  Nodes         : {}", merged.total_nodes);
    println!("  Communities   : {}", merged.community_count());
    println!("  Output        : {}", out.display());
    Ok(())
}

/// Load every result under `results` and annotate `graph` with the merge.
///
/// With a partition directory the result set must cover exactly the stored
/// partitions; without one it must at least have no gaps.
pub fn merge_into(
    graph: &mut KeyedGraph<NodeId>,
    results: &Path,
    partitions: Option<&Path>,
    config: &PipelineConfig,
) -> Result<MergedResult<NodeId>> {
    let merger = ResultsMerger::with_config(config.merge.clone());
    let store = FsArtifactStore::new(results);
    let loaded = match partitions {
        Some(dir) => {
            let partition_count = FsArtifactStore::new(dir)
                .list_ids(ArtifactKind::Partition)
                .with_context(|| format!("listing partitions in '{}'", dir.display()))?
                .len();
            merger.load_expected::<NodeId, _>(&store, partition_count)
        }
        None => merger.load_all::<NodeId, _>(&store),
    }
    .with_context(|| format!("loading results from '{}'", results.display()))?;
    let merged = merger.merge_all(&loaded, graph)?;
    Ok(merged)
}

pub fn write_outputs(
    graph: &KeyedGraph<NodeId>,
    merged: &MergedResult<NodeId>,
    out: &Path,
    layout_out: Option<&Path>,
    summary_out: Option<&Path>,
) -> Result<()> {
    write_graph(out, graph).with_context(|| format!("writing graph '{}'", out.display()))?;
    if let Some(path) = layout_out {
        let records: Vec<LayoutRecord<'_>> = merged
            .global_layout
            .iter()
            .map(|(id, position)| LayoutRecord {
                id,
                x: position.x,
                y: position.y,
            })
            .collect();
        write_json(path, &records)
            .with_context(|| format!("writing layout '{}'", path.display()))?;
    }
    if let Some(path) = summary_out {
        write_json(path, &MergeSummary::from(merged))
            .with_context(|| format!("writing summary '{}'", path.display()))?;
    }
    Ok(())
}
