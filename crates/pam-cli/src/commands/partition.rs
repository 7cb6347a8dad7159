use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use pam_algo::{PartitionStrategy, Partitioner};
use pam_cli::PipelineConfig;
use pam_core::{KeyedGraph, NodeId, PartitionInfo, ResourceProfile};
use pam_io::{read_graph, write_json, ArtifactId, ArtifactKind, ArtifactStore, FsArtifactStore};
use tabwriter::TabWriter;
use tracing::info;

/// Index of the stored partitions, written next to the artifacts.
pub const PARTITIONS_FILE: &str = "partitions.json";

pub fn handle(
    graph_path: &Path,
    out: &Path,
    count: Option<usize>,
    strategy: Option<PartitionStrategy>,
    config: &PipelineConfig,
) -> Result<()> {
    let graph = read_graph::<NodeId>(graph_path)
        .with_context(|| format!("loading graph '{}'", graph_path.display()))?;
    let infos = partition_graph(
        &graph,
        out,
        count,
        strategy,
        config,
        ResourceProfile::detect(),
    )?;

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "PARTITION\tNODES\tEDGES\tARTIFACT")?;
    for info in &infos {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            info.partition_id, info.node_count, info.edge_count, info.artifact_path
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Partition `graph` into `out`, replacing whatever partition set was there.
pub fn partition_graph(
    graph: &KeyedGraph<NodeId>,
    out: &Path,
    count: Option<usize>,
    strategy: Option<PartitionStrategy>,
    config: &PipelineConfig,
    profile: ResourceProfile,
) -> Result<Vec<PartitionInfo>> {
    let mut partitioner_config = config.partitioner.clone();
    if let Some(strategy) = strategy {
        partitioner_config.strategy = strategy;
    }
    let partitioner = Partitioner::with_config(profile, partitioner_config);
    let k = count
        .unwrap_or_else(|| partitioner.calculate_partition_count(graph.node_count()))
        .max(1);
    info!(
        nodes = graph.node_count(),
        partitions = k,
        strategy = ?partitioner.config().strategy,
        "partitioning"
    );

    let store = FsArtifactStore::new(out);
    let parts = partitioner.partition(graph, k);
    let infos = parts
        .iter()
        .enumerate()
        .map(|(id, part)| {
            partitioner
                .save(part, id, &store)
                .with_context(|| format!("saving partition {id} to '{}'", out.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    remove_stale(&store, infos.len())?;
    write_json(&out.join(PARTITIONS_FILE), &infos)?;
    Ok(infos)
}

/// Drop partition artifacts left over from an earlier, larger run so they
/// are not analyzed with the new set.
fn remove_stale(store: &FsArtifactStore, keep: usize) -> Result<()> {
    if !store.root().is_dir() {
        return Ok(());
    }
    for id in store.list_ids(ArtifactKind::Partition)? {
        if id >= keep {
            let path = store.path_of(ArtifactId::partition(id));
            fs::remove_file(&path)
                .with_context(|| format!("removing stale partition '{}'", path.display()))?;
            info!(artifact = %path.display(), "removed stale partition");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pam_core::EdgeAttrs;
    use tempfile::tempdir;

    fn cycle(n: i64) -> KeyedGraph<NodeId> {
        let mut graph = KeyedGraph::new();
        for i in 0..n {
            graph.add_edge(
                NodeId::from(i),
                NodeId::from((i + 1) % n),
                EdgeAttrs::default(),
            );
        }
        graph
    }

    #[test]
    fn writes_artifacts_and_index() {
        let dir = tempdir().unwrap();
        let infos = partition_graph(
            &cycle(12),
            dir.path(),
            Some(3),
            None,
            &PipelineConfig::default(),
            ResourceProfile::new(2, 1.0),
        )
        .unwrap();
        assert_eq!(infos.len(), 3);
        assert_eq!(infos.iter().map(|i| i.node_count).sum::<usize>(), 12);
        assert!(dir.path().join("partition_00002.json.gz").is_file());
        assert!(dir.path().join(PARTITIONS_FILE).is_file());
    }

    #[test]
    fn smaller_rerun_removes_stale_partitions() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::default();
        let profile = ResourceProfile::new(2, 1.0);
        partition_graph(&cycle(12), dir.path(), Some(4), None, &config, profile).unwrap();
        partition_graph(&cycle(12), dir.path(), Some(2), None, &config, profile).unwrap();

        let store = FsArtifactStore::new(dir.path());
        assert_eq!(store.list_ids(ArtifactKind::Partition).unwrap(), vec![0, 1]);
    }
}
