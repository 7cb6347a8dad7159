use std::collections::BTreeSet;

use pam_algo::{PartitionStrategy, PartitionWorker, Partitioner, PartitionerConfig, ResultsMerger};
use pam_core::{EdgeAttrs, KeyedGraph, NodeAttrs, NodeId, PartitionResult, ResourceProfile};
use pam_io::{ArtifactKind, ArtifactStore, FsArtifactStore};
use tempfile::tempdir;

fn profile() -> ResourceProfile {
    ResourceProfile::new(2, 8.0)
}

/// Three 5-cliques chained by single edges, plus a labelled hub.
fn clustered_graph() -> KeyedGraph<NodeId> {
    let mut graph = KeyedGraph::new();
    graph.add_node(NodeId::from("hub"), NodeAttrs::labeled("Hub"));
    for cluster in 0..3i64 {
        let base = cluster * 10;
        for a in 0..5 {
            for b in a + 1..5 {
                graph.add_edge(
                    NodeId::from(base + a),
                    NodeId::from(base + b),
                    EdgeAttrs::weighted(1.0),
                );
            }
        }
        graph.add_edge(NodeId::from("hub"), NodeId::from(base), EdgeAttrs::default());
    }
    graph
}

#[test]
fn full_pipeline_through_the_filesystem() {
    let dir = tempdir().unwrap();
    let partitions = FsArtifactStore::new(dir.path().join("partitions"));
    let results = FsArtifactStore::new(dir.path().join("results"));
    let mut graph = clustered_graph();

    let partitioner = Partitioner::new(profile());
    let parts = partitioner.partition(&graph, 3);
    assert_eq!(parts.len(), 3);
    for (id, part) in parts.iter().enumerate() {
        let info = partitioner.save(part, id, &partitions).unwrap();
        assert!(info.artifact_path.ends_with(&format!("partition_{id:05}.json.gz")));
    }
    assert_eq!(partitions.list_ids(ArtifactKind::Partition).unwrap(), vec![0, 1, 2]);

    for id in 0..parts.len() {
        PartitionWorker::new(id, profile())
            .run::<NodeId, _, _>(&partitions, &results)
            .unwrap();
    }

    let merger = ResultsMerger::new();
    let loaded: Vec<PartitionResult<NodeId>> = merger.load_all(&results).unwrap();
    let local_total: usize = loaded.iter().map(|r| r.community_count()).sum();
    let merged = merger.merge_all(&loaded, &mut graph).unwrap();

    assert_eq!(merged.total_nodes, graph.node_count());
    assert_eq!(merged.community_count(), local_total);
    let max = merged
        .global_centrality
        .values()
        .copied()
        .fold(0.0f64, f64::max);
    assert!(max == 0.0 || max == 1.0);
    for (key, attrs) in graph.nodes() {
        assert!(attrs.community.is_some(), "{key} not annotated");
        assert!(attrs.betweenness.is_some(), "{key} not annotated");
    }
    assert_eq!(
        graph.node(&NodeId::from("hub")).unwrap().label.as_deref(),
        Some("Hub")
    );

    // every node sits inside the 2x2 grid
    for pos in merged.global_layout.values() {
        assert!((0.0..=200.0).contains(&pos.x) && (0.0..=200.0).contains(&pos.y));
    }
}

#[test]
fn cycle_of_nine_splits_into_three() {
    let mut graph: KeyedGraph<u32> = KeyedGraph::new();
    for i in 0..9 {
        graph.add_edge(i, (i + 1) % 9, EdgeAttrs::default());
    }
    let config = PartitionerConfig {
        strategy: PartitionStrategy::Community,
        ..PartitionerConfig::default()
    };
    let parts = Partitioner::with_config(profile(), config).partition(&graph, 3);
    assert_eq!(parts.len(), 3);
    let mut seen = BTreeSet::new();
    for part in &parts {
        assert!(part.node_count() > 0);
        for key in part.keys() {
            assert!(seen.insert(*key));
        }
    }
    assert_eq!(seen.len(), 9);
}

#[test]
fn merging_an_empty_results_directory_is_not_found() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("results")).unwrap();
    let store = FsArtifactStore::new(dir.path().join("results"));
    let err = ResultsMerger::new()
        .load_all::<NodeId, _>(&store)
        .unwrap_err();
    assert!(err.is_not_found());
}
