//! Typed access to partition and result artifacts.

use pam_core::{KeyedGraph, NodeKey, PamError, PamResult, PartitionInfo, PartitionResult};
use tracing::{debug, warn};

use crate::codec::{decode, encode};
use crate::store::{ArtifactId, ArtifactKind, ArtifactStore};

/// Persist one raw partition. `boundary_node_count` is left unset; it is
/// only known after analysis.
pub fn save_partition<K, S>(
    store: &S,
    partition_id: usize,
    partition: &KeyedGraph<K>,
) -> PamResult<PartitionInfo>
where
    K: NodeKey,
    S: ArtifactStore + ?Sized,
{
    let bytes = encode(partition)?;
    let artifact_path = store.put(ArtifactId::partition(partition_id), &bytes)?;
    debug!(
        partition_id,
        nodes = partition.node_count(),
        edges = partition.edge_count(),
        "saved partition"
    );
    Ok(PartitionInfo {
        partition_id,
        node_count: partition.node_count(),
        edge_count: partition.edge_count(),
        boundary_node_count: None,
        artifact_path,
    })
}

/// Load one raw partition; not-found if it was never stored.
pub fn load_partition<K, S>(store: &S, partition_id: usize) -> PamResult<KeyedGraph<K>>
where
    K: NodeKey,
    S: ArtifactStore + ?Sized,
{
    let id = ArtifactId::partition(partition_id);
    let bytes = store.get(id)?;
    decode(&bytes).map_err(|err| with_artifact(err, id))
}

pub fn save_result<K, S>(store: &S, result: &PartitionResult<K>) -> PamResult<String>
where
    K: NodeKey,
    S: ArtifactStore + ?Sized,
{
    let bytes = encode(result)?;
    store.put(ArtifactId::result(result.partition_id), &bytes)
}

pub fn load_result<K, S>(store: &S, partition_id: usize) -> PamResult<PartitionResult<K>>
where
    K: NodeKey,
    S: ArtifactStore + ?Sized,
{
    let id = ArtifactId::result(partition_id);
    let bytes = store.get(id)?;
    let result: PartitionResult<K> = decode(&bytes).map_err(|err| with_artifact(err, id))?;
    if result.partition_id != partition_id {
        warn!(
            artifact = %id,
            recorded = result.partition_id,
            "result artifact records a different partition id"
        );
    }
    Ok(result)
}

/// Every stored result in discovery order (ascending partition index).
///
/// Result indices must run `0..N` without gaps: a missing index means a
/// partition was never analyzed (or its job failed), and merging the rest
/// would leave its nodes unannotated. Fails with not-found naming the first
/// missing artifact, or when the store has no results at all.
pub fn load_all_results<K, S>(store: &S) -> PamResult<Vec<PartitionResult<K>>>
where
    K: NodeKey,
    S: ArtifactStore + ?Sized,
{
    let ids = store.list_ids(ArtifactKind::Result)?;
    check_result_ids(&ids, None)?;
    load_ids(store, ids)
}

/// Like [`load_all_results`], but the result set must match exactly
/// `partition_count` partitions: anything missing is not-found, and result
/// indices past the end (left over from an earlier, larger run) are a
/// mismatch.
pub fn load_results_for<K, S>(store: &S, partition_count: usize) -> PamResult<Vec<PartitionResult<K>>>
where
    K: NodeKey,
    S: ArtifactStore + ?Sized,
{
    let ids = store.list_ids(ArtifactKind::Result)?;
    check_result_ids(&ids, Some(partition_count))?;
    load_ids(store, ids)
}

fn check_result_ids(ids: &[usize], expected: Option<usize>) -> PamResult<()> {
    if ids.is_empty() {
        return Err(PamError::NotFound(
            "no partition result artifacts (result_*.json.gz)".to_string(),
        ));
    }
    // ids are sorted and unique, so the first position that disagrees with
    // its index is the first gap
    let missing = ids
        .iter()
        .enumerate()
        .find(|(position, id)| *position != **id)
        .map(|(position, _)| position)
        .or_else(|| expected.filter(|&count| ids.len() < count).map(|_| ids.len()));
    if let Some(index) = missing {
        warn!(missing = %ArtifactId::result(index), found = ids.len(), "incomplete result set");
        return Err(PamError::NotFound(format!(
            "result artifact '{}' ({} of {} results present)",
            ArtifactId::result(index),
            ids.len(),
            expected.unwrap_or(ids[ids.len() - 1] + 1)
        )));
    }
    if let Some(count) = expected {
        if ids.len() > count {
            return Err(PamError::Mismatch(format!(
                "'{}' has no matching partition (expected {count} results)",
                ArtifactId::result(ids[count])
            )));
        }
    }
    Ok(())
}

fn load_ids<K, S>(store: &S, ids: Vec<usize>) -> PamResult<Vec<PartitionResult<K>>>
where
    K: NodeKey,
    S: ArtifactStore + ?Sized,
{
    ids.into_iter()
        .map(|partition_id| load_result(store, partition_id))
        .collect()
}

fn with_artifact(err: PamError, id: ArtifactId) -> PamError {
    match err {
        PamError::Parse(msg) => PamError::Parse(format!("{id}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryArtifactStore;
    use pam_core::{EdgeAttrs, NodeAttrs, PartitionMetrics};
    use std::collections::BTreeMap;

    fn result(partition_id: usize) -> PartitionResult<String> {
        let mut communities = BTreeMap::new();
        communities.insert(format!("n{partition_id}"), 0);
        PartitionResult {
            partition_id,
            communities,
            centrality: BTreeMap::new(),
            layout: BTreeMap::new(),
            boundary_nodes: Vec::new(),
            metrics: PartitionMetrics::default(),
        }
    }

    #[test]
    fn partition_info_describes_saved_partition() {
        let store = MemoryArtifactStore::new();
        let mut graph: KeyedGraph<String> = KeyedGraph::new();
        graph.add_node("solo".into(), NodeAttrs::labeled("Solo"));
        graph.add_edge("a".into(), "b".into(), EdgeAttrs::weighted(2.0));

        let info = save_partition(&store, 7, &graph).unwrap();
        assert_eq!(info.partition_id, 7);
        assert_eq!(info.node_count, 3);
        assert_eq!(info.edge_count, 1);
        assert_eq!(info.boundary_node_count, None);
        assert!(info.artifact_path.ends_with("partition_00007.json.gz"));

        let loaded: KeyedGraph<String> = load_partition(&store, 7).unwrap();
        assert_eq!(
            loaded.node(&"solo".to_string()).unwrap().label.as_deref(),
            Some("Solo")
        );
        assert_eq!(loaded.edge(&"a".into(), &"b".into()).unwrap().weight, Some(2.0));
    }

    #[test]
    fn missing_partition_fails_loudly() {
        let store = MemoryArtifactStore::new();
        let err = load_partition::<String, _>(&store, 0).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn load_all_results_uses_index_order() {
        let store = MemoryArtifactStore::new();
        for id in [2, 0, 1] {
            save_result(&store, &result(id)).unwrap();
        }
        let results: Vec<PartitionResult<String>> = load_all_results(&store).unwrap();
        let ids: Vec<usize> = results.iter().map(|r| r.partition_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn load_all_results_rejects_empty_store() {
        let store = MemoryArtifactStore::new();
        let err = load_all_results::<String, _>(&store).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn gap_in_result_indices_names_the_missing_artifact() {
        let store = MemoryArtifactStore::new();
        for id in [0, 2] {
            save_result(&store, &result(id)).unwrap();
        }
        let err = load_all_results::<String, _>(&store).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("result_00001.json.gz"), "{err}");
    }

    #[test]
    fn results_must_match_the_partition_count() {
        let store = MemoryArtifactStore::new();
        for id in 0..3 {
            save_result(&store, &result(id)).unwrap();
        }
        assert_eq!(load_results_for::<String, _>(&store, 3).unwrap().len(), 3);

        let short = load_results_for::<String, _>(&store, 4).unwrap_err();
        assert!(short.is_not_found());
        assert!(short.to_string().contains("result_00003.json.gz"), "{short}");

        let stale = load_results_for::<String, _>(&store, 2).unwrap_err();
        assert!(matches!(stale, PamError::Mismatch(_)));
        assert!(stale.to_string().contains("result_00002.json.gz"), "{stale}");
    }

    #[test]
    fn corrupt_result_names_the_artifact() {
        let store = MemoryArtifactStore::new();
        store.put(ArtifactId::result(3), b"garbage").unwrap();
        let err = load_result::<String, _>(&store, 3).unwrap_err();
        assert!(err.to_string().contains("result_00003.json.gz"));
    }
}
