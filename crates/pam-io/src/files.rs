//! Plain JSON files at the edges of the pipeline: the input graph, the
//! annotated output graph, and merge summaries.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use pam_core::{KeyedGraph, NodeKey, PamError, PamResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

/// Load a node-link JSON graph.
pub fn read_graph<K: NodeKey>(path: &Path) -> PamResult<KeyedGraph<K>> {
    let graph: KeyedGraph<K> = read_json(path)?;
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "loaded graph"
    );
    Ok(graph)
}

/// Write a graph as node-link JSON, creating parent directories.
pub fn write_graph<K: NodeKey>(path: &Path, graph: &KeyedGraph<K>) -> PamResult<()> {
    write_json(path, graph)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> PamResult<T> {
    let file = File::open(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => PamError::NotFound(format!("file '{}'", path.display())),
        _ => PamError::Io(err),
    })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| PamError::Parse(format!("parsing '{}': {err}", path.display())))
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> PamResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
