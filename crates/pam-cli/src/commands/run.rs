use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use pam_algo::PartitionStrategy;
use pam_cli::PipelineConfig;
use pam_core::{NodeId, ResourceProfile};
use pam_io::read_graph;
use tracing::info;

use crate::commands::{analyze, merge, partition};

/// Partition, analyze and merge, keeping artifacts under `work_dir`.
pub fn handle(
    graph_path: &Path,
    work_dir: &Path,
    out: &Path,
    count: Option<usize>,
    strategy: Option<PartitionStrategy>,
    max_jobs: Option<usize>,
    config: &PipelineConfig,
) -> Result<()> {
    let profile = ResourceProfile::detect();
    let partitions_dir = work_dir.join("partitions");
    let results_dir = work_dir.join("results");

    let mut graph = read_graph::<NodeId>(graph_path)
        .with_context(|| format!("loading graph '{}'", graph_path.display()))?;
    let infos = partition::partition_graph(
        &graph,
        &partitions_dir,
        count,
        strategy,
        config,
        profile,
    )?;
    info!(partitions = infos.len(), "partition stage done");

    // results from an earlier partition set would be merged with the new ones
    if results_dir.exists() {
        fs::remove_dir_all(&results_dir)
            .with_context(|| format!("clearing '{}'", results_dir.display()))?;
    }
    let summary = analyze::analyze_all(
        &partitions_dir,
        &results_dir,
        max_jobs,
        false,
        config,
        profile,
    )?;
    if summary.failure > 0 {
        bail!(
            "{} of {} partitions failed; see {}",
            summary.failure,
            summary.jobs.len(),
            summary.manifest_path.display()
        );
    }
    info!(analyzed = summary.success, "analyze stage done");

    let merged = merge::merge_into(&mut graph, &results_dir, Some(&partitions_dir), config)?;
    merge::write_outputs(
        &graph,
        &merged,
        out,
        None,
        Some(&work_dir.join("merge_summary.json")),
    )?;

    println!(
        "{} nodes in {} partitions, {} communities; wrote {}",
        merged.total_nodes,
        merged.partition_count,
        merged.community_count(),
        out.display()
    );
    Ok(())
}
