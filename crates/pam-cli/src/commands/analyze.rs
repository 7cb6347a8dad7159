use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use pam_algo::PartitionWorker;
use pam_batch::{run_batch, BatchRunnerConfig, BatchSummary};
use pam_cli::PipelineConfig;
use pam_core::{NodeId, ResourceProfile};
use pam_io::{ArtifactId, ArtifactStore, FsArtifactStore};
use tabwriter::TabWriter;
use tracing::info;

pub fn handle(
    partitions: &Path,
    results: &Path,
    id: Option<usize>,
    max_jobs: Option<usize>,
    force: bool,
    config: &PipelineConfig,
) -> Result<()> {
    let profile = ResourceProfile::detect();
    if let Some(id) = id {
        return analyze_one(partitions, results, id, force, config, profile);
    }

    let summary = analyze_all(partitions, results, max_jobs, force, config, profile)?;
    print_summary(&summary)?;
    if summary.failure > 0 {
        bail!(
            "{} of {} partitions failed; see {}",
            summary.failure,
            summary.jobs.len(),
            summary.manifest_path.display()
        );
    }
    Ok(())
}

/// Analyze every stored partition through the batch runner.
pub fn analyze_all(
    partitions: &Path,
    results: &Path,
    max_jobs: Option<usize>,
    force: bool,
    config: &PipelineConfig,
    profile: ResourceProfile,
) -> Result<BatchSummary> {
    let mut batch = BatchRunnerConfig::new(partitions, results);
    batch.profile = profile;
    batch.worker = config.worker.clone();
    batch.max_jobs = max_jobs.unwrap_or(config.max_jobs);
    batch.force = force;
    run_batch::<NodeId>(&batch)
}

fn analyze_one(
    partitions: &Path,
    results: &Path,
    id: usize,
    force: bool,
    config: &PipelineConfig,
    profile: ResourceProfile,
) -> Result<()> {
    let partition_store = FsArtifactStore::new(partitions);
    let result_store = FsArtifactStore::new(results);
    if !force && result_store.contains(ArtifactId::result(id))? {
        info!(partition = id, "result exists; skipping (use --force to redo)");
        return Ok(());
    }

    let worker = PartitionWorker::with_config(id, profile, config.worker.clone());
    let result = worker
        .run::<NodeId, _, _>(&partition_store, &result_store)
        .with_context(|| format!("analyzing partition {id}"))?;
    let metrics = &result.metrics;
    println!("Partition {id}:");
    println!("  Nodes         : {}", metrics.node_count);
    println!("  Edges         : {}", metrics.edge_count);
    println!("  Communities   : {}", metrics.community_count);
    println!("  Boundary nodes: {}", metrics.boundary_node_count);
    println!("  Density       : {:.4}", metrics.density);
    if metrics.approximate_centrality {
        println!("  Centrality    : sampled");
    }
    if !metrics.degraded_stages.is_empty() {
        println!("  Degraded      : {}", metrics.degraded_stages.join(", "));
    }
    println!("  Elapsed (ms)  : {}", metrics.analysis_ms);
    Ok(())
}

fn print_summary(summary: &BatchSummary) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "JOB\tSTATUS\tNODES\tMS\tDEGRADED")?;
    for job in &summary.jobs {
        writeln!(
            writer,
            "{}\t{:?}\t{}\t{}\t{}",
            job.job_id,
            job.status,
            job.node_count.map_or("-".to_string(), |n| n.to_string()),
            job.duration_ms,
            job.degraded_stages.join(",")
        )?;
    }
    writer.flush()?;
    println!(
        "{} ok, {} skipped, {} failed; manifest at {}",
        summary.success,
        summary.skipped,
        summary.failure,
        summary.manifest_path.display()
    );
    Ok(())
}
