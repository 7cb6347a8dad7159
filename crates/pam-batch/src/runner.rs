use crate::job::{jobs_from_store, BatchJob, BatchJobRecord, JobStatus};
use crate::manifest::{write_batch_manifest, BatchManifest, MANIFEST_FILE};
use anyhow::{Context, Result};
use chrono::Utc;
use pam_algo::{PartitionWorker, WorkerConfig};
use pam_core::{NodeKey, ResourceProfile};
use pam_io::{ArtifactId, ArtifactStore, FsArtifactStore};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing::{info, warn};
use web_time::Instant;

/// Runner settings for analyzing every stored partition.
pub struct BatchRunnerConfig {
    pub partitions_dir: PathBuf,
    pub results_dir: PathBuf,
    pub profile: ResourceProfile,
    pub worker: WorkerConfig,
    /// Partitions analyzed concurrently; 0 uses every core.
    pub max_jobs: usize,
    /// Re-analyze partitions that already have a result artifact.
    pub force: bool,
    /// Restrict the batch to these partition ids.
    pub only: Option<Vec<usize>>,
}

impl BatchRunnerConfig {
    pub fn new(partitions_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            partitions_dir: partitions_dir.into(),
            results_dir: results_dir.into(),
            profile: ResourceProfile::detect(),
            worker: WorkerConfig::default(),
            max_jobs: 0,
            force: false,
            only: None,
        }
    }
}

/// Summary returned after the run so callers can report counts and the
/// manifest location.
pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub manifest_path: PathBuf,
    pub jobs: Vec<BatchJobRecord>,
}

/// Analyze every stored partition in parallel and write
/// `batch_manifest.json` next to the results.
///
/// Finished partitions are skipped unless `force` is set, so an interrupted
/// batch can simply be run again. A failing job is recorded and the others
/// carry on.
pub fn run_batch<K: NodeKey>(config: &BatchRunnerConfig) -> Result<BatchSummary> {
    fs::create_dir_all(&config.results_dir).with_context(|| {
        format!(
            "creating results directory '{}'",
            config.results_dir.display()
        )
    })?;
    let partitions = FsArtifactStore::new(&config.partitions_dir);
    let results = FsArtifactStore::new(&config.results_dir);

    let jobs = jobs_from_store(&partitions, config.only.as_deref()).with_context(|| {
        format!(
            "discovering partitions in '{}'",
            config.partitions_dir.display()
        )
    })?;

    let created_at = Utc::now();
    let thread_count = if config.max_jobs == 0 {
        num_cpus::get()
    } else {
        config.max_jobs
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .thread_name(|i| format!("pam-batch-{i}"))
        .build()
        .context("building Rayon thread pool for batch runs")?;
    info!(jobs = jobs.len(), threads = thread_count, "starting batch");

    let runner = JobRunner::<K> {
        config,
        partitions: &partitions,
        results: &results,
        key: PhantomData,
    };
    let job_records: Vec<BatchJobRecord> =
        pool.install(|| jobs.par_iter().map(|job| runner.run(job)).collect());

    let count = |status: JobStatus| job_records.iter().filter(|r| r.status == status).count();
    let success = count(JobStatus::Ok);
    let failure = count(JobStatus::Error);
    let skipped = count(JobStatus::Skipped);

    let manifest = BatchManifest {
        created_at,
        finished_at: Some(Utc::now()),
        task: "analyze".to_string(),
        partitions_dir: config.partitions_dir.display().to_string(),
        results_dir: config.results_dir.display().to_string(),
        num_jobs: job_records.len(),
        success,
        failure,
        skipped,
        jobs: job_records.clone(),
    };
    let manifest_path = config.results_dir.join(MANIFEST_FILE);
    write_batch_manifest(&manifest_path, &manifest)?;
    info!(success, failure, skipped, manifest = %manifest_path.display(), "batch finished");

    Ok(BatchSummary {
        success,
        failure,
        skipped,
        manifest_path,
        jobs: job_records,
    })
}

struct JobRunner<'a, K> {
    config: &'a BatchRunnerConfig,
    partitions: &'a FsArtifactStore,
    results: &'a FsArtifactStore,
    key: PhantomData<fn() -> K>,
}

impl<K: NodeKey> JobRunner<'_, K> {
    fn run(&self, job: &BatchJob) -> BatchJobRecord {
        let started = Instant::now();
        let result_id = ArtifactId::result(job.partition_id);
        let output = self.results.path_of(result_id).display().to_string();
        let record = |status, error, node_count, degraded_stages| BatchJobRecord {
            job_id: job.job_id.clone(),
            partition_id: job.partition_id,
            status,
            error,
            output: output.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            node_count,
            degraded_stages,
        };

        if !self.config.force && self.results.contains(result_id).unwrap_or(false) {
            info!(job = %job.job_id, "result exists; skipping");
            return record(JobStatus::Skipped, None, None, Vec::new());
        }

        let worker = PartitionWorker::with_config(
            job.partition_id,
            self.config.profile,
            self.config.worker.clone(),
        );
        match worker.run::<K, _, _>(self.partitions, self.results) {
            Ok(result) => record(
                JobStatus::Ok,
                None,
                Some(result.metrics.node_count),
                result.metrics.degraded_stages,
            ),
            Err(err) => {
                warn!(job = %job.job_id, error = %err, "batch job failed");
                record(JobStatus::Error, Some(err.to_string()), None, Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::load_batch_manifest;
    use pam_core::{EdgeAttrs, KeyedGraph, PartitionResult};
    use pam_io::{load_result, save_partition};
    use tempfile::tempdir;

    fn ring(offset: u32, n: u32) -> KeyedGraph<u32> {
        let mut graph = KeyedGraph::new();
        for i in 0..n {
            graph.add_edge(offset + i, offset + (i + 1) % n, EdgeAttrs::default());
        }
        graph
    }

    fn setup() -> (tempfile::TempDir, BatchRunnerConfig) {
        let dir = tempdir().unwrap();
        let partitions = FsArtifactStore::new(dir.path().join("partitions"));
        save_partition(&partitions, 0, &ring(0, 6)).unwrap();
        save_partition(&partitions, 1, &ring(100, 8)).unwrap();
        let mut config =
            BatchRunnerConfig::new(dir.path().join("partitions"), dir.path().join("results"));
        config.profile = ResourceProfile::new(2, 4.0);
        config.max_jobs = 2;
        config.worker.layout_iterations = 5;
        (dir, config)
    }

    #[test]
    fn analyzes_every_partition_and_writes_manifest() {
        let (_dir, config) = setup();
        let summary = run_batch::<u32>(&config).unwrap();
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failure, 0);
        assert_eq!(summary.jobs[1].node_count, Some(8));

        let results = FsArtifactStore::new(&config.results_dir);
        let stored: PartitionResult<u32> = load_result(&results, 1).unwrap();
        assert_eq!(stored.communities.len(), 8);

        let manifest = load_batch_manifest(&summary.manifest_path).unwrap();
        assert_eq!(manifest.num_jobs, 2);
        assert_eq!(manifest.success, 2);
    }

    #[test]
    fn job_durations_fit_inside_the_batch() {
        let (_dir, config) = setup();
        let started = Instant::now();
        let summary = run_batch::<u32>(&config).unwrap();
        let wall_ms = started.elapsed().as_millis() as u64;
        assert!(summary.jobs.iter().all(|job| job.duration_ms <= wall_ms));
    }

    #[test]
    fn rerun_skips_finished_partitions_unless_forced() {
        let (_dir, mut config) = setup();
        run_batch::<u32>(&config).unwrap();

        let again = run_batch::<u32>(&config).unwrap();
        assert_eq!(again.skipped, 2);
        assert_eq!(again.success, 0);

        config.force = true;
        config.only = Some(vec![1]);
        let forced = run_batch::<u32>(&config).unwrap();
        assert_eq!(forced.success, 1);
        assert_eq!(forced.jobs.len(), 1);
    }

    #[test]
    fn corrupt_partition_fails_alone() {
        let (_dir, config) = setup();
        let partitions = FsArtifactStore::new(&config.partitions_dir);
        partitions.put(ArtifactId::partition(2), b"not gzip").unwrap();

        let summary = run_batch::<u32>(&config).unwrap();
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failure, 1);
        let failed = summary.jobs.iter().find(|j| j.partition_id == 2).unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert!(failed.error.as_deref().unwrap().contains("partition_00002.json.gz"));

        let manifest = load_batch_manifest(&summary.manifest_path).unwrap();
        assert_eq!(manifest.failed_partitions(), vec![2]);
    }

    #[test]
    fn missing_partition_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let config = BatchRunnerConfig::new(dir.path().join("absent"), dir.path().join("results"));
        let err = run_batch::<u32>(&config).err().unwrap();
        assert!(format!("{err:#}").contains("absent"));
    }
}
