use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::job::{BatchJobRecord, JobStatus};

pub const MANIFEST_FILE: &str = "batch_manifest.json";

/// Record of one batch run, written next to the result artifacts.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchManifest {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub task: String,
    pub partitions_dir: String,
    pub results_dir: String,
    pub num_jobs: usize,
    pub success: usize,
    pub failure: usize,
    #[serde(default)]
    pub skipped: usize,
    pub jobs: Vec<BatchJobRecord>,
}

impl BatchManifest {
    /// Partition ids whose job ended in an error.
    pub fn failed_partitions(&self) -> Vec<usize> {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Error)
            .map(|job| job.partition_id)
            .collect()
    }
}

/// Write the manifest through a temporary file so an interrupted run never
/// leaves a truncated manifest behind.
pub fn write_batch_manifest(path: &Path, manifest: &BatchManifest) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating manifest directory '{}'", dir.display()))?;
    }
    let bytes = serde_json::to_vec_pretty(manifest).context("encoding batch manifest")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).with_context(|| format!("writing '{}'", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("replacing batch manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_batch_manifest(path: &Path) -> Result<BatchManifest> {
    let bytes =
        fs::read(path).with_context(|| format!("reading batch manifest '{}'", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("decoding batch manifest '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(partition_id: usize, status: JobStatus) -> BatchJobRecord {
        BatchJobRecord {
            job_id: format!("analyze:{partition_id:05}"),
            partition_id,
            status,
            error: None,
            output: format!("results/result_{partition_id:05}.json.gz"),
            duration_ms: 12,
            node_count: Some(40),
            degraded_stages: vec!["layout".into()],
        }
    }

    #[test]
    fn manifest_round_trips_through_disk() {
        let jobs = vec![record(0, JobStatus::Ok), record(1, JobStatus::Error)];
        let manifest = BatchManifest {
            created_at: Utc::now(),
            finished_at: Some(Utc::now()),
            task: "analyze".into(),
            partitions_dir: "partitions".into(),
            results_dir: "results".into(),
            num_jobs: 2,
            success: 1,
            failure: 1,
            skipped: 0,
            jobs: jobs.clone(),
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(MANIFEST_FILE);
        write_batch_manifest(&path, &manifest).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let parsed = load_batch_manifest(&path).unwrap();
        assert_eq!(parsed.results_dir, "results");
        assert_eq!(parsed.jobs, jobs);
        assert_eq!(parsed.failed_partitions(), vec![1]);
    }

    #[test]
    fn missing_manifest_names_the_path() {
        let err = load_batch_manifest(Path::new("/nonexistent/batch_manifest.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/batch_manifest.json"));
    }
}
