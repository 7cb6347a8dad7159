use anyhow::{Context, Result};
use pam_io::{ArtifactKind, ArtifactStore};
use serde::{Deserialize, Serialize};

/// Outcome of one analysis job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ok,
    /// A result artifact already existed and `force` was not set.
    Skipped,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Ok => "ok",
            JobStatus::Skipped => "skipped",
            JobStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub job_id: String,
    pub partition_id: usize,
}

impl BatchJob {
    pub fn new(partition_id: usize) -> Self {
        Self {
            job_id: format!("analyze:{partition_id:05}"),
            partition_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchJobRecord {
    pub job_id: String,
    pub partition_id: usize,
    pub status: JobStatus,
    pub error: Option<String>,
    pub output: String,
    pub duration_ms: u64,
    pub node_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_stages: Vec<String>,
}

/// One job per stored partition, in ascending partition order. `only`
/// restricts the batch to the listed ids.
pub fn jobs_from_store<S>(store: &S, only: Option<&[usize]>) -> Result<Vec<BatchJob>>
where
    S: ArtifactStore + ?Sized,
{
    let ids = store
        .list_ids(ArtifactKind::Partition)
        .context("listing partition artifacts")?;
    Ok(ids
        .into_iter()
        .filter(|id| only.map_or(true, |wanted| wanted.contains(id)))
        .map(BatchJob::new)
        .collect())
}
