pub mod job;
pub mod manifest;
pub mod runner;

pub use job::{jobs_from_store, BatchJob, BatchJobRecord, JobStatus};
pub use manifest::{load_batch_manifest, write_batch_manifest, BatchManifest, MANIFEST_FILE};
pub use runner::{run_batch, BatchRunnerConfig, BatchSummary};
