//! # pam-io: artifacts and files for the partition–analyze–merge pipeline
//!
//! - [`store`] - [`ArtifactStore`] trait, naming convention, filesystem and
//!   in-memory stores
//! - [`codec`] - gzip + JSON byte format of artifacts
//! - [`artifacts`] - typed save/load of partitions and results
//! - [`files`] - node-link JSON graphs and summary files
//!
//! The filesystem is the only coordination channel between stages: a
//! partition artifact has one writer (the partitioner), a result artifact has
//! one writer (the worker for that partition), and any number of readers.

pub mod artifacts;
pub mod codec;
pub mod files;
pub mod store;

pub use artifacts::{
    load_all_results, load_partition, load_result, load_results_for, save_partition,
    save_result,
};
pub use files::{read_graph, read_json, write_graph, write_json};
pub use store::{
    ArtifactId, ArtifactKind, ArtifactStore, FsArtifactStore, MemoryArtifactStore,
    ARTIFACT_SUFFIX,
};
