//! # pam-algo: partition, analyze, merge
//!
//! Algorithms behind the three pipeline stages:
//!
//! | Stage | Entry point | Output |
//! |-------|-------------|--------|
//! | Partition | [`Partitioner`] | node-disjoint induced subgraphs |
//! | Analyze | [`PartitionWorker`] | one [`PartitionResult`](pam_core::PartitionResult) per partition |
//! | Merge | [`ResultsMerger`] | [`MergedResult`](pam_core::MergedResult), original graph annotated |
//!
//! Stages only talk through artifacts (see `pam-io`), so each one can run in
//! a different process or on a different machine.
//!
//! ## Building blocks
//!
//! - [`community`]: Louvain modularity optimization behind the
//!   [`CommunityDetector`] seam
//! - [`centrality`]: Brandes betweenness, exact or source-sampled
//! - [`deadline`]: cooperative time budgets for analysis stages
//!
//! ## Example
//!
//! ```ignore
//! use pam_algo::{Partitioner, PartitionWorker, ResultsMerger};
//! use pam_core::ResourceProfile;
//! use pam_io::MemoryArtifactStore;
//!
//! let profile = ResourceProfile::detect();
//! let store = MemoryArtifactStore::new();
//!
//! let partitioner = Partitioner::new(profile);
//! let k = partitioner.calculate_partition_count(graph.node_count());
//! for (id, part) in partitioner.partition(&graph, k).iter().enumerate() {
//!     partitioner.save(part, id, &store)?;
//!     PartitionWorker::new(id, profile).run::<NodeId, _, _>(&store, &store)?;
//! }
//!
//! let merger = ResultsMerger::new();
//! let results = merger.load_all(&store)?;
//! let merged = merger.merge_all(&results, &mut graph)?;
//! ```

pub mod centrality;
pub mod community;
pub mod deadline;
pub mod graph;
pub mod merge;
pub mod worker;

pub use centrality::{betweenness, Betweenness, SourceSelection};
pub use community::{CommunityDetector, Louvain};
pub use deadline::{Deadline, StageError};
pub use graph::{
    MinCutPartitioner, PartitionError, PartitionStrategy, Partitioner, PartitionerConfig,
    SpectralBisection,
};
pub use merge::{MergeConfig, ResultsMerger};
pub use worker::{PartitionWorker, Stage, WorkerConfig};
