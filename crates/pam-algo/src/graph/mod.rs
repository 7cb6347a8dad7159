//! Graph partitioning for the partition–analyze–merge pipeline.
//!
//! The [`partition`] module splits a graph that is too large to analyze as a
//! whole into node-disjoint induced subgraphs sized from the host's
//! [`ResourceProfile`](pam_core::ResourceProfile). Partitions are designed
//! to:
//! - Cover every node exactly once
//! - Stay near the memory-derived target size
//! - Cut few edges when a min-cut partitioner succeeds
//!
//! ```ignore
//! use pam_algo::graph::{Partitioner, PartitionerConfig, PartitionStrategy};
//!
//! let config = PartitionerConfig { strategy: PartitionStrategy::Community, ..Default::default() };
//! let partitioner = Partitioner::with_config(profile, config);
//! let parts = partitioner.partition(&graph, 4);
//!
//! for (id, p) in parts.iter().enumerate() {
//!     println!("Partition {}: {} nodes, {} edges", id, p.node_count(), p.edge_count());
//! }
//! ```

pub mod partition;

pub use partition::{
    edge_cut, reconcile, MinCutPartitioner, PartitionError, PartitionStrategy, Partitioner,
    PartitionerConfig, SpectralBisection,
};
