//! Resource snapshot used for partition sizing and worker pools.
//!
//! Detection happens once, in [`ResourceProfile::detect`]; everything else
//! takes the profile by reference so tests can inject constrained or roomy
//! machines without touching the host.

use serde::{Deserialize, Serialize};
use sysinfo::{RefreshKind, System, SystemExt};
use tracing::debug;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Partition sizes by available memory: roomy runners take bigger partitions.
const LARGE_RAM_GB: f64 = 7.0;
const MEDIUM_RAM_GB: f64 = 4.0;
const LARGE_PARTITION_NODES: usize = 50_000;
const MEDIUM_PARTITION_NODES: usize = 30_000;
const SMALL_PARTITION_NODES: usize = 10_000;

/// Nodes handled per pool thread inside a single partition analysis.
pub const NODES_PER_WORKER: usize = 1_000;

/// Detected CPU and memory capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceProfile {
    pub cpu_cores: usize,
    pub available_ram_gb: f64,
}

impl ResourceProfile {
    pub fn new(cpu_cores: usize, available_ram_gb: f64) -> Self {
        Self {
            cpu_cores: cpu_cores.max(1),
            available_ram_gb,
        }
    }

    /// Probe the host. Falls back to total memory when the platform does not
    /// report available memory.
    pub fn detect() -> Self {
        let cpu_cores = num_cpus::get().max(1);
        let mut system = System::new_with_specifics(RefreshKind::new().with_memory());
        system.refresh_memory();
        let mut bytes = system.available_memory();
        if bytes == 0 {
            bytes = system.total_memory();
        }
        let profile = Self::new(cpu_cores, bytes as f64 / BYTES_PER_GB);
        debug!(
            cpu_cores = profile.cpu_cores,
            available_ram_gb = profile.available_ram_gb,
            "detected resources"
        );
        profile
    }

    /// Nodes per partition that keeps peak per-worker memory bounded.
    pub fn target_partition_size(&self) -> usize {
        if self.available_ram_gb >= LARGE_RAM_GB {
            LARGE_PARTITION_NODES
        } else if self.available_ram_gb >= MEDIUM_RAM_GB {
            MEDIUM_PARTITION_NODES
        } else {
            SMALL_PARTITION_NODES
        }
    }

    /// Pool size for analyzing a partition of `node_count` nodes:
    /// `min(cpu_cores, ceil(node_count / NODES_PER_WORKER))`, at least one.
    pub fn worker_threads(&self, node_count: usize) -> usize {
        node_count
            .div_ceil(NODES_PER_WORKER)
            .clamp(1, self.cpu_cores.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_size_follows_ram_tiers() {
        assert_eq!(ResourceProfile::new(4, 16.0).target_partition_size(), 50_000);
        assert_eq!(ResourceProfile::new(4, 7.0).target_partition_size(), 50_000);
        assert_eq!(ResourceProfile::new(4, 6.9).target_partition_size(), 30_000);
        assert_eq!(ResourceProfile::new(4, 4.0).target_partition_size(), 30_000);
        assert_eq!(ResourceProfile::new(4, 1.5).target_partition_size(), 10_000);
    }

    #[test]
    fn worker_threads_bounded_by_cores_and_size() {
        let profile = ResourceProfile::new(8, 8.0);
        assert_eq!(profile.worker_threads(0), 1);
        assert_eq!(profile.worker_threads(999), 1);
        assert_eq!(profile.worker_threads(2_500), 3);
        assert_eq!(profile.worker_threads(1_000_000), 8);
    }

    #[test]
    fn zero_cores_is_clamped() {
        assert_eq!(ResourceProfile::new(0, 1.0).cpu_cores, 1);
    }

    #[test]
    fn detect_reports_at_least_one_core() {
        let profile = ResourceProfile::detect();
        assert!(profile.cpu_cores >= 1);
        assert!(profile.available_ram_gb >= 0.0);
    }
}
