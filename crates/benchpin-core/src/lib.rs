//! # `benchpin` Core
//!
//! Assigns CPU cores and memory banks to a set of benchmark runs that execute
//! in parallel, so that every run gets an isolated, equally sized and
//! locality-preserving share of the machine.
//!
//! This crate provides:
//! - **Topology**: the in-memory description of usable cores, hyperthreading
//!   siblings and named groupings (NUMA nodes, packages)
//! - **Hierarchy**: the ordered levels built from that description
//! - **Allocator**: partitions cores into disjoint per-run sets
//! - **Memory**: checks that memory banks and cgroup limits suffice for all runs
//!
//! ## Design Principles
//!
//! 1. **Pure computation** - nothing here reads files or spawns processes
//! 2. **No partial results** - a request either succeeds entirely or fails
//!    with an error that names the offending quantity
//! 3. **Deterministic** - identical inputs always yield identical assignments
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use benchpin_core::allocator::{allocate, RunRequest};
//! use benchpin_core::topology::{GroupMapping, TopologySnapshot};
//!
//! let cores: Vec<usize> = (0..8).collect();
//! let siblings = cores.iter().map(|&c| (c, vec![c])).collect();
//! let package = GroupMapping::new("package", BTreeMap::from([(0, cores.clone())]));
//! let topology = TopologySnapshot::new(cores, siblings).with_mapping(package);
//!
//! let request = RunRequest::builder().cores_per_run(2).run_count(4).build()?;
//! let assignment = allocate(&request, &topology)?;
//! assert_eq!(assignment.len(), 4);
//! # Ok::<(), benchpin_core::Error>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocator;
pub mod hierarchy;
pub mod memory;
pub mod topology;

// Re-export key types
pub use allocator::{allocate, AllocationError, Assignment, RunRequest};
pub use hierarchy::Hierarchy;
pub use memory::{check_memory, MemoryError, MemorySource};
pub use topology::{TopologyError, TopologySnapshot};

/// Result type for benchpin-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for benchpin-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The supplied topology is inconsistent or the core selection is invalid
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// The core request cannot be satisfied on this machine
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    /// The memory request cannot be satisfied on this machine
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
}
