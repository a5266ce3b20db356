//! # Machine Topology
//!
//! Data model for what the topology supplier discovered: the usable cores,
//! which logical cores share a physical core, and any number of named
//! groupings of cores.
//!
//! ```text
//! ┌───────────────────────── package 0 ─────────────────────────┐
//! │  ┌────────── numa 0 ──────────┐  ┌────────── numa 1 ──────────┐
//! │  │  [0,8]  [1,9]  [2,10] ...  │  │  [4,12] [5,13] [6,14] ...  │
//! │  └────────────────────────────┘  └────────────────────────────┘
//! └─────────────────────────────────────────────────────────────┘
//!        [a,b] = hyperthreading siblings sharing one physical core
//! ```
//!
//! ## Components
//!
//! - [`TopologySnapshot`] - usable cores, sibling relation and groupings
//! - [`GroupMapping`] - one named grouping such as "numa" or "package"
//! - [`TopologyError`] - inconsistent supplier data

mod error;
mod snapshot;

pub use error::TopologyError;
pub(crate) use error::join_ids;
pub use snapshot::{GroupMapping, TopologySnapshot};

/// Identifier of a logical CPU core.
pub type CoreId = usize;

/// Identifier of a group within one hierarchy level.
pub type GroupKey = usize;

/// Identifier of a memory bank (NUMA node).
pub type BankId = usize;

/// Name of the NUMA grouping.
pub const NUMA: &str = "numa";

/// Name of the physical package grouping.
pub const PACKAGE: &str = "package";

/// Name of the hyperthreading sibling level.
pub const SIBLINGS: &str = "siblings";
