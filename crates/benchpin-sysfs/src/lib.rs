//! # `benchpin` sysfs Supplier
//!
//! Reads the machine topology and memory layout from Linux sysfs and the
//! cgroup filesystem and hands them to `benchpin-core` as plain data.
//!
//! ## Sources
//!
//! ```text
//! <sys_root>/devices/system/cpu/online                        usable cores (no cpuset)
//! <sys_root>/devices/system/cpu/cpuN/topology/thread_siblings_list
//! <sys_root>/devices/system/cpu/cpuN/topology/physical_package_id
//! <sys_root>/devices/system/cpu/cpuN/nodeM                    NUMA node of core N
//! <sys_root>/devices/system/node/nodeM/meminfo                size of bank M
//! <cpuset cgroup>/cpuset.cpus[.effective], cpuset.mems[.effective]
//! <memory cgroup>/memory.stat (v1), memory.max (v2)
//! ```
//!
//! All paths are resolved against [`SysfsConfig::sys_root`], so tests run
//! against a fixture tree instead of the live system.
//!
//! ## Example
//!
//! ```rust,no_run
//! use benchpin_sysfs::{SysfsConfig, SysfsTopology};
//!
//! let topology = SysfsTopology::new(SysfsConfig::default()).snapshot(None)?;
//! println!("{} usable cores", topology.usable_cores().len());
//! # Ok::<(), benchpin_sysfs::SysfsError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod memory;
mod parse;
mod topology;

pub use config::SysfsConfig;
pub use error::{IntListError, SysfsError};
pub use memory::SysfsMemory;
pub use parse::parse_int_list;
pub use topology::SysfsTopology;

/// Result type for sysfs operations
pub type Result<T> = std::result::Result<T, SysfsError>;
