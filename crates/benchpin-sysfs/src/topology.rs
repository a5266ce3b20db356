//! # Topology Supplier
//!
//! Builds a [`TopologySnapshot`] from sysfs: the usable cores, their
//! hyperthreading siblings, and the NUMA node and physical package of each
//! core.

use std::collections::BTreeMap;

use benchpin_core::topology::{CoreId, GroupMapping, TopologySnapshot, NUMA, PACKAGE};

use crate::config::SysfsConfig;
use crate::error::SysfsError;
use crate::parse::{memory_banks_listed_in, parse_list_file, read_int_list, read_number, read_optional};

/// Reads the machine topology.
#[derive(Debug, Clone)]
pub struct SysfsTopology {
    config: SysfsConfig,
}

impl SysfsTopology {
    /// Creates a supplier for the given locations.
    #[must_use]
    pub fn new(config: SysfsConfig) -> Self {
        Self { config }
    }

    /// Returns the cores runs may be placed on, ascending.
    ///
    /// With a cpuset cgroup these are its effective cores; otherwise all
    /// online cores. If the kernel does not report online cores, every core
    /// `num_cpus` counts is assumed usable.
    ///
    /// # Errors
    ///
    /// Returns [`SysfsError`] if a file exists but cannot be read or parsed.
    pub fn usable_cores(&self) -> Result<Vec<CoreId>, SysfsError> {
        let mut cores = if let Some(cpuset) = self.config.cpuset_dir() {
            let effective = cpuset.join("cpuset.cpus.effective");
            match read_optional(&effective)? {
                Some(contents) => parse_list_file(&effective, &contents)?,
                None => read_int_list(&cpuset.join("cpuset.cpus"))?,
            }
        } else {
            let online = self.config.cpu_dir().join("online");
            match read_optional(&online)? {
                Some(contents) => parse_list_file(&online, &contents)?,
                None => {
                    let count = num_cpus::get();
                    tracing::warn!("{} not found, assuming {count} CPU cores", online.display());
                    (0..count).collect()
                }
            }
        };
        cores.sort_unstable();
        cores.dedup();
        Ok(cores)
    }

    /// Reads the full topology, optionally restricted to `core_subset`.
    ///
    /// # Errors
    ///
    /// Returns [`SysfsError::Topology`] if `core_subset` names cores that
    /// are not usable, and other [`SysfsError`] variants for unreadable
    /// sysfs files.
    pub fn snapshot(&self, core_subset: Option<&[CoreId]>) -> Result<TopologySnapshot, SysfsError> {
        let mut cores = self.usable_cores()?;
        if let Some(subset) = core_subset {
            // Validate against the full usable set before touching per-core files.
            cores = TopologySnapshot::new(cores, BTreeMap::new())
                .restrict_to(subset)?
                .usable_cores()
                .to_vec();
        } else {
            tracing::debug!("List of available CPU cores is {cores:?}");
        }

        let cpu_dir = self.config.cpu_dir();
        let mut siblings = BTreeMap::new();
        let mut packages = Vec::with_capacity(cores.len());
        for &core in &cores {
            let topology = cpu_dir.join(format!("cpu{core}/topology"));
            siblings.insert(core, read_int_list(&topology.join("thread_siblings_list"))?);
            let path = topology.join("physical_package_id");
            let package = usize::try_from(read_number(&path)?).map_err(|err| SysfsError::Parse {
                path,
                message: err.to_string(),
            })?;
            packages.push((core, package));
        }
        tracing::debug!("Siblings of cores are {siblings:?}");
        tracing::debug!("Physical packages of cores are {packages:?}");

        let numa = self.numa_mapping(&cores)?;
        Ok(TopologySnapshot::new(cores, siblings)
            .with_mapping(numa)
            .with_mapping(GroupMapping::from_core_keys(PACKAGE, packages)))
    }

    /// Maps each core to the NUMA node listed in its cpu directory.
    ///
    /// If any core has no node, the whole mapping is left empty.
    fn numa_mapping(&self, cores: &[CoreId]) -> Result<GroupMapping, SysfsError> {
        let cpu_dir = self.config.cpu_dir();
        let mut nodes = Vec::with_capacity(cores.len());
        for &core in cores {
            let banks = memory_banks_listed_in(&cpu_dir.join(format!("cpu{core}")))?;
            let Some(&node) = banks.first() else {
                tracing::warn!("Kernel does not have NUMA support. Use benchpin at your own risk.");
                return Ok(GroupMapping::unavailable(NUMA));
            };
            nodes.push((core, node));
        }
        tracing::debug!("Memory regions of cores are {nodes:?}");
        Ok(GroupMapping::from_core_keys(NUMA, nodes))
    }
}
