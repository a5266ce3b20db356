//! Memory information from sysfs and the memory cgroup.

use benchpin_core::memory::{MemoryError, MemorySource};
use benchpin_core::topology::BankId;

use crate::config::SysfsConfig;
use crate::error::SysfsError;
use crate::parse::{
    memory_banks_listed_in, parse_list_file, parse_mem_total, read_int_list, read_optional,
};

/// [`MemorySource`] backed by the live system (or a fixture tree).
#[derive(Debug, Clone)]
pub struct SysfsMemory {
    config: SysfsConfig,
}

impl SysfsMemory {
    /// Creates a source for the given locations.
    #[must_use]
    pub fn new(config: SysfsConfig) -> Self {
        Self { config }
    }

    /// Reads the effective limits of the memory cgroup.
    ///
    /// cgroup v1 reports the hierarchical limits in `memory.stat`. cgroup v2
    /// only has the local `memory.max`, so the smallest one found on the way
    /// up to the root cgroup is used.
    fn read_limits(&self) -> Result<Vec<u64>, SysfsError> {
        let Some(dir) = self.config.memory_dir() else {
            return Ok(Vec::new());
        };

        // cgroup v1: the hierarchical limits may be lower than memory.limit_in_bytes
        let stat = dir.join("memory.stat");
        if let Some(contents) = read_optional(&stat)? {
            let mut limits = Vec::new();
            for line in contents.lines() {
                let Some((key, value)) = line.split_once(' ') else {
                    continue;
                };
                if key == "hierarchical_memory_limit" || key == "hierarchical_memsw_limit" {
                    let limit = value.trim().parse().map_err(|_| SysfsError::Parse {
                        path: stat.clone(),
                        message: format!("'{value}' is not a memory limit"),
                    })?;
                    limits.push(limit);
                }
            }
            return Ok(limits);
        }

        // cgroup v2: every ancestor's memory.max bounds the runs as well.
        // The walk ends at the first directory without one (the root cgroup).
        let mut lowest: Option<u64> = None;
        let mut found = false;
        for cgroup in dir.ancestors() {
            let max = cgroup.join("memory.max");
            let Some(contents) = read_optional(&max)? else {
                break;
            };
            found = true;
            if contents == "max" {
                continue;
            }
            let limit: u64 = contents.parse().map_err(|_| SysfsError::Parse {
                path: max.clone(),
                message: format!("'{contents}' is not a memory limit"),
            })?;
            lowest = Some(lowest.map_or(limit, |lowest| lowest.min(limit)));
        }
        if !found {
            tracing::debug!("No memory limit found in {}", dir.display());
        }
        Ok(lowest.into_iter().collect())
    }

    fn read_allowed_banks(&self) -> Result<Vec<BankId>, SysfsError> {
        let Some(cpuset) = self.config.cpuset_dir() else {
            return memory_banks_listed_in(&self.config.node_dir());
        };
        let effective = cpuset.join("cpuset.mems.effective");
        let mut banks = match read_optional(&effective)? {
            Some(contents) => parse_list_file(&effective, &contents)?,
            None => read_int_list(&cpuset.join("cpuset.mems"))?,
        };
        banks.sort_unstable();
        banks.dedup();
        Ok(banks)
    }
}

impl MemorySource for SysfsMemory {
    fn has_numa_support(&self) -> bool {
        self.config.node_dir().is_dir()
    }

    fn cgroup_memory_limits(&self) -> Result<Vec<u64>, MemoryError> {
        let limits = self.read_limits()?;
        tracing::debug!("Cgroup memory limits: {limits:?}");
        Ok(limits)
    }

    fn allowed_banks(&self) -> Result<Vec<BankId>, MemoryError> {
        let banks = self.read_allowed_banks()?;
        tracing::debug!("Allowed memory banks: {banks:?}");
        Ok(banks)
    }

    fn bank_size(&self, bank: BankId) -> Result<u64, MemoryError> {
        let path = self.config.node_dir().join(format!("node{bank}/meminfo"));
        let contents = read_optional(&path)?.ok_or(MemoryError::UnknownBank { bank })?;
        Ok(parse_mem_total(&path, &contents)?)
    }
}
