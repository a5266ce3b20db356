//! Where the supplier looks for its files.

use std::path::{Path, PathBuf};

/// Locations of sysfs and of the cgroups the runs will be placed in.
///
/// Relative cgroup paths are resolved against `sys_root`; absolute ones are
/// used as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsConfig {
    /// Mount point of sysfs
    pub sys_root: PathBuf,
    /// Directory of the cpuset cgroup, if the cpuset controller is used
    pub cgroup_cpuset: Option<PathBuf>,
    /// Directory of the memory cgroup, if the memory controller is used
    pub cgroup_memory: Option<PathBuf>,
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            sys_root: PathBuf::from("/sys"),
            cgroup_cpuset: None,
            cgroup_memory: None,
        }
    }
}

impl SysfsConfig {
    /// Sets the sysfs mount point.
    #[must_use]
    pub fn with_sys_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.sys_root = path.into();
        self
    }

    /// Sets the cpuset cgroup directory.
    #[must_use]
    pub fn with_cgroup_cpuset(mut self, path: impl Into<PathBuf>) -> Self {
        self.cgroup_cpuset = Some(path.into());
        self
    }

    /// Sets the memory cgroup directory.
    #[must_use]
    pub fn with_cgroup_memory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cgroup_memory = Some(path.into());
        self
    }

    pub(crate) fn cpu_dir(&self) -> PathBuf {
        self.sys_root.join("devices/system/cpu")
    }

    pub(crate) fn node_dir(&self) -> PathBuf {
        self.sys_root.join("devices/system/node")
    }

    pub(crate) fn cpuset_dir(&self) -> Option<PathBuf> {
        self.cgroup_cpuset.as_deref().map(|p| self.resolve(p))
    }

    pub(crate) fn memory_dir(&self) -> Option<PathBuf> {
        self.cgroup_memory.as_deref().map(|p| self.resolve(p))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        // `join` keeps absolute paths unchanged.
        self.sys_root.join(path)
    }
}
