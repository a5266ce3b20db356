//! In-memory [`MemorySource`] for tests and precomputed descriptions.

use std::collections::BTreeMap;

use super::{MemoryError, MemorySource};
use crate::topology::BankId;

/// Memory description held entirely in memory.
///
/// Starts out with NUMA support, no banks and no cgroup limit.
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    numa_support: bool,
    cgroup_limits: Vec<u64>,
    bank_sizes: BTreeMap<BankId, u64>,
    allowed_banks: Option<Vec<BankId>>,
}

impl Default for MemorySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            numa_support: true,
            cgroup_limits: Vec::new(),
            bank_sizes: BTreeMap::new(),
            allowed_banks: None,
        }
    }

    /// Adds a bank of `size` bytes.
    #[must_use]
    pub fn with_bank(mut self, bank: BankId, size: u64) -> Self {
        self.bank_sizes.insert(bank, size);
        self
    }

    /// Adds an effective cgroup memory limit in bytes.
    #[must_use]
    pub fn with_cgroup_limit(mut self, limit: u64) -> Self {
        self.cgroup_limits.push(limit);
        self
    }

    /// Restricts the banks runs may use. Defaults to every known bank.
    #[must_use]
    pub fn with_allowed_banks(mut self, banks: Vec<BankId>) -> Self {
        self.allowed_banks = Some(banks);
        self
    }

    /// Marks the platform as having no memory banks.
    #[must_use]
    pub fn without_numa_support(mut self) -> Self {
        self.numa_support = false;
        self
    }
}

impl MemorySource for MemorySnapshot {
    fn has_numa_support(&self) -> bool {
        self.numa_support
    }

    fn cgroup_memory_limits(&self) -> Result<Vec<u64>, MemoryError> {
        Ok(self.cgroup_limits.clone())
    }

    fn allowed_banks(&self) -> Result<Vec<BankId>, MemoryError> {
        Ok(self
            .allowed_banks
            .clone()
            .unwrap_or_else(|| self.bank_sizes.keys().copied().collect()))
    }

    fn bank_size(&self, bank: BankId) -> Result<u64, MemoryError> {
        self.bank_sizes
            .get(&bank)
            .copied()
            .ok_or(MemoryError::UnknownBank { bank })
    }
}
