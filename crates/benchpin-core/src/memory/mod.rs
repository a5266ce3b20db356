//! # Memory Checker
//!
//! Verifies that the memory a set of parallel runs asks for is actually
//! available: within the cgroup memory limit, on the memory banks each run
//! may use, and without several runs oversubscribing shared banks.
//!
//! ## Usage
//!
//! ```rust
//! use benchpin_core::memory::{check_memory, MemorySnapshot};
//!
//! const GIB: u64 = 1024 * 1024 * 1024;
//! let memory = MemorySnapshot::new().with_bank(0, 4 * GIB).with_bank(1, 4 * GIB);
//!
//! // Both runs share both banks: 6 GiB claimed out of 8 GiB.
//! check_memory(3 * GIB, 2, None, &memory)?;
//! # Ok::<(), benchpin_core::MemoryError>(())
//! ```

mod error;
mod snapshot;

pub use error::MemoryError;
pub use snapshot::MemorySnapshot;

use std::collections::btree_map::Entry as BTreeEntry;
use std::collections::hash_map::Entry;
use std::collections::BTreeMap;

use fxhash::FxHashMap;

use crate::allocator::Assignment;
use crate::topology::{BankId, CoreId, GroupKey, TopologySnapshot, NUMA};

/// Supplier of memory information.
///
/// Bank sizes are only requested for banks a check actually needs.
pub trait MemorySource {
    /// Returns true if the platform exposes memory banks at all.
    fn has_numa_support(&self) -> bool;

    /// Effective memory limits of the cgroup the runs will live in, in bytes.
    ///
    /// Empty if no memory controller is active.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ConfigurationRead`] if the limits cannot be read.
    fn cgroup_memory_limits(&self) -> Result<Vec<u64>, MemoryError>;

    /// Banks the runs are allowed to allocate from.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ConfigurationRead`] if the banks cannot be listed.
    fn allowed_banks(&self) -> Result<Vec<BankId>, MemoryError>;

    /// Size of one bank in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bank is unknown or its size cannot be read.
    fn bank_size(&self, bank: BankId) -> Result<u64, MemoryError>;
}

/// Checks whether `run_count` runs with `per_run` bytes each fit in memory.
///
/// Without an explicit `assignment` every run may use every allowed bank.
/// Runs with the same set of banks share that set's capacity; claiming
/// exactly the capacity is fine, exceeding it is not.
///
/// # Errors
///
/// Returns a [`MemoryError`] describing the first limit that is exceeded.
pub fn check_memory<S: MemorySource + ?Sized>(
    per_run: u64,
    run_count: usize,
    assignment: Option<&[Vec<BankId>]>,
    source: &S,
) -> Result<(), MemoryError> {
    if run_count == 0 {
        return Err(MemoryError::InvalidAssignment(
            "run_count must be > 0".to_string(),
        ));
    }

    if !source.has_numa_support() {
        tracing::debug!("System without NUMA support, ignoring memory assignment.");
        return Ok(());
    }

    let total = per_run.saturating_mul(run_count as u64);
    for limit in source.cgroup_memory_limits()? {
        if limit < per_run {
            return Err(MemoryError::CgroupLimitTooLowForRun { limit, per_run });
        }
        if limit < total {
            return Err(MemoryError::CgroupLimitTooLowForRuns {
                limit,
                run_count,
                per_run,
            });
        }
    }

    let shared;
    let assignment = match assignment {
        Some(assignment) if assignment.len() != run_count => {
            return Err(MemoryError::InvalidAssignment(format!(
                "{} bank sets given for {run_count} runs",
                assignment.len()
            )));
        }
        Some(assignment) => assignment,
        None => {
            shared = vec![source.allowed_banks()?; run_count];
            shared.as_slice()
        }
    };

    let mut sizes: FxHashMap<BankId, u64> = FxHashMap::default();
    let mut claimed: BTreeMap<Vec<BankId>, u64> = BTreeMap::new();
    for banks in assignment {
        let mut banks = banks.clone();
        banks.sort_unstable();
        banks.dedup();

        let mut available = 0u64;
        for &bank in &banks {
            let size = match sizes.entry(bank) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    let size = source.bank_size(bank)?;
                    tracing::debug!("Memory bank {bank} has size {size} bytes.");
                    *entry.insert(size)
                }
            };
            available = available.saturating_add(size);
        }

        if available < per_run {
            return Err(MemoryError::BanksTooSmallForRun {
                banks,
                available,
                required: per_run,
            });
        }

        let required = match claimed.entry(banks) {
            BTreeEntry::Occupied(mut entry) => {
                let required = entry.get().saturating_add(per_run);
                if required > available {
                    return Err(MemoryError::BanksOversubscribed {
                        banks: entry.key().clone(),
                        available,
                        required,
                    });
                }
                *entry.get_mut() = required;
                required
            }
            BTreeEntry::Vacant(entry) => *entry.insert(per_run),
        };
        tracing::trace!("{required} of {available} bytes claimed");
    }
    Ok(())
}

/// Derives each run's memory banks from the NUMA nodes of its cores.
///
/// Only banks in `allowed` (see [`MemorySource::allowed_banks`]) are kept.
/// Returns `None` if the topology has no NUMA information or if some run is
/// left without an allowed bank, in which case every run shares the allowed
/// banks.
#[must_use]
pub fn memory_banks_per_run(
    assignment: &Assignment,
    topology: &TopologySnapshot,
    allowed: &[BankId],
) -> Option<Vec<Vec<BankId>>> {
    let numa = topology.mapping(NUMA).filter(|m| !m.is_empty())?;
    let node_of: FxHashMap<CoreId, GroupKey> = numa
        .groups
        .iter()
        .flat_map(|(node, cores)| cores.iter().map(move |core| (*core, *node)))
        .collect();

    let mut per_run = Vec::with_capacity(assignment.len());
    for (run, cores) in assignment.iter().enumerate() {
        let mut banks: Vec<BankId> = cores
            .iter()
            .filter_map(|c| node_of.get(c).copied())
            .filter(|bank| allowed.contains(bank))
            .collect();
        banks.sort_unstable();
        banks.dedup();
        if banks.is_empty() {
            tracing::debug!(
                "Run {run} has no allowed memory bank near its cores, sharing allowed banks {allowed:?}."
            );
            return None;
        }
        per_run.push(banks);
    }
    Some(per_run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::GroupMapping;
    use std::cell::RefCell;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn two_banks() -> MemorySnapshot {
        MemorySnapshot::new()
            .with_bank(0, 4 * GIB)
            .with_bank(1, 4 * GIB)
    }

    #[test]
    fn test_shared_banks_within_capacity() {
        assert!(check_memory(3 * GIB, 2, None, &two_banks()).is_ok());
    }

    #[test]
    fn test_shared_banks_exactly_at_capacity() {
        assert!(check_memory(4 * GIB, 2, None, &two_banks()).is_ok());
    }

    #[test]
    fn test_shared_banks_oversubscribed() {
        assert_eq!(
            check_memory(3 * GIB, 3, None, &two_banks()),
            Err(MemoryError::BanksOversubscribed {
                banks: vec![0, 1],
                available: 8 * GIB,
                required: 9 * GIB
            })
        );
        assert!(matches!(
            check_memory(5 * GIB, 2, None, &two_banks()),
            Err(MemoryError::BanksOversubscribed { .. })
        ));
    }

    #[test]
    fn test_run_larger_than_its_banks() {
        let assignment = vec![vec![0], vec![1]];
        assert_eq!(
            check_memory(5 * GIB, 2, Some(&assignment), &two_banks()),
            Err(MemoryError::BanksTooSmallForRun {
                banks: vec![0],
                available: 4 * GIB,
                required: 5 * GIB
            })
        );
    }

    #[test]
    fn test_separate_banks_do_not_share_capacity() {
        let assignment = vec![vec![0], vec![1]];
        assert!(check_memory(4 * GIB, 2, Some(&assignment), &two_banks()).is_ok());
    }

    #[test]
    fn test_bank_order_does_not_matter() {
        let assignment = vec![vec![0, 1], vec![1, 0], vec![1, 0]];
        assert!(matches!(
            check_memory(3 * GIB, 3, Some(&assignment), &two_banks()),
            Err(MemoryError::BanksOversubscribed { .. })
        ));
    }

    #[test]
    fn test_allowed_banks_restrict_default_assignment() {
        let memory = two_banks().with_allowed_banks(vec![1]);
        assert!(matches!(
            check_memory(3 * GIB, 2, None, &memory),
            Err(MemoryError::BanksOversubscribed { banks, .. }) if banks == vec![1]
        ));
    }

    #[test]
    fn test_cgroup_limit_below_one_run() {
        let memory = two_banks().with_cgroup_limit(2 * GIB);
        assert_eq!(
            check_memory(3 * GIB, 1, None, &memory),
            Err(MemoryError::CgroupLimitTooLowForRun {
                limit: 2 * GIB,
                per_run: 3 * GIB
            })
        );
    }

    #[test]
    fn test_cgroup_limit_below_all_runs() {
        let memory = two_banks().with_cgroup_limit(5 * GIB);
        assert!(matches!(
            check_memory(3 * GIB, 2, None, &memory),
            Err(MemoryError::CgroupLimitTooLowForRuns { run_count: 2, .. })
        ));
    }

    #[test]
    fn test_no_numa_support_skips_checks() {
        let memory = MemorySnapshot::new()
            .with_cgroup_limit(1)
            .without_numa_support();
        assert!(check_memory(3 * GIB, 2, None, &memory).is_ok());
    }

    #[test]
    fn test_unknown_bank() {
        let assignment = vec![vec![7]];
        assert_eq!(
            check_memory(GIB, 1, Some(&assignment), &two_banks()),
            Err(MemoryError::UnknownBank { bank: 7 })
        );
    }

    #[test]
    fn test_assignment_length_mismatch() {
        let assignment = vec![vec![0]];
        assert!(matches!(
            check_memory(GIB, 2, Some(&assignment), &two_banks()),
            Err(MemoryError::InvalidAssignment(_))
        ));
    }

    struct CountingSource {
        inner: MemorySnapshot,
        lookups: RefCell<Vec<BankId>>,
    }

    impl MemorySource for CountingSource {
        fn has_numa_support(&self) -> bool {
            true
        }

        fn cgroup_memory_limits(&self) -> Result<Vec<u64>, MemoryError> {
            Ok(Vec::new())
        }

        fn allowed_banks(&self) -> Result<Vec<BankId>, MemoryError> {
            self.inner.allowed_banks()
        }

        fn bank_size(&self, bank: BankId) -> Result<u64, MemoryError> {
            self.lookups.borrow_mut().push(bank);
            self.inner.bank_size(bank)
        }
    }

    #[test]
    fn test_bank_sizes_read_once() {
        let source = CountingSource {
            inner: two_banks(),
            lookups: RefCell::new(Vec::new()),
        };
        check_memory(GIB, 4, None, &source).unwrap();
        assert_eq!(*source.lookups.borrow(), vec![0, 1]);
    }

    #[test]
    fn test_memory_banks_per_run() {
        let cores: Vec<CoreId> = (0..8).collect();
        let siblings = cores.iter().map(|&c| (c, vec![c])).collect();
        let topo = TopologySnapshot::new(cores.clone(), siblings)
            .with_mapping(GroupMapping::from_core_keys(NUMA, cores.iter().map(|&c| (c, c / 4))));
        let assignment = Assignment::from(vec![vec![0, 1], vec![3, 4], vec![6, 7]]);
        assert_eq!(
            memory_banks_per_run(&assignment, &topo, &[0, 1]),
            Some(vec![vec![0], vec![0, 1], vec![1]])
        );
    }

    #[test]
    fn test_memory_banks_per_run_keeps_only_allowed_banks() {
        let cores: Vec<CoreId> = (0..8).collect();
        let siblings = cores.iter().map(|&c| (c, vec![c])).collect();
        let topo = TopologySnapshot::new(cores.clone(), siblings)
            .with_mapping(GroupMapping::from_core_keys(NUMA, cores.iter().map(|&c| (c, c / 4))));

        let assignment = Assignment::from(vec![vec![3, 4], vec![5, 6]]);
        assert_eq!(
            memory_banks_per_run(&assignment, &topo, &[1]),
            Some(vec![vec![1], vec![1]])
        );

        // run 0 would only get bank 0
        let assignment = Assignment::from(vec![vec![0, 1], vec![6, 7]]);
        assert_eq!(memory_banks_per_run(&assignment, &topo, &[1]), None);
    }

    #[test]
    fn test_runs_without_allowed_bank_share_allowed_banks() {
        let cores: Vec<CoreId> = (0..2).collect();
        let siblings = cores.iter().map(|&c| (c, vec![c])).collect();
        let topo = TopologySnapshot::new(cores.clone(), siblings)
            .with_mapping(GroupMapping::from_core_keys(NUMA, cores.iter().map(|&c| (c, 0))));
        let memory = MemorySnapshot::new()
            .with_bank(0, 4 * GIB)
            .with_bank(1, 1024 * 1024)
            .with_allowed_banks(vec![1]);

        let assignment = Assignment::from(vec![vec![0, 1]]);
        let banks = memory_banks_per_run(&assignment, &topo, &memory.allowed_banks().unwrap());
        assert_eq!(banks, None);
        assert_eq!(
            check_memory(GIB, 1, banks.as_deref(), &memory),
            Err(MemoryError::BanksTooSmallForRun {
                banks: vec![1],
                available: 1024 * 1024,
                required: GIB
            })
        );
    }

    #[test]
    fn test_memory_banks_per_run_without_numa() {
        let topo = TopologySnapshot::new(vec![0], [(0, vec![0])].into_iter().collect())
            .with_mapping(GroupMapping::unavailable(NUMA));
        let assignment = Assignment::from(vec![vec![0]]);
        assert_eq!(memory_banks_per_run(&assignment, &topo, &[0]), None);
    }
}
