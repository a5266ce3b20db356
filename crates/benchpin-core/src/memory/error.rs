//! # Memory Error Types

use crate::topology::{join_ids, BankId};

/// Errors raised by the memory check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// Memory information could not be read from the platform
    #[error("Could not read memory information from kernel: {0}")]
    ConfigurationRead(String),

    /// The memory assignment does not match the request
    #[error("Invalid memory assignment: {0}")]
    InvalidAssignment(String),

    /// A bank referenced by the assignment does not exist
    #[error("Memory bank {bank} does not exist")]
    UnknownBank {
        /// The unknown bank
        bank: BankId,
    },

    /// The cgroup limit is below what one run needs
    #[error(
        "Cgroups allow only {limit} bytes of memory to be used, \
         cannot execute runs with {per_run} bytes of memory."
    )]
    CgroupLimitTooLowForRun {
        /// Effective cgroup limit in bytes
        limit: u64,
        /// Memory per run in bytes
        per_run: u64,
    },

    /// The cgroup limit is below what all runs need together
    #[error(
        "Cgroups allow only {limit} bytes of memory to be used, not enough for {run_count} \
         benchmarks with {per_run} bytes each. Please reduce the number of threads."
    )]
    CgroupLimitTooLowForRuns {
        /// Effective cgroup limit in bytes
        limit: u64,
        /// Requested parallel runs
        run_count: usize,
        /// Memory per run in bytes
        per_run: u64,
    },

    /// The banks of one run are too small for that run
    #[error(
        "Memory banks [{}] do not have enough memory for one run, only {available} bytes \
         available, {required} bytes required.",
        join_ids(.banks)
    )]
    BanksTooSmallForRun {
        /// Banks assigned to the run
        banks: Vec<BankId>,
        /// Total size of those banks
        available: u64,
        /// Memory per run in bytes
        required: u64,
    },

    /// Several runs share banks that cannot hold all of them
    #[error(
        "Memory banks [{}] do not have enough memory for all runs, only {available} bytes \
         available, {required} bytes required. Please reduce the number of threads.",
        join_ids(.banks)
    )]
    BanksOversubscribed {
        /// The shared banks
        banks: Vec<BankId>,
        /// Total size of those banks
        available: u64,
        /// Memory claimed on them so far
        required: u64,
    },
}
