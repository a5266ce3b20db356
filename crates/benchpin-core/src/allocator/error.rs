//! # Allocation Error Types

use crate::topology::{join_ids, CoreId};

/// Errors that can occur while assigning cores to runs.
///
/// Apart from [`InvalidRequest`](Self::InvalidRequest) and
/// [`AsymmetricTopology`](Self::AsymmetricTopology), every variant means the
/// request is infeasible on this machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Not enough cores for even a single run
    #[error(
        "Cannot run benchmarks with {cores_per_run} CPU cores, only {available} CPU cores available."
    )]
    NotEnoughCoresForRun {
        /// Cores requested per run
        cores_per_run: usize,
        /// Usable cores
        available: usize,
    },

    /// Not enough cores for all runs together
    #[error(
        "Cannot run {run_count} benchmarks in parallel with {cores_per_run} CPU cores each \
         ({required} CPU cores required), only {available} CPU cores available. \
         Please reduce the number of threads to {max_runs}."
    )]
    NotEnoughCoresForRuns {
        /// Requested parallel runs
        run_count: usize,
        /// Cores requested per run
        cores_per_run: usize,
        /// Cores needed by all runs together
        required: usize,
        /// Usable cores
        available: usize,
        /// Largest run count that would fit
        max_runs: usize,
    },

    /// A physical core is only partially usable
    #[error(
        "Core assignment is unsupported because siblings {} of core {core} are not usable. \
         Please always make all virtual cores of a physical core available.",
        join_ids(.missing)
    )]
    SplitPhysicalCore {
        /// Representative of the sibling group
        core: CoreId,
        /// Siblings that are not usable
        missing: Vec<CoreId>,
    },

    /// Groups of one hierarchy level differ in size
    #[error(
        "Asymmetric machine architecture not supported: \
         groups of hierarchy level '{level}' have different numbers of cores ({sizes:?})."
    )]
    AsymmetricTopology {
        /// Name of the offending level
        level: String,
        /// Distinct group sizes found, ascending
        sizes: Vec<usize>,
    },

    /// No hierarchy unit can hold one run
    #[error(
        "Cannot assign {cores_per_run} CPU cores to one run: \
         the largest hierarchy unit has only {largest_unit} CPU cores."
    )]
    NoUnitLargeEnough {
        /// Cores per run rounded up to whole physical cores
        cores_per_run: usize,
        /// Size of the largest unit
        largest_unit: usize,
    },

    /// Too few units at the chosen level
    #[error(
        "Cannot run {run_count} benchmarks in parallel: hierarchy level '{level}' \
         fits only {max_runs} runs. Please reduce the number of threads to {max_runs}."
    )]
    NotEnoughUnits {
        /// Requested parallel runs
        run_count: usize,
        /// Name of the chosen level
        level: String,
        /// Runs the level can hold
        max_runs: usize,
    },

    /// Too few sub-units to keep memory regions separate
    #[error(
        "Cannot split memory regions between runs: hierarchy level '{level}' allows only \
         {max_runs} runs. Please reduce the number of threads to {max_runs}."
    )]
    CannotSplitMemoryRegions {
        /// Name of the sub-unit level
        level: String,
        /// Runs the sub-units can hold
        max_runs: usize,
    },

    /// No cores were left to start a run
    #[error("Cannot complete run {run}: no CPU cores left.")]
    CoresExhausted {
        /// Index of the run that could not be started
        run: usize,
    },

    /// A unit ran out of cores in the middle of a run
    #[error(
        "Cannot complete run {run}: unit {unit} of hierarchy level '{level}' ran out of CPU cores."
    )]
    UnitExhausted {
        /// Index of the incomplete run
        run: usize,
        /// Name of the chosen level
        level: String,
        /// Key of the exhausted unit
        unit: usize,
    },
}

impl AllocationError {
    /// Returns true if the request cannot be satisfied on this machine.
    #[must_use]
    pub fn is_infeasible(&self) -> bool {
        !matches!(
            self,
            Self::InvalidRequest(_) | Self::AsymmetricTopology { .. }
        )
    }
}
