//! # Topology Error Types
//!
//! Errors raised while validating supplier data and building the hierarchy.

use super::CoreId;

/// Errors describing inconsistent or unusable topology data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// The caller asked for cores that are not available
    #[error("The following provided CPU cores are not available: {}", join_ids(.cores))]
    InvalidCoreSelection {
        /// Unavailable cores, ascending
        cores: Vec<CoreId>,
    },

    /// No core is usable at all
    #[error("No usable CPU cores found")]
    NoUsableCores,

    /// A usable core has no group at some hierarchy level
    #[error("CPU core {core} has no group at hierarchy level '{level}'")]
    MissingGroup {
        /// The core without a group
        core: CoreId,
        /// Name of the level
        level: String,
    },

    /// A core is listed in more than one group of the same level
    #[error("CPU core {core} is listed in several groups of hierarchy level '{level}'")]
    DuplicateCore {
        /// The duplicated core
        core: CoreId,
        /// Name of the level
        level: String,
    },

    /// The sibling relation is not symmetric
    #[error(
        "Siblings of CPU core {core} are inconsistent: core reports [{}], group has [{}]",
        join_ids(.reported),
        join_ids(.expected)
    )]
    InconsistentSiblings {
        /// The core whose sibling list disagrees
        core: CoreId,
        /// Siblings reported for this core
        reported: Vec<CoreId>,
        /// Siblings of the group the core was placed in
        expected: Vec<CoreId>,
    },
}

/// Formats core or bank ids as `0, 1, 2`.
pub(crate) fn join_ids(ids: &[usize]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_selection_display() {
        let err = TopologyError::InvalidCoreSelection { cores: vec![3, 7] };
        assert_eq!(
            err.to_string(),
            "The following provided CPU cores are not available: 3, 7"
        );
    }

    #[test]
    fn test_inconsistent_siblings_display() {
        let err = TopologyError::InconsistentSiblings {
            core: 1,
            reported: vec![1, 2],
            expected: vec![0, 1],
        };
        assert_eq!(
            err.to_string(),
            "Siblings of CPU core 1 are inconsistent: core reports [1, 2], group has [0, 1]"
        );
    }
}
