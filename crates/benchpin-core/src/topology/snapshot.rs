//! # Topology Snapshot
//!
//! The in-memory form of everything the topology supplier discovered about
//! the machine. The allocator only ever sees this snapshot, never the
//! platform it came from.

use std::collections::{BTreeMap, BTreeSet};

use super::{CoreId, GroupKey, TopologyError};

/// A named grouping of cores, e.g. by NUMA node or physical package.
///
/// An empty mapping means the source was unavailable on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMapping {
    /// Name of the grouping ("numa", "package", ...)
    pub name: String,
    /// Cores of each group, keyed by group id
    pub groups: BTreeMap<GroupKey, Vec<CoreId>>,
}

impl GroupMapping {
    /// Creates a mapping from its name and groups.
    #[must_use]
    pub fn new(name: impl Into<String>, groups: BTreeMap<GroupKey, Vec<CoreId>>) -> Self {
        Self {
            name: name.into(),
            groups,
        }
    }

    /// Creates an empty mapping for an unavailable source.
    #[must_use]
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::new(name, BTreeMap::new())
    }

    /// Builds a mapping from a per-core lookup.
    pub fn from_core_keys<I>(name: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (CoreId, GroupKey)>,
    {
        let mut groups: BTreeMap<GroupKey, Vec<CoreId>> = BTreeMap::new();
        for (core, key) in pairs {
            groups.entry(key).or_default().push(core);
        }
        Self::new(name, groups)
    }

    /// Returns true if the source provided no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Supplier data for one allocation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologySnapshot {
    usable_cores: Vec<CoreId>,
    siblings_of: BTreeMap<CoreId, Vec<CoreId>>,
    mappings: Vec<GroupMapping>,
}

impl TopologySnapshot {
    /// Creates a snapshot from the usable cores and their hyperthreading siblings.
    ///
    /// Every core is expected to be listed among its own siblings.
    #[must_use]
    pub fn new(usable_cores: Vec<CoreId>, siblings_of: BTreeMap<CoreId, Vec<CoreId>>) -> Self {
        Self {
            usable_cores,
            siblings_of,
            mappings: Vec::new(),
        }
    }

    /// Adds a named grouping.
    #[must_use]
    pub fn with_mapping(mut self, mapping: GroupMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Returns the usable cores in supplier order.
    #[must_use]
    pub fn usable_cores(&self) -> &[CoreId] {
        &self.usable_cores
    }

    /// Returns the siblings of a single core.
    #[must_use]
    pub fn siblings(&self, core: CoreId) -> Option<&[CoreId]> {
        self.siblings_of.get(&core).map(Vec::as_slice)
    }

    /// Returns all named groupings in supplier order.
    #[must_use]
    pub fn mappings(&self) -> &[GroupMapping] {
        &self.mappings
    }

    /// Returns the grouping with the given name.
    #[must_use]
    pub fn mapping(&self, name: &str) -> Option<&GroupMapping> {
        self.mappings.iter().find(|m| m.name == name)
    }

    /// Restricts the usable cores to an explicit selection.
    ///
    /// The remaining cores keep their original order.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::InvalidCoreSelection`] listing every selected
    /// core that is not usable.
    pub fn restrict_to(mut self, selection: &[CoreId]) -> Result<Self, TopologyError> {
        let usable: BTreeSet<CoreId> = self.usable_cores.iter().copied().collect();
        let invalid: BTreeSet<CoreId> = selection
            .iter()
            .copied()
            .filter(|core| !usable.contains(core))
            .collect();
        if !invalid.is_empty() {
            return Err(TopologyError::InvalidCoreSelection {
                cores: invalid.into_iter().collect(),
            });
        }

        let selected: BTreeSet<CoreId> = selection.iter().copied().collect();
        self.usable_cores.retain(|core| selected.contains(core));
        tracing::debug!("List of available CPU cores is {:?}", self.usable_cores);
        Ok(self)
    }
}
