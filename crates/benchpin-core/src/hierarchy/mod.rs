//! # Hierarchy Builder
//!
//! Normalizes supplier data into an ordered list of hierarchy levels, finest
//! first. Level 0 always holds the hyperthreading sibling groups; the named
//! groupings follow, sorted by the number of cores in a group.
//!
//! ## Layout
//!
//! ```text
//! cores:  [ CoreRecord { id: 0, keys: [0, 0, 0] }, CoreRecord { id: 1, keys: [0, 0, 0] }, ... ]
//!                                       │  │  └── package key
//!                                       │  └───── numa key
//!                                       └──────── sibling key
//! levels: [ siblings: {0: [0, 1], 2: [2, 3], ...},
//!           numa:     {0: [0, 1, 2, 3], 1: [...]},
//!           package:  {0: [0, 1, ..., 7]} ]
//! ```
//!
//! Groups store indices into the core arena. A core leaves the hierarchy
//! only through [`Hierarchy::remove_core`], which drops it from every level
//! at once.

mod level;

pub use level::HierarchyLevel;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::topology::{CoreId, GroupKey, TopologyError, TopologySnapshot, SIBLINGS};

/// Group keys of one core, one per level, finest first.
pub(crate) type CoreKeys = SmallVec<[GroupKey; 4]>;

/// A core and its coordinate in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CoreRecord {
    /// The logical core id
    pub id: CoreId,
    /// Key of the group this core belongs to at each level
    pub keys: CoreKeys,
}

/// Ordered hierarchy levels over an arena of cores.
///
/// Built fresh for every allocation and consumed by it.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    cores: Vec<CoreRecord>,
    levels: Vec<HierarchyLevel>,
    removed: Vec<bool>,
    remaining: usize,
    /// Reported siblings of each sibling group that are not usable
    missing_siblings: BTreeMap<GroupKey, Vec<CoreId>>,
}

impl Hierarchy {
    /// Builds the hierarchy for a topology snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`TopologyError`] if the snapshot has no usable cores, if a
    /// core has no group at some level, is listed twice at one level, or if
    /// the sibling relation is not symmetric.
    pub fn build(topology: &TopologySnapshot) -> Result<Self, TopologyError> {
        let usable = topology.usable_cores();
        if usable.is_empty() {
            return Err(TopologyError::NoUsableCores);
        }

        let mut index = FxHashMap::default();
        let mut cores = Vec::with_capacity(usable.len());
        for &id in usable {
            if index.insert(id, cores.len()).is_some() {
                return Err(TopologyError::DuplicateCore {
                    core: id,
                    level: "usable".to_string(),
                });
            }
            cores.push(CoreRecord {
                id,
                keys: CoreKeys::new(),
            });
        }

        let (siblings, missing_siblings) = Self::sibling_level(topology, &cores, &index)?;

        let mut named = Vec::new();
        for mapping in topology.mappings() {
            if mapping.is_empty() {
                tracing::warn!(
                    "No '{}' information available, ignoring this hierarchy level",
                    mapping.name
                );
                continue;
            }
            let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
            let mut seen = vec![false; cores.len()];
            for (&key, members) in &mapping.groups {
                for core in members {
                    let Some(&idx) = index.get(core) else {
                        continue;
                    };
                    if seen[idx] {
                        return Err(TopologyError::DuplicateCore {
                            core: *core,
                            level: mapping.name.clone(),
                        });
                    }
                    seen[idx] = true;
                    groups.entry(key).or_default().push(idx);
                }
            }
            if let Some(idx) = seen.iter().position(|s| !s) {
                return Err(TopologyError::MissingGroup {
                    core: cores[idx].id,
                    level: mapping.name.clone(),
                });
            }
            for members in groups.values_mut() {
                members.sort_by_key(|&idx| cores[idx].id);
            }
            named.push(HierarchyLevel::new(mapping.name.clone(), groups));
        }

        // Stable sort: levels with equally sized groups keep supplier order.
        named.sort_by_key(HierarchyLevel::first_group_len);

        let mut levels = Vec::with_capacity(named.len() + 1);
        levels.push(siblings);
        levels.extend(named);

        for level in &levels {
            for (key, members) in level.groups() {
                for &idx in members {
                    cores[idx].keys.push(key);
                }
            }
        }
        debug_assert!(cores.iter().all(|c| c.keys.len() == levels.len()));

        let hierarchy = Self {
            removed: vec![false; cores.len()],
            remaining: cores.len(),
            cores,
            levels,
            missing_siblings,
        };
        tracing::debug!("{}", hierarchy.summary());
        Ok(hierarchy)
    }

    /// Builds level 0 from the sibling relation.
    ///
    /// The smallest usable core of each sibling group is its key.
    fn sibling_level(
        topology: &TopologySnapshot,
        cores: &[CoreRecord],
        index: &FxHashMap<CoreId, usize>,
    ) -> Result<(HierarchyLevel, BTreeMap<GroupKey, Vec<CoreId>>), TopologyError> {
        let reported_siblings = |core: CoreId| -> Result<Vec<CoreId>, TopologyError> {
            let siblings = topology
                .siblings(core)
                .ok_or_else(|| TopologyError::MissingGroup {
                    core,
                    level: SIBLINGS.to_string(),
                })?;
            let set: BTreeSet<CoreId> = siblings.iter().copied().collect();
            Ok(set.into_iter().collect())
        };

        let mut groups = BTreeMap::new();
        let mut missing = BTreeMap::new();
        let mut covered = vec![false; cores.len()];

        for (idx, record) in cores.iter().enumerate() {
            if covered[idx] {
                continue;
            }
            let reported = reported_siblings(record.id)?;
            if !reported.contains(&record.id) {
                let mut expected = reported.clone();
                expected.push(record.id);
                expected.sort_unstable();
                return Err(TopologyError::InconsistentSiblings {
                    core: record.id,
                    reported,
                    expected,
                });
            }

            let mut members = Vec::with_capacity(reported.len());
            let mut unusable = Vec::new();
            for &sibling in &reported {
                let Some(&sibling_idx) = index.get(&sibling) else {
                    unusable.push(sibling);
                    continue;
                };
                let theirs = reported_siblings(sibling)?;
                if theirs != reported || covered[sibling_idx] {
                    return Err(TopologyError::InconsistentSiblings {
                        core: sibling,
                        reported: theirs,
                        expected: reported.clone(),
                    });
                }
                covered[sibling_idx] = true;
                members.push(sibling_idx);
            }

            let key = cores[members[0]].id;
            if !unusable.is_empty() {
                missing.insert(key, unusable);
            }
            groups.insert(key, members);
        }

        Ok((HierarchyLevel::new(SIBLINGS, groups), missing))
    }

    /// Returns the number of levels, siblings included.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Returns all levels, finest first.
    #[must_use]
    pub fn levels(&self) -> &[HierarchyLevel] {
        &self.levels
    }

    /// Returns the level at `depth`.
    ///
    /// # Panics
    ///
    /// Panics if `depth >= num_levels()`.
    #[must_use]
    pub fn level(&self, depth: usize) -> &HierarchyLevel {
        &self.levels[depth]
    }

    /// Returns the number of cores still in the hierarchy.
    #[must_use]
    pub fn remaining_cores(&self) -> usize {
        self.remaining
    }

    /// Returns the core id stored at an arena index.
    #[must_use]
    pub fn core_id(&self, idx: usize) -> CoreId {
        self.cores[idx].id
    }

    /// Returns the group key of a core at `depth`.
    #[must_use]
    pub fn key_at(&self, idx: usize, depth: usize) -> GroupKey {
        self.cores[idx].keys[depth]
    }

    /// Sibling groups whose reported siblings are not all usable.
    ///
    /// Yields the group key together with the unusable siblings.
    pub fn split_physical_cores(&self) -> impl Iterator<Item = (CoreId, &[CoreId])> + '_ {
        self.missing_siblings
            .iter()
            .map(|(core, missing)| (*core, missing.as_slice()))
    }

    /// Removes a core from every level.
    ///
    /// Groups that become empty are dropped. Removing a core twice is a no-op.
    pub fn remove_core(&mut self, idx: usize) {
        if self.removed[idx] {
            return;
        }
        for (depth, level) in self.levels.iter_mut().enumerate() {
            level.remove(self.cores[idx].keys[depth], idx);
        }
        self.removed[idx] = true;
        self.remaining -= 1;
    }

    /// Reduces every sibling group to its first core.
    ///
    /// All other siblings leave the hierarchy, and siblings that were never
    /// usable stop counting as missing.
    pub fn collapse_siblings(&mut self) {
        let extra: Vec<usize> = self.levels[0]
            .groups()
            .flat_map(|(_, members)| members.iter().skip(1).copied())
            .collect();
        for idx in extra {
            self.remove_core(idx);
        }
        self.missing_siblings.clear();
    }

    /// Returns a multi-line description of the levels.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Hierarchy: {} levels, {} cores",
            self.levels.len(),
            self.remaining
        );
        for (depth, level) in self.levels.iter().enumerate() {
            let _ = write!(
                s,
                "\n  Level {depth} ({}): {} groups of {} cores",
                level.name(),
                level.len(),
                level.first_group_len()
            );
        }
        s
    }
}
