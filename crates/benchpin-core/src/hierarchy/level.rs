//! A single hierarchy level.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::topology::GroupKey;

/// One grouping granularity: group key to the arena indices of its cores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyLevel {
    name: String,
    groups: BTreeMap<GroupKey, Vec<usize>>,
}

impl HierarchyLevel {
    pub(crate) fn new(name: impl Into<String>, groups: BTreeMap<GroupKey, Vec<usize>>) -> Self {
        Self {
            name: name.into(),
            groups,
        }
    }

    /// Returns the name of the level.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of non-empty groups.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns the members of a group.
    #[must_use]
    pub fn group(&self, key: GroupKey) -> Option<&[usize]> {
        self.groups.get(&key).map(Vec::as_slice)
    }

    /// Iterates over the groups in key order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupKey, &[usize])> + '_ {
        self.groups.iter().map(|(key, members)| (*key, members.as_slice()))
    }

    /// Returns the size of the group with the smallest key.
    #[must_use]
    pub fn first_group_len(&self) -> usize {
        self.groups.values().next().map_or(0, Vec::len)
    }

    /// Returns true if all groups have the same size.
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        let size = self.first_group_len();
        self.groups.values().all(|members| members.len() == size)
    }

    /// Returns the group with the most cores, the smallest key on ties.
    #[must_use]
    pub fn largest_group(&self) -> Option<(GroupKey, &[usize])> {
        self.groups
            .iter()
            .min_by_key(|(key, members)| (Reverse(members.len()), **key))
            .map(|(key, members)| (*key, members.as_slice()))
    }

    /// Removes a core from one of the groups, dropping the group once empty.
    pub(crate) fn remove(&mut self, key: GroupKey, idx: usize) {
        if let Some(members) = self.groups.get_mut(&key) {
            members.retain(|&member| member != idx);
            if members.is_empty() {
                self.groups.remove(&key);
            }
        }
    }
}
