//! The result of an allocation.

use std::fmt;
use std::ops::Deref;

use serde::Serialize;

use crate::topology::{join_ids, CoreId};

/// Disjoint core sets, one per run, in the order they were created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Assignment {
    runs: Vec<Vec<CoreId>>,
}

impl Assignment {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            runs: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, cores: Vec<CoreId>) {
        self.runs.push(cores);
    }

    /// Returns the core sets of all runs.
    #[must_use]
    pub fn runs(&self) -> &[Vec<CoreId>] {
        &self.runs
    }

    /// Returns the number of runs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if there are no runs.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Returns an iterator over the core sets.
    pub fn iter(&self) -> impl Iterator<Item = &Vec<CoreId>> {
        self.runs.iter()
    }

    /// Returns every assigned core, run by run.
    pub fn all_cores(&self) -> impl Iterator<Item = CoreId> + '_ {
        self.runs.iter().flatten().copied()
    }

    /// Consumes the assignment and returns the inner Vec.
    #[must_use]
    pub fn into_inner(self) -> Vec<Vec<CoreId>> {
        self.runs
    }
}

impl Deref for Assignment {
    type Target = [Vec<CoreId>];

    fn deref(&self) -> &Self::Target {
        &self.runs
    }
}

impl<'a> IntoIterator for &'a Assignment {
    type Item = &'a Vec<CoreId>;
    type IntoIter = std::slice::Iter<'a, Vec<CoreId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.iter()
    }
}

impl From<Vec<Vec<CoreId>>> for Assignment {
    fn from(runs: Vec<Vec<CoreId>>) -> Self {
        Self { runs }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (run, cores) in self.runs.iter().enumerate() {
            if run > 0 {
                writeln!(f)?;
            }
            write!(f, "run {run}: {}", join_ids(cores))?;
        }
        Ok(())
    }
}
