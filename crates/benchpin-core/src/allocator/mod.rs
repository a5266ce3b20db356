//! # Core Allocator
//!
//! Partitions the usable cores into `run_count` disjoint sets of
//! `cores_per_run` cores, keeping every run inside the smallest hierarchy
//! unit that can hold it and spreading runs over the coarsest units first.
//!
//! ## Algorithm
//!
//! ```text
//!  validate ──► choose level ──► check capacity ──► ┌─ pick spread level ─┐
//!                                                   │  pick unit          │ x run_count
//!                                                   │  fill run from      │
//!                                                   │  sub-units          │
//!                                                   └─────────────────────┘
//! ```
//!
//! 1. Without hyperthreading every sibling group shrinks to its first core.
//! 2. The request is rounded up to whole physical cores.
//! 3. The *chosen level* is the finest level above siblings whose units can
//!    hold one rounded run.
//! 4. Each run is carved out of one unit, taking whole sub-units (groups one
//!    level below) and whole sibling groups. Cores left over in the last
//!    sub-unit of a run are blocked so that no sub-unit is shared by runs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use benchpin_core::allocator::{allocate, RunRequest};
//!
//! let request = RunRequest::builder().cores_per_run(4).run_count(2).build()?;
//! let assignment = allocate(&request, &topology)?;
//! for cores in &assignment {
//!     println!("{cores:?}");
//! }
//! ```

mod assignment;
mod error;
mod request;

pub use assignment::Assignment;
pub use error::AllocationError;
pub use request::{RunRequest, RunRequestBuilder};

use crate::hierarchy::Hierarchy;
use crate::topology::{CoreId, GroupKey, TopologySnapshot};

/// Builds the hierarchy for `topology` and assigns cores to runs.
///
/// # Errors
///
/// Returns [`Error::Topology`](crate::Error::Topology) for inconsistent
/// supplier data and [`Error::Allocation`](crate::Error::Allocation) if the
/// request cannot be satisfied.
pub fn allocate(request: &RunRequest, topology: &TopologySnapshot) -> crate::Result<Assignment> {
    request.validate()?;
    let hierarchy = Hierarchy::build(topology)?;
    Ok(assign(request, hierarchy)?)
}

/// Assigns cores to runs, consuming the hierarchy.
///
/// # Errors
///
/// Returns an [`AllocationError`] naming the first check that failed. No
/// partial assignment is ever returned.
pub fn assign(request: &RunRequest, mut hierarchy: Hierarchy) -> Result<Assignment, AllocationError> {
    request.validate()?;
    let RunRequest {
        cores_per_run,
        run_count,
        use_hyperthreading,
    } = *request;

    if !use_hyperthreading {
        hierarchy.collapse_siblings();
    }

    let available = hierarchy.remaining_cores();
    if cores_per_run > available {
        return Err(AllocationError::NotEnoughCoresForRun {
            cores_per_run,
            available,
        });
    }
    if request.total_cores() > available {
        return Err(AllocationError::NotEnoughCoresForRuns {
            run_count,
            cores_per_run,
            required: request.total_cores(),
            available,
            max_runs: available / cores_per_run,
        });
    }

    if let Some((core, missing)) = hierarchy.split_physical_cores().next() {
        return Err(AllocationError::SplitPhysicalCore {
            core,
            missing: missing.to_vec(),
        });
    }

    for level in hierarchy.levels() {
        tracing::debug!(
            "Cores per unit of hierarchy level '{}' = {}",
            level.name(),
            level.first_group_len()
        );
        if !level.is_uniform() {
            let mut sizes: Vec<usize> = level.groups().map(|(_, m)| m.len()).collect();
            sizes.sort_unstable();
            sizes.dedup();
            return Err(AllocationError::AsymmetricTopology {
                level: level.name().to_string(),
                sizes,
            });
        }
    }

    let core_size = hierarchy.level(0).first_group_len();
    let rounded = cores_per_run.div_ceil(core_size) * core_size;
    debug_assert!(cores_per_run <= rounded && rounded < cores_per_run + core_size);

    let chosen = (1..hierarchy.num_levels())
        .find(|&depth| hierarchy.level(depth).first_group_len() >= rounded)
        .ok_or_else(|| AllocationError::NoUnitLargeEnough {
            cores_per_run: rounded,
            largest_unit: hierarchy
                .levels()
                .iter()
                .map(|level| level.first_group_len())
                .max()
                .unwrap_or(0),
        })?;

    let units = hierarchy.level(chosen);
    let unit_size = units.first_group_len();
    let runs_per_unit = unit_size / rounded;
    let max_runs = units.len() * runs_per_unit;
    if max_runs < run_count {
        return Err(AllocationError::NotEnoughUnits {
            run_count,
            level: units.name().to_string(),
            max_runs,
        });
    }

    let sub_units = hierarchy.level(chosen - 1);
    let sub_units_per_run = rounded.div_ceil(sub_units.first_group_len());
    let max_runs = sub_units.len() / sub_units_per_run;
    if max_runs < run_count {
        return Err(AllocationError::CannotSplitMemoryRegions {
            level: sub_units.name().to_string(),
            max_runs,
        });
    }

    tracing::debug!(
        "Chosen level '{}' (depth {chosen}), unit size {unit_size}, {runs_per_unit} runs per unit, \
         {sub_units_per_run} '{}' sub-units per run",
        units.name(),
        sub_units.name()
    );

    let mut assignment = Assignment::with_capacity(run_count);
    let mut blocked = Vec::new();
    while assignment.len() < run_count {
        let run = assignment.len();
        let unit = select_unit(&hierarchy, chosen)
            .ok_or(AllocationError::CoresExhausted { run })?;
        let cores = fill_run(&mut hierarchy, chosen, unit, cores_per_run, &mut blocked);
        if cores.len() < cores_per_run {
            return Err(AllocationError::UnitExhausted {
                run,
                level: hierarchy.level(chosen).name().to_string(),
                unit,
            });
        }
        tracing::debug!("Run {run} gets cores {cores:?} of unit {unit}");
        assignment.push(cores);
    }

    if !blocked.is_empty() {
        tracing::debug!("Cores blocked by rounding: {blocked:?}");
    }
    Ok(assignment)
}

/// Picks the chosen-level unit the next run is carved from.
///
/// The spread level is the coarsest level whose groups differ in size. Its
/// largest group decides where the run goes, and within that group the unit
/// with the most remaining cores wins. Returns `None` once no cores are left.
fn select_unit(hierarchy: &Hierarchy, chosen: usize) -> Option<GroupKey> {
    let spread = (1..hierarchy.num_levels())
        .rev()
        .find(|&depth| {
            let level = hierarchy.level(depth);
            level.len() > 1 && !level.is_uniform()
        })
        .unwrap_or(0);

    let (_, group) = hierarchy.level(spread).largest_group()?;
    let units = hierarchy.level(chosen);

    let mut best: Option<(GroupKey, usize)> = None;
    for &idx in group {
        let key = hierarchy.key_at(idx, chosen);
        let size = units.group(key).map_or(0, <[usize]>::len);
        if best.map_or(true, |(_, best_size)| size > best_size) {
            best = Some((key, size));
        }
    }
    best.map(|(key, _)| key)
}

/// Collects one run's cores from `unit`, sub-unit by sub-unit.
///
/// Every sub-unit that is touched is consumed entirely; cores beyond
/// `cores_per_run` end up in `blocked`. Returns fewer than `cores_per_run`
/// cores only if the unit runs dry.
fn fill_run(
    hierarchy: &mut Hierarchy,
    chosen: usize,
    unit: GroupKey,
    cores_per_run: usize,
    blocked: &mut Vec<CoreId>,
) -> Vec<CoreId> {
    let sub_depth = chosen - 1;
    let mut cores = Vec::with_capacity(cores_per_run);

    while cores.len() < cores_per_run {
        let Some(&first) = hierarchy.level(chosen).group(unit).and_then(<[usize]>::first) else {
            break;
        };
        let sub_unit = hierarchy.key_at(first, sub_depth);

        // Whole physical cores only.
        while let Some(&head) = hierarchy
            .level(sub_depth)
            .group(sub_unit)
            .and_then(<[usize]>::first)
        {
            let sibling_key = hierarchy.key_at(head, 0);
            let siblings = hierarchy
                .level(0)
                .group(sibling_key)
                .map(<[usize]>::to_vec)
                .unwrap_or_default();
            for idx in siblings {
                let id = hierarchy.core_id(idx);
                if cores.len() < cores_per_run {
                    cores.push(id);
                } else {
                    blocked.push(id);
                }
                hierarchy.remove_core(idx);
            }
        }
    }
    cores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{GroupMapping, NUMA, PACKAGE};
    use std::collections::{BTreeMap, BTreeSet};

    /// `packages` x `nodes` NUMA nodes x `cores` physical cores x `threads`.
    ///
    /// Logical core ids are numbered like Linux does: all first threads,
    /// then all second threads.
    fn machine(packages: usize, nodes: usize, cores: usize, threads: usize) -> TopologySnapshot {
        let physical = packages * nodes * cores;
        let all: Vec<CoreId> = (0..physical * threads).collect();
        let siblings = all
            .iter()
            .map(|&c| {
                let p = c % physical;
                (c, (0..threads).map(|t| p + t * physical).collect())
            })
            .collect();
        TopologySnapshot::new(all.clone(), siblings)
            .with_mapping(GroupMapping::from_core_keys(
                NUMA,
                all.iter().map(|&c| (c, (c % physical) / cores)),
            ))
            .with_mapping(GroupMapping::from_core_keys(
                PACKAGE,
                all.iter().map(|&c| (c, (c % physical) / (nodes * cores))),
            ))
    }

    fn request(cores_per_run: usize, run_count: usize, ht: bool) -> RunRequest {
        RunRequest::builder()
            .cores_per_run(cores_per_run)
            .run_count(run_count)
            .use_hyperthreading(ht)
            .build()
            .unwrap()
    }

    fn run(cores_per_run: usize, run_count: usize, ht: bool, topo: &TopologySnapshot) -> Assignment {
        allocate(&request(cores_per_run, run_count, ht), topo).unwrap()
    }

    fn allocation_error(
        cores_per_run: usize,
        run_count: usize,
        ht: bool,
        topo: &TopologySnapshot,
    ) -> AllocationError {
        match allocate(&request(cores_per_run, run_count, ht), topo) {
            Err(crate::Error::Allocation(err)) => err,
            other => panic!("expected allocation error, got {other:?}"),
        }
    }

    fn assert_valid(assignment: &Assignment, cores_per_run: usize, run_count: usize) {
        assert_eq!(assignment.len(), run_count);
        let mut seen = BTreeSet::new();
        for cores in assignment {
            assert_eq!(cores.len(), cores_per_run);
            for core in cores {
                assert!(seen.insert(*core), "core {core} assigned twice");
            }
        }
    }

    #[test]
    fn test_flat_machine_pairs() {
        let topo = machine(1, 1, 8, 1);
        let assignment = run(2, 4, true, &topo);
        assert_eq!(
            assignment.runs(),
            &[vec![0, 1], vec![2, 3], vec![4, 5], vec![6, 7]]
        );
    }

    #[test]
    fn test_hyperthreading_pairs_spread_over_packages() {
        let topo = machine(2, 1, 4, 2);
        let assignment = run(2, 4, true, &topo);
        assert_eq!(
            assignment.runs(),
            &[vec![0, 8], vec![4, 12], vec![1, 9], vec![5, 13]]
        );
    }

    #[test]
    fn test_without_hyperthreading_only_first_threads() {
        let topo = machine(1, 1, 8, 2);
        let assignment = run(4, 2, false, &topo);
        assert_eq!(assignment.runs(), &[vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    }

    #[test]
    fn test_rounding_blocks_sibling() {
        let topo = machine(1, 1, 4, 2);
        let assignment = run(1, 4, true, &topo);
        assert_eq!(assignment.runs(), &[vec![0], vec![1], vec![2], vec![3]]);

        assert_eq!(
            allocation_error(1, 5, true, &topo),
            AllocationError::NotEnoughUnits {
                run_count: 5,
                level: NUMA.to_string(),
                max_runs: 4
            }
        );
    }

    #[test]
    fn test_run_spanning_numa_nodes_blocks_rest_of_node() {
        let topo = machine(2, 2, 4, 1);
        let assignment = run(6, 2, true, &topo);
        assert_eq!(
            assignment.runs(),
            &[vec![0, 1, 2, 3, 4, 5], vec![8, 9, 10, 11, 12, 13]]
        );
    }

    #[test]
    fn test_unit_with_most_cores_in_largest_group_is_used() {
        let topo = machine(2, 2, 4, 1);
        let assignment = run(3, 4, true, &topo);
        assert_eq!(
            assignment.runs(),
            &[vec![0, 1, 2], vec![8, 9, 10], vec![4, 5, 6], vec![12, 13, 14]]
        );
    }

    #[test]
    fn test_not_enough_cores_for_one_run() {
        let topo = machine(1, 1, 4, 1);
        assert_eq!(
            allocation_error(5, 1, true, &topo),
            AllocationError::NotEnoughCoresForRun {
                cores_per_run: 5,
                available: 4
            }
        );
    }

    #[test]
    fn test_not_enough_cores_for_all_runs() {
        let topo = machine(1, 1, 4, 1);
        assert_eq!(
            allocation_error(2, 4, true, &topo),
            AllocationError::NotEnoughCoresForRuns {
                run_count: 4,
                cores_per_run: 2,
                required: 8,
                available: 4,
                max_runs: 2
            }
        );
    }

    #[test]
    fn test_hyperthreading_off_reduces_capacity() {
        let topo = machine(1, 1, 4, 2);
        assert!(matches!(
            allocation_error(2, 4, false, &topo),
            AllocationError::NotEnoughCoresForRuns { available: 4, max_runs: 2, .. }
        ));
    }

    #[test]
    fn test_split_physical_core_rejected() {
        let topo = machine(1, 1, 4, 2).restrict_to(&[0, 1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(
            allocation_error(2, 1, true, &topo),
            AllocationError::SplitPhysicalCore {
                core: 3,
                missing: vec![7]
            }
        );
    }

    #[test]
    fn test_split_physical_core_allowed_without_hyperthreading() {
        let topo = machine(1, 1, 4, 2).restrict_to(&[0, 1, 2, 3, 4, 5, 6]).unwrap();
        let assignment = run(2, 2, false, &topo);
        assert_eq!(assignment.runs(), &[vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_asymmetric_topology_rejected() {
        let cores: Vec<CoreId> = (0..6).collect();
        let siblings = cores.iter().map(|&c| (c, vec![c])).collect();
        let topo = TopologySnapshot::new(cores, siblings).with_mapping(GroupMapping::new(
            PACKAGE,
            BTreeMap::from([(0, vec![0, 1, 2, 3]), (1, vec![4, 5])]),
        ));
        assert_eq!(
            allocation_error(1, 1, true, &topo),
            AllocationError::AsymmetricTopology {
                level: PACKAGE.to_string(),
                sizes: vec![2, 4]
            }
        );
    }

    #[test]
    fn test_no_unit_large_enough() {
        let topo = machine(2, 1, 4, 1);
        assert_eq!(
            allocation_error(6, 1, true, &topo),
            AllocationError::NoUnitLargeEnough {
                cores_per_run: 6,
                largest_unit: 4
            }
        );
    }

    #[test]
    fn test_no_unit_without_named_levels() {
        let cores: Vec<CoreId> = (0..4).collect();
        let siblings = cores.iter().map(|&c| (c, vec![c])).collect();
        let topo = TopologySnapshot::new(cores, siblings);
        assert!(matches!(
            allocation_error(1, 1, true, &topo),
            AllocationError::NoUnitLargeEnough { largest_unit: 1, .. }
        ));
    }

    #[test]
    fn test_not_enough_units() {
        let topo = machine(2, 1, 5, 1);
        assert_eq!(
            allocation_error(3, 3, true, &topo),
            AllocationError::NotEnoughUnits {
                run_count: 3,
                level: NUMA.to_string(),
                max_runs: 2
            }
        );
    }

    #[test]
    fn test_cannot_split_memory_regions() {
        // Packages of 12 fit two runs of 6, but every run needs 2 of the 6 nodes.
        let topo = machine(2, 3, 4, 1);
        assert_eq!(
            allocation_error(6, 4, true, &topo),
            AllocationError::CannotSplitMemoryRegions {
                level: NUMA.to_string(),
                max_runs: 3
            }
        );
    }

    #[test]
    fn test_unit_exhausted_instead_of_spinning() {
        // 2 packages with 3 nodes of 4: each package holds only one run of 6.
        let topo = machine(2, 3, 4, 1);
        assert!(matches!(
            allocation_error(6, 3, true, &topo),
            AllocationError::UnitExhausted { run: 2, .. }
        ));
    }

    #[test]
    fn test_invalid_request() {
        let topo = machine(1, 1, 4, 1);
        let request = RunRequest {
            cores_per_run: 0,
            ..RunRequest::default()
        };
        assert!(matches!(
            allocate(&request, &topo),
            Err(crate::Error::Allocation(AllocationError::InvalidRequest(_)))
        ));
    }

    #[test]
    fn test_deterministic() {
        let topo = machine(2, 2, 4, 2);
        assert_eq!(run(3, 4, true, &topo), run(3, 4, true, &topo));
    }

    #[test]
    fn test_valid_for_many_shapes() {
        for (packages, nodes, cores, threads) in [(1, 1, 8, 1), (2, 1, 4, 2), (2, 2, 4, 2), (4, 1, 6, 1)] {
            let topo = machine(packages, nodes, cores, threads);
            let total = packages * nodes * cores * threads;
            let usable: BTreeSet<_> = topo.usable_cores().iter().copied().collect();
            let mut allocated = 0;
            for cores_per_run in 1..=total {
                for run_count in 1..=total / cores_per_run {
                    for ht in [true, false] {
                        let shape = format!(
                            "{packages}x{nodes}x{cores}x{threads}, {run_count} runs of {cores_per_run}, ht={ht}"
                        );
                        match allocate(&request(cores_per_run, run_count, ht), &topo) {
                            Ok(assignment) => {
                                assert_valid(&assignment, cores_per_run, run_count);
                                assert!(assignment.all_cores().all(|c| usable.contains(&c)));
                                allocated += 1;
                            }
                            // Infeasible requests must be rejected by the checks, never by
                            // the runtime guards.
                            Err(crate::Error::Allocation(err)) => assert!(
                                matches!(
                                    err,
                                    AllocationError::NotEnoughCoresForRun { .. }
                                        | AllocationError::NotEnoughCoresForRuns { .. }
                                        | AllocationError::NoUnitLargeEnough { .. }
                                        | AllocationError::NotEnoughUnits { .. }
                                        | AllocationError::CannotSplitMemoryRegions { .. }
                                ),
                                "unexpected {err:?} for {shape}"
                            ),
                            Err(err) => panic!("unexpected {err:?} for {shape}"),
                        }
                    }
                }
            }
            assert!(allocated > 0, "nothing allocated on {packages}x{nodes}x{cores}x{threads}");
        }
    }
}
