//! Prerequisite/target classification for one command's file accesses
//!
//! Deduplication and display order are kept apart: the command's access
//! set is keyed by (operation, path), and [`primary_order`] is only ever
//! used to sort the target subset.

use crate::trace_record::{CommandRecord, FileAccess};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// A command's accesses split into upstream and downstream paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies<'a> {
    /// Read or executed paths, sorted by path
    pub prerequisites: Vec<&'a FileAccess>,
    /// Produced paths, most likely primary output first
    pub targets: Vec<&'a FileAccess>,
    /// Paths that created symlinks point at, sorted and distinct
    pub link_targets: Vec<&'a str>,
}

impl<'a> Dependencies<'a> {
    /// The heuristic principal output of the command
    pub fn primary_target(&self) -> Option<&'a FileAccess> {
        self.targets.first().copied()
    }

    /// Distinct prerequisite paths (including link targets) that the
    /// command does not also produce, sorted
    pub fn prerequisite_paths(&self) -> Vec<&'a str> {
        let produced: BTreeSet<&str> = self.targets.iter().map(|t| t.path.as_str()).collect();
        let paths: BTreeSet<&'a str> = self
            .prerequisites
            .iter()
            .map(|p| p.path.as_str())
            .chain(self.link_targets.iter().copied())
            .filter(|p| !produced.contains(p))
            .collect();
        paths.into_iter().collect()
    }

    /// Distinct target paths in primary order
    pub fn target_paths(&self) -> Vec<&'a str> {
        let mut seen = BTreeSet::new();
        self.targets
            .iter()
            .map(|t| t.path.as_str())
            .filter(|p| seen.insert(*p))
            .collect()
    }
}

/// Classify a command's accesses into prerequisites and targets
pub fn classify(command: &CommandRecord) -> Dependencies<'_> {
    let mut prerequisites: Vec<&FileAccess> =
        command.accesses().filter(|a| a.is_prerequisite()).collect();
    prerequisites.sort_by(|a, b| a.path.cmp(&b.path));

    let mut targets = distinct_targets(command);
    targets.sort_by(|a, b| primary_order(a, b));

    let link_targets: BTreeSet<&str> = command
        .accesses()
        .filter(|a| a.is_symlink())
        .filter_map(|a| a.secondary_path.as_deref())
        .collect();

    tracing::debug!(
        command = %command,
        prerequisites = prerequisites.len(),
        targets = targets.len(),
        "classified accesses"
    );

    Dependencies {
        prerequisites,
        targets,
        link_targets: link_targets.into_iter().collect(),
    }
}

/// One target access per path, preferring files over directories and
/// created over appended
///
/// [`primary_order`] treats equal paths as equal whatever their operation,
/// so it is only a total order over distinct paths.
fn distinct_targets(command: &CommandRecord) -> Vec<&FileAccess> {
    let rank = |a: &FileAccess| (a.is_directory(), a.is_append(), a.operation);
    let mut by_path: BTreeMap<&str, &FileAccess> = BTreeMap::new();
    for access in command.accesses().filter(|a| a.is_target()) {
        by_path
            .entry(access.path.as_str())
            .and_modify(|kept| {
                if rank(access) < rank(kept) {
                    *kept = access;
                }
            })
            .or_insert(access);
    }
    by_path.into_values().collect()
}

/// Ordering used to pick a primary target among sibling outputs
///
/// This is guesswork and may be wrong for unusual naming conventions:
/// 1. dotfiles go last
/// 2. directories go after files
/// 3. created files go before appended ones
/// 4. shorter paths go first, since generated frills (.pdb and so on)
///    tend to carry extra extensions or live in subdirectories
/// 5. ties break lexically
pub fn primary_order(a: &FileAccess, b: &FileAccess) -> Ordering {
    if a.path == b.path {
        return Ordering::Equal;
    }
    a.path
        .starts_with('.')
        .cmp(&b.path.starts_with('.'))
        .then_with(|| a.is_directory().cmp(&b.is_directory()))
        .then_with(|| a.is_append().cmp(&b.is_append()))
        .then_with(|| a.path.len().cmp(&b.path.len()))
        .then_with(|| a.path.cmp(&b.path))
}
