//! Snapshot comparison.
//!
//! Only membership and addresses matter: a snapshot is materially
//! different when a node joined, a node left, or some node's address set
//! changed. Order of nodes and addresses never counts, and annotation-only
//! edits are not a change.

use meshbgp_core::ClusterSnapshot;

/// What differs between two snapshots, for logging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub readdressed: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.readdressed.is_empty()
    }
}

/// Whether `next` is materially different from `prev`.
///
/// Short-circuits on the first difference found.
pub fn snapshot_changed(prev: &ClusterSnapshot, next: &ClusterSnapshot) -> bool {
    if prev.len() != next.len() {
        return true;
    }

    next.nodes().any(|node| match prev.get(&node.name) {
        Some(old) => old.addresses != node.addresses,
        None => true,
    })
}

/// Full breakdown of the differences between two snapshots.
pub fn diff_snapshots(prev: &ClusterSnapshot, next: &ClusterSnapshot) -> SnapshotDiff {
    let mut diff = SnapshotDiff::default();

    for node in next.nodes() {
        match prev.get(&node.name) {
            Some(old) if old.addresses != node.addresses => {
                diff.readdressed.push(node.name.clone())
            }
            Some(_) => {}
            None => diff.added.push(node.name.clone()),
        }
    }

    diff.removed = prev
        .names()
        .filter(|name| !next.contains(name))
        .map(str::to_string)
        .collect();

    diff
}
