// ABOUTME: Row-identity differ - symmetric difference over two key sets
// ABOUTME: Hash-set membership, O(|source| + |destination|)

use std::collections::HashSet;

use crate::rows::{RowKey, RowKeyDiff};

/// Compute the symmetric difference between a source and a destination key
/// set.
///
/// Output order follows input order, deduplicated, so a deterministic pair
/// of snapshots diffs deterministically.
pub fn diff_key_sets(source: &[RowKey], dest: &[RowKey]) -> RowKeyDiff {
    let source_set: HashSet<&RowKey> = source.iter().collect();
    let dest_set: HashSet<&RowKey> = dest.iter().collect();

    let mut seen = HashSet::new();
    let created = source
        .iter()
        .filter(|k| !dest_set.contains(*k) && seen.insert(*k))
        .cloned()
        .collect();

    seen.clear();
    let deleted = dest
        .iter()
        .filter(|k| !source_set.contains(*k) && seen.insert(*k))
        .cloned()
        .collect();

    RowKeyDiff { created, deleted }
}
