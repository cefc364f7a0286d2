//! Admission invariants and boundary predicates.

use crate::domain::forest::PendingForest;

/// Fresh gossip older than the accepted network delay is dropped before
/// admission. The boundary itself (`now - timestamp == delay`) is accepted.
pub fn is_behind(now: i64, timestamp: i64, accepted_delay: i64) -> bool {
    now - timestamp > accepted_delay
}

/// A parentless block whose height gap to the local tail strictly exceeds
/// one chunk abandons per-block download in favour of bulk sync.
pub fn gap_requires_bulk_sync(height: u64, tail_height: u64, chunk_size: u64) -> bool {
    (height as i64) - (tail_height as i64) > chunk_size as i64
}

/// Structural invariant: every linked node appears in its parent's child
/// set. Used by tests and debug assertions.
pub fn children_backlinks_hold(forest: &PendingForest) -> bool {
    forest.iter().all(|(hash, node)| match node.parent {
        Some(parent_hash) => forest
            .get(&parent_hash)
            .map_or(true, |parent| parent.children.contains(hash)),
        None => true,
    })
}
