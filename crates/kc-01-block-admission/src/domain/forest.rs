//! The bounded arena of pending blocks.
//!
//! Two LRU maps of equal capacity: the node arena keyed by block hash and
//! the timestamp slot index used for equivocation detection. Both evict
//! their least-recently-touched entry on overflow; an evicted node is simply
//! dropped (relatives hold hashes, not pointers, so nothing needs breaking).

use std::num::NonZeroUsize;

use lru::LruCache;
use shared_types::{short_hex, Block, Hash};
use tracing::debug;

use crate::domain::linked_block::LinkedBlock;

/// Bounded forest of pending ancestries plus the slot index.
pub struct PendingForest {
    nodes: LruCache<Hash, LinkedBlock>,
    slots: LruCache<i64, Block>,
}

impl PendingForest {
    /// Create a forest with the given capacity for nodes and slots alike.
    /// A capacity below 1 is clamped to 1.
    pub fn new(size: usize) -> Self {
        let capacity = NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN);
        Self {
            nodes: LruCache::new(capacity),
            slots: LruCache::new(capacity),
        }
    }

    /// Number of pooled nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of occupied timestamp slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether a block with this hash is pooled.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.nodes.contains(hash)
    }

    /// Read a pooled node without touching recency.
    pub fn get(&self, hash: &Hash) -> Option<&LinkedBlock> {
        self.nodes.peek(hash)
    }

    /// Iterate over pooled nodes, most recently used first.
    pub fn iter(&self) -> impl Iterator<Item = (&Hash, &LinkedBlock)> {
        self.nodes.iter()
    }

    /// Insert a block as a fresh node. The evicted victim, if any, is
    /// dropped.
    pub fn insert(&mut self, block: Block) -> Hash {
        let node = LinkedBlock::new(block);
        let hash = node.hash;
        if let Some((evicted, _)) = self.nodes.push(hash, node) {
            if evicted != hash {
                debug!(hash = %short_hex(&evicted), "Evicted pending block");
            }
        }
        hash
    }

    /// Remove a node (after promotion into the chain).
    pub fn remove(&mut self, hash: &Hash) {
        self.nodes.pop(hash);
    }

    /// The block currently holding this timestamp slot, if any.
    pub fn slot_occupant(&mut self, timestamp: i64) -> Option<Block> {
        self.slots.get(&timestamp).cloned()
    }

    /// Record a block as the occupant of its timestamp slot.
    pub fn occupy_slot(&mut self, timestamp: i64, block: Block) {
        if let Some((evicted, _)) = self.slots.push(timestamp, block) {
            if evicted != timestamp {
                debug!(timestamp = evicted, "Evicted timestamp slot");
            }
        }
    }

    /// Link `child` under `parent`. Both must be pooled; linking is
    /// idempotent.
    pub fn link_child(&mut self, parent_hash: &Hash, child_hash: &Hash) {
        match self.nodes.peek_mut(child_hash) {
            Some(child) => child.parent = Some(*parent_hash),
            None => return,
        }
        if let Some(parent) = self.nodes.peek_mut(parent_hash) {
            parent.children.insert(*child_hash);
        }
    }

    /// Link every pooled node that declared `parent_hash` as its parent.
    /// Returns how many orphans were adopted.
    pub fn adopt_orphans(&mut self, parent_hash: &Hash) -> usize {
        let orphans: Vec<Hash> = self
            .nodes
            .iter()
            .filter(|(hash, node)| node.parent_hash == *parent_hash && *hash != parent_hash)
            .map(|(hash, _)| *hash)
            .collect();
        for orphan in &orphans {
            self.link_child(parent_hash, orphan);
        }
        orphans.len()
    }

    /// Walk linked parents upward from `start` to the topmost pooled
    /// ancestor.
    pub fn topmost_pooled_ancestor(&self, start: &Hash) -> Hash {
        let mut current = *start;
        loop {
            match self.nodes.peek(&current).and_then(|node| node.parent) {
                Some(parent) if self.nodes.contains(&parent) => current = parent,
                _ => return current,
            }
        }
    }
}
