//! Graph node wrapping a pending block.

use std::collections::HashSet;

use shared_types::{Block, Hash};

/// A node in the pending-ancestry forest.
///
/// Nodes reference relatives by hash into the owning arena, never by
/// pointer, so evicting a node cannot leave a cycle behind: a dangling hash
/// simply fails to resolve.
#[derive(Debug, Clone)]
pub struct LinkedBlock {
    /// The wrapped block.
    pub block: Block,
    /// Block hash (identity key in the arena).
    pub hash: Hash,
    /// Declared parent hash, immutable after construction.
    pub parent_hash: Hash,
    /// Hash of the pooled parent, once linked.
    pub parent: Option<Hash>,
    /// Hashes of pooled children.
    pub children: HashSet<Hash>,
}

impl LinkedBlock {
    /// Wrap a block into an unlinked node.
    pub fn new(block: Block) -> Self {
        let hash = block.hash();
        let parent_hash = block.parent_hash();
        Self {
            block,
            hash,
            parent_hash,
            parent: None,
            children: HashSet::new(),
        }
    }
}
