//! Test fixtures shared across subsystem test suites.

use crate::entities::{Block, BlockHeader, Hash};

/// Chain id used by all test fixtures.
pub const TEST_CHAIN_ID: u32 = 1001;

/// Build a block with deterministic contents for tests.
///
/// The signature is a stand-in derived from the height so that two distinct
/// fixtures never share signature bytes.
pub fn make_test_block(height: u64, parent_hash: Hash, timestamp: i64) -> Block {
    let header = BlockHeader {
        version: 1,
        chain_id: TEST_CHAIN_ID,
        height,
        parent_hash,
        state_root: [height as u8; 32],
        timestamp,
        proposer: [0xAA; 32],
    };
    let mut signature = [0u8; 64];
    signature[0] = height as u8;
    signature[1] = (timestamp % 251) as u8;
    Block::new(header, signature, Vec::new())
}

/// Build a linear chain of blocks starting above the given parent.
pub fn make_test_chain(
    len: usize,
    start_height: u64,
    parent_hash: Hash,
    start_timestamp: i64,
) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(len);
    let mut parent = parent_hash;
    for i in 0..len {
        let block = make_test_block(
            start_height + i as u64,
            parent,
            start_timestamp + i as i64 * 15,
        );
        parent = block.hash();
        blocks.push(block);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_fixture_links() {
        let genesis = make_test_block(0, [0u8; 32], 1_700_000_000);
        let chain = make_test_chain(3, 1, genesis.hash(), 1_700_000_015);
        assert_eq!(chain[0].parent_hash(), genesis.hash());
        assert_eq!(chain[1].parent_hash(), chain[0].hash());
        assert_eq!(chain[2].parent_hash(), chain[1].hash());
    }
}
