//! Chunk protocol wire records.

use serde::{Deserialize, Serialize};
use shared_crypto::blake3_hash_many;
use shared_types::{Block, Hash};

use crate::events::SyncError;

/// Request for chunk headers, carrying the requester's tail hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Hash of the requester's current tail block.
    pub tail_block_hash: Hash,
}

/// One chunk advertisement: the ordered block hashes it covers and a root
/// hash committing to them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHeader {
    /// Hashes of the blocks in this chunk, ascending by height.
    pub block_hashes: Vec<Hash>,
    /// Commitment over `block_hashes`.
    pub root_hash: Hash,
}

impl ChunkHeader {
    /// Build a header committing to the given hashes.
    pub fn new(block_hashes: Vec<Hash>) -> Self {
        let root_hash = compute_root(&block_hashes);
        Self {
            block_hashes,
            root_hash,
        }
    }

    /// Check that the root hash commits to the advertised block hashes.
    pub fn verify_root(&self) -> bool {
        self.root_hash == compute_root(&self.block_hashes)
    }
}

/// A window of chunk advertisements. An empty list means the gap was too
/// small to chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHeaders {
    /// The advertised chunks, ascending.
    pub headers: Vec<ChunkHeader>,
}

/// One chunk body: the header it fills and the wire forms of its blocks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkData {
    /// The header this body fills.
    pub header: ChunkHeader,
    /// Wire forms of the blocks, same order as the header's hashes.
    pub blocks: Vec<Vec<u8>>,
}

impl ChunkData {
    /// Verify the body against its header and decode the blocks.
    ///
    /// Fails with [`SyncError::WrongChunkHeaderRootHash`] when the header
    /// itself is inconsistent, [`SyncError::WrongChunkDataRootHash`] when
    /// the blocks do not hash to the advertised list.
    pub fn verify_blocks(&self) -> Result<Vec<Block>, SyncError> {
        if !self.header.verify_root() {
            return Err(SyncError::WrongChunkHeaderRootHash);
        }
        if self.blocks.len() != self.header.block_hashes.len() {
            return Err(SyncError::WrongChunkDataRootHash);
        }
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for (bytes, expected) in self.blocks.iter().zip(&self.header.block_hashes) {
            let block = Block::from_wire(bytes)?;
            if block.hash() != *expected {
                return Err(SyncError::WrongChunkDataRootHash);
            }
            blocks.push(block);
        }
        Ok(blocks)
    }
}

fn compute_root(block_hashes: &[Hash]) -> Hash {
    let slices: Vec<&[u8]> = block_hashes.iter().map(|hash| hash.as_slice()).collect();
    blake3_hash_many(&slices)
}
