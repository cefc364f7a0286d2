//! Outbound ports (SPI) for chain sync.

use shared_types::{Block, Hash};

use crate::events::{ChunkData, ChunkHeader, ChunkHeaders, SyncError};

/// Minimal chain surface the sync side needs.
pub trait ChainView: Send + Sync {
    /// The current tail block.
    fn tail_block(&self) -> Block;
}

/// The chunk collaborator: slices the local chain into advertisements and
/// bodies for remote peers.
pub trait ChunkProvider: Send + Sync {
    /// Advertise the chunks a peer at `tail_hash` is missing.
    ///
    /// [`SyncError::TooSmallGapToSync`] is benign and answered with an
    /// empty advertisement by the caller.
    fn generate_chunk_headers(&self, tail_hash: &Hash) -> Result<ChunkHeaders, SyncError>;

    /// Produce the body for one advertised chunk.
    ///
    /// [`SyncError::WrongChunkHeaderRootHash`] means the request is
    /// inconsistent with what was advertised; the caller closes the peer.
    fn generate_chunk_data(&self, header: &ChunkHeader) -> Result<ChunkData, SyncError>;
}

/// Where recovered blocks go: the block admission pool.
pub trait BlockSink: Send + Sync {
    /// Admit one recovered block.
    fn push(&self, block: Block) -> Result<(), SyncError>;
}
