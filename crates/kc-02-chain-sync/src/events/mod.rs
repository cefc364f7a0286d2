//! Errors and wire records for chain sync.

use shared_types::WireError;
use thiserror::Error;

pub mod p2p;

pub use p2p::{ChunkData, ChunkHeader, ChunkHeaders, SyncRequest};

/// Chain sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A peer sent unparseable ChainSync bytes.
    #[error("Invalid ChainSync message data")]
    InvalidChainSyncMessageData,

    /// A peer sent unparseable ChainGetChunk bytes.
    #[error("Invalid ChainGetChunk message data")]
    InvalidChainGetChunkMessageData,

    /// The requester's tail is too close to ours to be worth chunking.
    /// Benign: the responder answers with an empty advertisement.
    #[error("Gap to sync is too small")]
    TooSmallGapToSync,

    /// A chunk header's root hash does not commit to its block hashes.
    #[error("Chunk header root hash mismatch")]
    WrongChunkHeaderRootHash,

    /// A chunk body does not match the header it claims to fill.
    #[error("Chunk data root hash mismatch")]
    WrongChunkDataRootHash,

    /// The active task ran out of retries without progress.
    #[error("Active sync timed out")]
    SyncTimeout,

    /// Any other terminal sync failure.
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    /// Wire encode/decode failure.
    #[error(transparent)]
    Wire(#[from] WireError),
}
