//! Errors and wire records for block admission.

use shared_types::WireError;
use thiserror::Error;

pub mod p2p;

pub use p2p::DownloadRequest;

/// Block admission errors.
///
/// Three classes: benign rejections (`DuplicatedBlock`, `DoubleBlockMinted`)
/// are counted and swallowed at the local push boundary; deferrals
/// (`MissingParentBlock` and the two `CannotFindParent…` variants) leave the
/// block parked in the pool; everything else is fatal for the call.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The block is already pooled or already in the chain.
    #[error("Duplicated block")]
    DuplicatedBlock,

    /// Another block already occupies this timestamp slot.
    #[error("Double block minted in the same slot")]
    DoubleBlockMinted,

    /// The parent is not available and no peer can be asked for it.
    #[error("Missing parent block in local")]
    MissingParentBlock,

    /// Parent unknown and the gap is too wide; active chunk sync was
    /// requested instead of a download.
    #[error("Cannot find parent in local, active sync requested")]
    CannotFindParentInLocalAndTrySync,

    /// Parent unknown; a single-block download was issued.
    #[error("Cannot find parent in local, download requested")]
    CannotFindParentInLocalAndTryDownload,

    /// Integrity verification failed.
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Chain-side parent linkage failed during subtree verification.
    #[error("Failed to link block to parent: {0}")]
    LinkFailed(String),

    /// Execution verification failed during subtree verification.
    #[error("Block execution failed: {0}")]
    ExecutionFailed(String),

    /// The chain rejected the verified subtree.
    #[error("Promotion failed: {0}")]
    PromotionFailed(String),

    /// Consensus fork choice failed after promotion.
    #[error("Fork choice failed: {0}")]
    ForkChoiceFailed(String),

    /// Wire encode/decode failure.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl AdmissionError {
    /// Whether this is a benign rejection (counted, then swallowed at the
    /// local push boundary).
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::DuplicatedBlock | Self::DoubleBlockMinted)
    }
}
