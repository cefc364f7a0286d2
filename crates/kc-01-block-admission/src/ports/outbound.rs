//! Outbound ports (SPI) for block admission.
//!
//! The chain store and the consensus engine are external collaborators;
//! admission only ever sees these two gateways.

use shared_types::{Block, Hash};

use crate::events::AdmissionError;

/// Canonical chain surface consumed by admission.
pub trait ChainGateway: Send + Sync {
    /// Network-wide chain identifier.
    fn chain_id(&self) -> u32;

    /// Hash of the genesis block.
    fn genesis_hash(&self) -> Hash;

    /// The current tail block.
    fn tail_block(&self) -> Block;

    /// Look up a block by hash.
    fn get_block(&self, hash: &Hash) -> Option<Block>;

    /// Compute the derived state a block needs from its chain-resident
    /// parent. Fatal for the block's subtree on failure.
    fn link_parent(&self, block: &Block, parent: &Block) -> Result<(), AdmissionError>;

    /// Promote a verified subtree: `all` in pre-order, `tails` the childless
    /// members.
    fn put_verified_blocks(
        &self,
        parent: &Block,
        all: &[Block],
        tails: &[Block],
    ) -> Result<(), AdmissionError>;

    /// Kick off bulk chunk catch-up. Returns false when one is already
    /// running.
    fn start_active_sync(&self) -> bool;
}

/// Consensus-engine surface consumed by admission.
pub trait ConsensusGateway: Send + Sync {
    /// Stateless integrity verification (hash, signature, chain id).
    fn verify_integrity(&self, block: &Block, chain_id: u32) -> Result<(), AdmissionError>;

    /// Run the state transition of `block` on top of `parent`.
    fn verify_execution(&self, block: &Block, parent: &Block) -> Result<(), AdmissionError>;

    /// Re-evaluate the canonical tail after promotion.
    fn fork_choice(&self) -> Result<(), AdmissionError>;
}
