//! # Core Domain Entities
//!
//! The chain-level entities shared by every subsystem.
//!
//! ## Clusters
//!
//! - **Chain**: [`Block`], [`BlockHeader`]
//! - **Networking**: [`NodeId`] / [`PeerId`]

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::wire::{self, WireError};

/// A 32-byte BLAKE3 hash.
pub type Hash = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// Unique identifier for a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Creates a node id from a 32-byte array.
    pub fn new(id: [u8; 32]) -> Self {
        Self(id)
    }
}

/// A peer identifier (alias for `NodeId` in peer contexts).
pub type PeerId = NodeId;

/// The header of a block: metadata plus the root hashes that commit to the
/// block's effect on the chain.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Protocol version for this block.
    pub version: u16,
    /// Chain identifier, fixed per network.
    pub chain_id: u32,
    /// Block height in the chain.
    pub height: u64,
    /// Hash of the parent block (creates the chain linkage).
    pub parent_hash: Hash,
    /// Root hash of the state trie after applying this block.
    pub state_root: Hash,
    /// Unix timestamp (seconds) when the block was minted.
    pub timestamp: i64,
    /// The validator who minted this block.
    pub proposer: PublicKey,
}

impl BlockHeader {
    /// Compute the header digest. This is the block's identity.
    pub fn digest(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.version.to_le_bytes());
        hasher.update(&self.chain_id.to_le_bytes());
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&self.parent_hash);
        hasher.update(&self.state_root);
        hasher.update(&self.timestamp.to_le_bytes());
        hasher.update(&self.proposer);
        *hasher.finalize().as_bytes()
    }
}

/// A block as it travels between nodes.
///
/// The body is opaque at this layer; execution and payload semantics live
/// behind the consensus and chain gateways. Two blocks are equal iff their
/// header digests are equal.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Proposer's signature over the header digest.
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
    /// Serialized payload (transactions etc.), opaque here.
    pub body: Vec<u8>,
}

impl Block {
    /// Assemble a block from its parts.
    pub fn new(header: BlockHeader, signature: Signature, body: Vec<u8>) -> Self {
        Self {
            header,
            signature,
            body,
        }
    }

    /// The block's hash (header digest).
    pub fn hash(&self) -> Hash {
        self.header.digest()
    }

    /// Parent block hash.
    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    /// Block height.
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Mint timestamp in Unix seconds.
    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    /// Encode the block into its wire form.
    pub fn to_wire(&self) -> Result<Vec<u8>, WireError> {
        wire::to_wire_bytes(self)
    }

    /// Decode a block from its wire form.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, WireError> {
        wire::from_wire_bytes(bytes)
    }

    /// Round-trip the block through its wire form.
    ///
    /// Guarantees the result carries exactly what a peer would have
    /// received, stripping any caller-side transient state.
    pub fn normalise_via_wire(&self) -> Result<Self, WireError> {
        Self::from_wire(&self.to_wire()?)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Block {}

/// Abbreviated hex rendering of a hash for log output.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..8])
}
