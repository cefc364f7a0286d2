//! Message taxonomy for the node's typed pub/sub surface.

use serde::{Deserialize, Serialize};
use shared_types::PeerId;

/// Every message kind a subsystem can subscribe to or emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// A freshly minted block, gossiped across the network.
    NewBlock,
    /// Request for a single historical block (carries hash + signature).
    DownloadRequest,
    /// Reply to a download request (carries the parent block's wire form).
    DownloadReply,
    /// Request for chunk headers starting at the sender's tail.
    ChainSync,
    /// Advertised chunk headers.
    ChainChunks,
    /// Request for one chunk body.
    ChainGetChunk,
    /// One chunk body (headers + blocks).
    ChainChunkData,
}

impl MessageKind {
    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewBlock => "new_block",
            Self::DownloadRequest => "download_request",
            Self::DownloadReply => "download_reply",
            Self::ChainSync => "chain_sync",
            Self::ChainChunks => "chain_chunks",
            Self::ChainGetChunk => "chain_get_chunk",
            Self::ChainChunkData => "chain_chunk_data",
        }
    }
}

/// Send priority, highest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessagePriority {
    /// Consensus-critical traffic (fresh blocks).
    High,
    /// Directed request/response traffic.
    Normal,
    /// Bulk transfer (chunk bodies).
    Low,
    /// Subscription-side marker for handlers that do their own pacing.
    Zero,
}

/// A message delivered to a subscriber.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Which kind of record the payload is.
    pub kind: MessageKind,
    /// The peer the message came from.
    pub from: PeerId,
    /// Raw wire payload.
    pub data: Vec<u8>,
}

impl InboundMessage {
    /// Assemble an inbound message.
    pub fn new(kind: MessageKind, from: PeerId, data: Vec<u8>) -> Self {
        Self { kind, from, data }
    }
}
