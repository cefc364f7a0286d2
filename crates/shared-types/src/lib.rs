//! # Shared Types Crate
//!
//! Cross-subsystem domain entities for Kronos-Chain: hashes, signatures,
//! peer identity, the `Block`/`BlockHeader` pair, and the wire codec every
//! subsystem uses to put records on the network.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-subsystem types are defined here.
//! - **Hash Identity**: blocks compare equal iff their header hashes are equal.
//! - **Wire Normalisation**: anything ingested from the network (or about to
//!   be treated as if it came from the network) goes through the bincode
//!   round-trip in [`wire`], so in-memory-only state never leaks into a
//!   subsystem's input.

pub mod entities;
pub mod test_utils;
pub mod wire;

pub use entities::{short_hex, Block, BlockHeader, Hash, NodeId, PeerId, PublicKey, Signature};
pub use wire::{from_wire_bytes, to_wire_bytes, WireError};
