//! # Shared Crypto
//!
//! Cryptographic primitives used across Kronos-Chain subsystems.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | BLAKE3 | Block and chunk digests |
//! | `signatures` | Ed25519 | Block signatures, node identity |
//! | `keyfile` | hex seed file | Node identity persistence |
//!
//! ## Security Properties
//!
//! - **Ed25519**: deterministic nonces, no RNG dependency at signing time
//! - **BLAKE3**: SIMD-accelerated, keyed and derive-key modes available

#![warn(missing_docs)]

pub mod errors;
pub mod hashing;
pub mod keyfile;
pub mod signatures;

pub use errors::CryptoError;
pub use hashing::{blake3_hash, blake3_hash_many, Blake3Hasher};
pub use keyfile::{load_keypair, write_keypair, DEFAULT_KEY_PATH};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
