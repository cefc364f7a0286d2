//! # BLAKE3 Hashing
//!
//! Content hashing for blocks and chunk commitments.

use blake3::Hasher;

/// BLAKE3 hash output (256-bit).
pub type Hash = [u8; 32];

/// Stateful BLAKE3 hasher.
pub struct Blake3Hasher {
    inner: Hasher,
}

impl Blake3Hasher {
    /// Create new hasher.
    pub fn new() -> Self {
        Self {
            inner: Hasher::new(),
        }
    }

    /// Update with data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and return hash.
    pub fn finalize(&self) -> Hash {
        *self.inner.finalize().as_bytes()
    }
}

impl Default for Blake3Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash data with BLAKE3 (one-shot).
pub fn blake3_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple inputs as one stream.
///
/// Used for chunk root commitments: the root of a chunk is the hash of the
/// concatenated block hashes it advertises.
pub fn blake3_hash_many(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Blake3Hasher::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        assert_eq!(blake3_hash(b"test"), blake3_hash(b"test"));
    }

    #[test]
    fn test_different_inputs() {
        assert_ne!(blake3_hash(b"input1"), blake3_hash(b"input2"));
    }

    #[test]
    fn test_hash_many_matches_stream() {
        let oneshot = blake3_hash(b"hello world");
        let many = blake3_hash_many(&[b"hello ", b"world"]);
        assert_eq!(oneshot, many);
    }
}
