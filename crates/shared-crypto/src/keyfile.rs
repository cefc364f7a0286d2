//! Node identity key persistence.
//!
//! The private key is marshalled as a hex-encoded seed in a plain file. A
//! node's id is derived from the public key, so an existing key file must
//! never be replaced silently: that would change the node's identity.

use std::fs;
use std::path::Path;

use zeroize::Zeroize;

use crate::errors::CryptoError;
use crate::signatures::Ed25519KeyPair;

/// Default location of the node identity key.
pub const DEFAULT_KEY_PATH: &str = "conf/network.key";

/// Write a keypair's marshalled private key to `path`.
///
/// Fails with [`CryptoError::KeyFileExists`] when the path already holds a
/// key, to keep the node id stable across reprovisioning.
pub fn write_keypair(keypair: &Ed25519KeyPair, path: &Path) -> Result<(), CryptoError> {
    if path.exists() {
        return Err(CryptoError::KeyFileExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CryptoError::KeyFile(e.to_string()))?;
        }
    }
    let mut encoded = hex::encode(keypair.seed_bytes());
    let result = fs::write(path, encoded.as_bytes());
    encoded.zeroize();
    result.map_err(|e| CryptoError::KeyFile(e.to_string()))
}

/// Load a keypair from a marshalled private key file.
pub fn load_keypair(path: &Path) -> Result<Ed25519KeyPair, CryptoError> {
    let encoded = fs::read_to_string(path).map_err(|e| CryptoError::KeyFile(e.to_string()))?;
    let mut raw = hex::decode(encoded.trim()).map_err(|_| CryptoError::InvalidPrivateKey)?;
    if raw.len() != 32 {
        raw.zeroize();
        return Err(CryptoError::InvalidPrivateKey);
    }
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&raw);
    raw.zeroize();
    let keypair = Ed25519KeyPair::from_seed(seed);
    seed.zeroize();
    Ok(keypair)
}
