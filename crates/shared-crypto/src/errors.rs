//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key material
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Key file could not be read or written
    #[error("Key file error: {0}")]
    KeyFile(String),

    /// Key file exists and would be overwritten
    #[error("Key file already exists: {0}")]
    KeyFileExists(String),
}
