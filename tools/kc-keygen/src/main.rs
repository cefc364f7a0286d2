//! KC-Keygen: node identity key provisioning.
//!
//! Generates an Ed25519 keypair and writes the marshalled private key to
//! the given path. An existing key is never replaced — the node id is
//! derived from the key, and a seed node's id must stay stable.

use std::path::PathBuf;

use clap::Parser;

use shared_crypto::{load_keypair, write_keypair, CryptoError, Ed25519KeyPair, DEFAULT_KEY_PATH};

/// Generate a private key for a network node.
#[derive(Parser, Debug)]
#[command(name = "kc-keygen")]
#[command(about = "Generate an Ed25519 private key for node identity")]
struct Args {
    /// Where to write the marshalled private key.
    #[arg(default_value = DEFAULT_KEY_PATH)]
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let keypair = Ed25519KeyPair::generate();

    match write_keypair(&keypair, &args.path) {
        Ok(()) => {
            println!("private key: {}", args.path.display());
            println!("node id:     {}", hex::encode(keypair.public_key().as_bytes()));
        }
        Err(CryptoError::KeyFileExists(_)) => {
            let existing = load_keypair(&args.path)?;
            println!("key already exists, keeping it: {}", args.path.display());
            println!("node id:     {}", hex::encode(existing.public_key().as_bytes()));
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
