//! Wire records owned by block admission.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_types::{Hash, Signature};

/// Request for a single historical block.
///
/// Carries the hash of a block the requester already holds together with
/// that block's signature; the responder replies with the block's *parent*.
/// The signature doubles as the authorisation gate on the responder side.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Hash of the block whose parent is wanted.
    pub hash: Hash,
    /// Signature of that block, as the requester received it.
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}
