//! Inbound ports (API) for block admission.

use shared_types::{Block, PeerId};

use crate::events::AdmissionError;

/// Primary admission API.
///
/// All three variants normalise the block through its wire form before
/// admission, so the admitted object carries exactly what a peer would have
/// received.
pub trait BlockAdmissionApi: Send + Sync {
    /// Local path, no sender. Benign rejections are swallowed.
    fn push(&self, block: Block) -> Result<(), AdmissionError>;

    /// Network path: admit and, when the block attaches to the chain, relay
    /// it onward.
    fn push_and_relay(&self, sender: PeerId, block: Block) -> Result<(), AdmissionError>;

    /// Local mint path: broadcast first, then admit.
    fn push_and_broadcast(&self, block: Block) -> Result<(), AdmissionError>;
}
