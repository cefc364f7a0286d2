//! The network-service port consumed by subsystems.

use shared_types::PeerId;

use crate::message::{MessageKind, MessagePriority};
use crate::subscriber::Subscriber;

/// Typed network surface.
///
/// Implemented by the real transport outside this workspace and by
/// [`crate::LoopbackNetwork`] for in-process wiring. All operations are
/// fire-and-forget from the caller's point of view; failures are the
/// transport's to report through its own channels.
pub trait NetworkService: Send + Sync {
    /// Register a subscriber for its message kinds.
    fn register(&self, subscriber: Subscriber);

    /// Remove a previously registered subscriber by id.
    fn deregister(&self, subscriber_id: u64);

    /// Send a record to one peer.
    fn send_to_peer(&self, kind: MessageKind, data: Vec<u8>, peer: PeerId, priority: MessagePriority);

    /// Forward a record onward to current peers (minus its origin).
    fn relay(&self, kind: MessageKind, data: Vec<u8>, priority: MessagePriority);

    /// Send a record to every current peer.
    fn broadcast(&self, kind: MessageKind, data: Vec<u8>, priority: MessagePriority);

    /// Disconnect a peer for protocol violation, with a reason for the log.
    fn close_peer(&self, peer: PeerId, reason: String);
}
