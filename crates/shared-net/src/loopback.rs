//! In-process network hub.
//!
//! Wires the subscribers of connected hubs directly together, so multi-node
//! behaviour can be exercised without a transport. Outbound traffic is also
//! recorded for inspection, which is what the subsystem test suites assert
//! against.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use shared_types::PeerId;
use tracing::debug;

use crate::message::{InboundMessage, MessageKind, MessagePriority};
use crate::service::NetworkService;
use crate::subscriber::Subscriber;

/// A record of one outbound send.
#[derive(Clone, Debug)]
pub struct SentRecord {
    /// Message kind sent.
    pub kind: MessageKind,
    /// Target peer; `None` for relay/broadcast.
    pub peer: Option<PeerId>,
    /// Priority the send was issued at.
    pub priority: MessagePriority,
    /// Wire payload.
    pub data: Vec<u8>,
}

/// A record of one peer disconnection.
#[derive(Clone, Debug)]
pub struct ClosedPeer {
    /// The disconnected peer.
    pub peer: PeerId,
    /// Reason given by the caller.
    pub reason: String,
}

/// In-process [`NetworkService`] implementation.
pub struct LoopbackNetwork {
    local_id: PeerId,
    subscribers: RwLock<Vec<Subscriber>>,
    peers: RwLock<HashMap<PeerId, Weak<LoopbackNetwork>>>,
    sent: Mutex<Vec<SentRecord>>,
    closed: Mutex<Vec<ClosedPeer>>,
}

impl LoopbackNetwork {
    /// Create a hub identifying itself as `local_id`.
    pub fn new(local_id: PeerId) -> Arc<Self> {
        Arc::new(Self {
            local_id,
            subscribers: RwLock::new(Vec::new()),
            peers: RwLock::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
        })
    }

    /// Connect two hubs bidirectionally.
    pub fn link(a: &Arc<Self>, b: &Arc<Self>) {
        a.peers.write().insert(b.local_id, Arc::downgrade(b));
        b.peers.write().insert(a.local_id, Arc::downgrade(a));
    }

    /// This hub's peer id.
    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    /// Snapshot of everything sent through this hub.
    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().clone()
    }

    /// Snapshot of peers closed by this hub.
    pub fn closed_peers(&self) -> Vec<ClosedPeer> {
        self.closed.lock().clone()
    }

    /// Push a message into this hub's matching subscribers.
    pub fn deliver(&self, message: InboundMessage) {
        for subscriber in self.subscribers.read().iter() {
            if subscriber.matches(message.kind) {
                subscriber.deliver(message.clone());
            }
        }
    }

    fn deliver_to(&self, peer: PeerId, kind: MessageKind, data: &[u8]) {
        let remote = self.peers.read().get(&peer).and_then(Weak::upgrade);
        match remote {
            Some(remote) => remote.deliver(InboundMessage::new(kind, self.local_id, data.to_vec())),
            None => debug!(kind = kind.as_str(), "No such peer, send dropped"),
        }
    }

    fn deliver_to_all(&self, kind: MessageKind, data: &[u8]) {
        let targets: Vec<Arc<LoopbackNetwork>> =
            self.peers.read().values().filter_map(Weak::upgrade).collect();
        for remote in targets {
            remote.deliver(InboundMessage::new(kind, self.local_id, data.to_vec()));
        }
    }
}

impl NetworkService for LoopbackNetwork {
    fn register(&self, subscriber: Subscriber) {
        self.subscribers.write().push(subscriber);
    }

    fn deregister(&self, subscriber_id: u64) {
        self.subscribers.write().retain(|s| s.id() != subscriber_id);
    }

    fn send_to_peer(
        &self,
        kind: MessageKind,
        data: Vec<u8>,
        peer: PeerId,
        priority: MessagePriority,
    ) {
        self.sent.lock().push(SentRecord {
            kind,
            peer: Some(peer),
            priority,
            data: data.clone(),
        });
        self.deliver_to(peer, kind, &data);
    }

    fn relay(&self, kind: MessageKind, data: Vec<u8>, priority: MessagePriority) {
        // Loopback keeps no per-message origin, so relay fans out like
        // broadcast; the real transport excludes the originating peer.
        self.sent.lock().push(SentRecord {
            kind,
            peer: None,
            priority,
            data: data.clone(),
        });
        self.deliver_to_all(kind, &data);
    }

    fn broadcast(&self, kind: MessageKind, data: Vec<u8>, priority: MessagePriority) {
        self.sent.lock().push(SentRecord {
            kind,
            peer: None,
            priority,
            data: data.clone(),
        });
        self.deliver_to_all(kind, &data);
    }

    fn close_peer(&self, peer: PeerId, reason: String) {
        debug!(reason = %reason, "Closing peer");
        self.peers.write().remove(&peer);
        self.closed.lock().push(ClosedPeer { peer, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::NodeId;
    use tokio::sync::mpsc;

    fn peer(n: u8) -> PeerId {
        NodeId::new([n; 32])
    }

    #[tokio::test]
    async fn test_send_to_peer_reaches_remote_subscriber() {
        let a = LoopbackNetwork::new(peer(1));
        let b = LoopbackNetwork::new(peer(2));
        LoopbackNetwork::link(&a, &b);

        let (tx, mut rx) = mpsc::channel(4);
        b.register(Subscriber::new(
            vec![MessageKind::DownloadRequest],
            tx,
            false,
            MessagePriority::Zero,
        ));

        a.send_to_peer(
            MessageKind::DownloadRequest,
            vec![9],
            peer(2),
            MessagePriority::Normal,
        );

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.kind, MessageKind::DownloadRequest);
        assert_eq!(msg.from, peer(1));
        assert_eq!(msg.data, vec![9]);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_peers() {
        let a = LoopbackNetwork::new(peer(1));
        let b = LoopbackNetwork::new(peer(2));
        let c = LoopbackNetwork::new(peer(3));
        LoopbackNetwork::link(&a, &b);
        LoopbackNetwork::link(&a, &c);

        let (tx_b, mut rx_b) = mpsc::channel(4);
        let (tx_c, mut rx_c) = mpsc::channel(4);
        b.register(Subscriber::new(
            vec![MessageKind::NewBlock],
            tx_b,
            true,
            MessagePriority::High,
        ));
        c.register(Subscriber::new(
            vec![MessageKind::NewBlock],
            tx_c,
            true,
            MessagePriority::High,
        ));

        a.broadcast(MessageKind::NewBlock, vec![7], MessagePriority::High);

        assert_eq!(rx_b.recv().await.unwrap().data, vec![7]);
        assert_eq!(rx_c.recv().await.unwrap().data, vec![7]);
    }

    #[tokio::test]
    async fn test_close_peer_stops_delivery() {
        let a = LoopbackNetwork::new(peer(1));
        let b = LoopbackNetwork::new(peer(2));
        LoopbackNetwork::link(&a, &b);

        let (tx, mut rx) = mpsc::channel(4);
        b.register(Subscriber::new(
            vec![MessageKind::ChainSync],
            tx,
            false,
            MessagePriority::Zero,
        ));

        a.close_peer(peer(2), "protocol violation".to_string());
        a.send_to_peer(MessageKind::ChainSync, vec![1], peer(2), MessagePriority::Low);

        assert!(rx.try_recv().is_err());
        let closed = a.closed_peers();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].peer, peer(2));
    }

    #[tokio::test]
    async fn test_deregister_removes_subscriber() {
        let a = LoopbackNetwork::new(peer(1));
        let (tx, mut rx) = mpsc::channel(4);
        let sub = Subscriber::new(vec![MessageKind::NewBlock], tx, true, MessagePriority::High);
        let id = sub.id();
        a.register(sub);

        a.deliver(InboundMessage::new(MessageKind::NewBlock, peer(9), vec![1]));
        assert!(rx.recv().await.is_some());

        a.deregister(id);
        a.deliver(InboundMessage::new(MessageKind::NewBlock, peer(9), vec![2]));
        assert!(rx.try_recv().is_err());
    }
}
