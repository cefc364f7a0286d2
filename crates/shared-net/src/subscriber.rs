//! Subscriber registration for the typed message surface.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use crate::message::{InboundMessage, MessageKind, MessagePriority};

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// A registered consumer of one or more message kinds.
///
/// Delivery never blocks the network side: a full channel drops the message
/// (the transport applies its own backpressure upstream of this point).
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    kinds: Vec<MessageKind>,
    sender: mpsc::Sender<InboundMessage>,
    relayable: bool,
    priority: MessagePriority,
}

impl Subscriber {
    /// Register interest in `kinds`, delivered into `sender`.
    ///
    /// `relayable` marks kinds the network may forward onward on the
    /// subscriber's behalf; `priority` is the weight the transport assigns
    /// to this subscription's traffic.
    pub fn new(
        kinds: Vec<MessageKind>,
        sender: mpsc::Sender<InboundMessage>,
        relayable: bool,
        priority: MessagePriority,
    ) -> Self {
        Self {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            kinds,
            sender,
            relayable,
            priority,
        }
    }

    /// Unique id, used for deregistration.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this subscriber consumes the given kind.
    pub fn matches(&self, kind: MessageKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Whether the network may relay this subscription's kinds onward.
    pub fn relayable(&self) -> bool {
        self.relayable
    }

    /// Subscription traffic weight.
    pub fn priority(&self) -> MessagePriority {
        self.priority
    }

    /// Deliver a message; returns false when the channel was full or closed.
    pub fn deliver(&self, message: InboundMessage) -> bool {
        let kind = message.kind;
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                debug!(kind = kind.as_str(), error = %e, "Dropped inbound message");
                false
            }
        }
    }
}
