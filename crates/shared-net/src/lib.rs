//! # Shared Net
//!
//! The typed network-service abstraction consumed by the block admission and
//! chain sync subsystems. The transport itself (peer dialing, framing,
//! scoring) lives outside this workspace; subsystems only ever see:
//!
//! - a [`MessageKind`] taxonomy and [`MessagePriority`] levels,
//! - [`Subscriber`] registration feeding bounded tokio channels,
//! - the [`NetworkService`] trait for directed send / relay / broadcast /
//!   peer-close,
//! - [`LoopbackNetwork`], an in-process implementation wiring subscribers of
//!   connected hubs together for tests and single-process deployments.

pub mod loopback;
pub mod message;
pub mod service;
pub mod subscriber;

pub use loopback::{ClosedPeer, LoopbackNetwork, SentRecord};
pub use message::{InboundMessage, MessageKind, MessagePriority};
pub use service::NetworkService;
pub use subscriber::Subscriber;
