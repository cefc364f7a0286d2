//! # Block Admission Subsystem (kc-01)
//!
//! Ingests candidate blocks arriving from the network — fresh gossip and
//! replies to historical download requests — links them into a partial
//! forest of pending ancestry, verifies them against the canonical chain and
//! promotes confirmed subtrees, falling back to per-block download or bulk
//! chunk sync when the node is behind.
//!
//! ## Architecture Role
//!
//! ```text
//!            NewBlock / DownloadReply          DownloadRequest
//!                      │                             │
//!                      ▼                             ▼
//!               [block channel]              [download channel]
//!                      └────────── event loop ───────┘
//!                                     │
//!                              BlockPoolService
//!                      ┌──────────────┼────────────────┐
//!                      ▼              ▼                ▼
//!               PendingForest   ChainGateway   ConsensusGateway
//!               (LRU arena +    (store, tail,  (integrity, execution,
//!                slot index)     promotion)     fork choice)
//! ```
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - the pending forest, its graph nodes, admission invariants
//! - `ports/` - inbound admission API, outbound chain/consensus gateways
//! - `events/` - error sentinels and wire records
//! - `service.rs` - the application service owning the admission algorithm

pub mod config;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

pub use config::AdmissionConfig;
pub use domain::forest::PendingForest;
pub use domain::linked_block::LinkedBlock;
pub use events::{AdmissionError, DownloadRequest};
pub use ports::inbound::BlockAdmissionApi;
pub use ports::outbound::{ChainGateway, ConsensusGateway};
pub use service::BlockPoolService;
