//! # Chain Sync Subsystem (kc-02)
//!
//! Single-flight bulk catch-up over the chunk protocol. The service owns
//! one event loop dispatching the four sync message kinds; at most one
//! active [`task::ActiveTask`] drives the chunk download to completion and
//! feeds recovered blocks through the block admission sink.
//!
//! ## Architecture Role
//!
//! ```text
//!   ChainSync ───────┐                       ┌── serve via ChunkProvider
//!   ChainGetChunk ───┤   SyncService loop ───┤   (only while NOT syncing)
//!   ChainChunks ─────┤                       └── forward to ActiveTask
//!   ChainChunkData ──┘                           (ignored when none)
//! ```
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `events/` - sync errors and chunk wire records
//! - `ports/` - inbound sync API, outbound chunk/chain/sink gateways
//! - `service.rs` - the dispatch loop and single-flight task slot
//! - `task.rs` - the active catch-up task

pub mod config;
pub mod events;
pub mod ports;
pub mod service;
pub mod task;

pub use config::SyncConfig;
pub use events::{ChunkData, ChunkHeader, ChunkHeaders, SyncError, SyncRequest};
pub use ports::inbound::SyncApi;
pub use ports::outbound::{BlockSink, ChainView, ChunkProvider};
pub use service::SyncService;
pub use task::ActiveTask;
