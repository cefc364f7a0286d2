//! The active catch-up task.
//!
//! One task exists at a time (enforced by the service). It broadcasts a
//! sync request, accepts the first structurally valid chunk advertisement,
//! fetches chunk bodies sequentially from the advertising peer and feeds
//! the recovered blocks through the admission sink. A window that comes
//! back empty means the gap has closed and the task reports success on its
//! status channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use kronos_telemetry::{SYNC_ACTIVE_TASKS_STARTED, SYNC_CHUNKS_APPLIED};
use shared_net::{InboundMessage, MessageKind, MessagePriority, NetworkService};
use shared_types::{from_wire_bytes, short_hex, to_wire_bytes, PeerId};

use crate::config::SyncConfig;
use crate::events::{ChunkData, ChunkHeader, ChunkHeaders, SyncError, SyncRequest};
use crate::ports::outbound::{BlockSink, ChainView};

/// Handle to the running task, held by the service.
pub struct ActiveTask {
    message_tx: mpsc::Sender<InboundMessage>,
    status_rx: Option<mpsc::Receiver<Result<(), SyncError>>>,
    stop: watch::Sender<bool>,
}

impl ActiveTask {
    /// Spawn the task loop.
    pub fn start(
        chain: Arc<dyn ChainView>,
        network: Arc<dyn NetworkService>,
        sink: Arc<dyn BlockSink>,
        config: SyncConfig,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::channel(config.task_channel_capacity.max(1));
        let (status_tx, status_rx) = mpsc::channel(1);
        let (stop, stop_rx) = watch::channel(false);

        let driver = TaskDriver {
            chain,
            network,
            sink,
            config,
            plan: None,
        };
        tokio::spawn(driver.run(message_rx, stop_rx, status_tx));
        SYNC_ACTIVE_TASKS_STARTED.inc();

        Self {
            message_tx,
            status_rx: Some(status_rx),
            stop,
        }
    }

    /// Forward a chunk-header advertisement to the task loop.
    pub fn process_chunk_headers(&self, message: InboundMessage) {
        self.forward(message);
    }

    /// Forward a chunk body to the task loop.
    pub fn process_chunk_data(&self, message: InboundMessage) {
        self.forward(message);
    }

    fn forward(&self, message: InboundMessage) {
        if self.message_tx.try_send(message).is_err() {
            debug!("Task channel full or closed, message dropped");
        }
    }

    /// Ask the task loop to return without a terminal status.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    pub(crate) fn take_status_receiver(
        &mut self,
    ) -> Option<mpsc::Receiver<Result<(), SyncError>>> {
        self.status_rx.take()
    }
}

struct SyncPlan {
    headers: Vec<ChunkHeader>,
    peer: PeerId,
    next: usize,
}

enum StepOutcome {
    /// Forward progress; the retry budget resets.
    Progress,
    /// Message ignored; the retry clock keeps running.
    Ignored,
    /// Terminal status for the task.
    Finished(Result<(), SyncError>),
}

struct TaskDriver {
    chain: Arc<dyn ChainView>,
    network: Arc<dyn NetworkService>,
    sink: Arc<dyn BlockSink>,
    config: SyncConfig,
    plan: Option<SyncPlan>,
}

impl TaskDriver {
    async fn run(
        mut self,
        mut messages: mpsc::Receiver<InboundMessage>,
        mut stop: watch::Receiver<bool>,
        status_tx: mpsc::Sender<Result<(), SyncError>>,
    ) {
        info!("Started active sync task");
        self.broadcast_sync_request();

        let period = Duration::from_secs(self.config.request_timeout_secs.max(1));
        let mut tick = tokio::time::interval(period);
        tick.tick().await; // arm: the first interval tick fires immediately
        let mut retries = 0u32;

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow_and_update() {
                        info!("Stopped active sync task");
                        return;
                    }
                }
                _ = tick.tick() => {
                    retries += 1;
                    if retries > self.config.max_request_retries {
                        warn!("Active sync ran out of retries");
                        let _ = status_tx.send(Err(SyncError::SyncTimeout)).await;
                        return;
                    }
                    debug!(retries, "No sync progress, re-sending current request");
                    self.resend_current();
                }
                Some(message) = messages.recv() => {
                    let outcome = match message.kind {
                        MessageKind::ChainChunks => self.on_chunk_headers(message),
                        MessageKind::ChainChunkData => self.on_chunk_data(message),
                        other => {
                            debug!(kind = other.as_str(), "Unexpected message in sync task");
                            StepOutcome::Ignored
                        }
                    };
                    match outcome {
                        StepOutcome::Finished(status) => {
                            let _ = status_tx.send(status).await;
                            return;
                        }
                        StepOutcome::Progress => {
                            retries = 0;
                            tick.reset();
                        }
                        StepOutcome::Ignored => {}
                    }
                }
            }
        }
    }

    fn on_chunk_headers(&mut self, message: InboundMessage) -> StepOutcome {
        if self.plan.is_some() {
            debug!("Chunk plan already in flight, ignoring advertisement");
            return StepOutcome::Ignored;
        }

        let advert: ChunkHeaders = match from_wire_bytes(&message.data) {
            Ok(advert) => advert,
            Err(e) => {
                debug!(error = %e, "Failed to decode chunk advertisement");
                return StepOutcome::Ignored;
            }
        };

        if advert.headers.is_empty() {
            info!("Nothing left to chunk, active sync complete");
            return StepOutcome::Finished(Ok(()));
        }

        if !advert.headers.iter().all(ChunkHeader::verify_root) {
            debug!(peer = %short_hex(&message.from.0), "Advertisement failed root check");
            return StepOutcome::Ignored;
        }

        let first = advert.headers[0].clone();
        info!(
            chunks = advert.headers.len(),
            peer = %short_hex(&message.from.0),
            "Accepted chunk plan"
        );
        self.plan = Some(SyncPlan {
            headers: advert.headers,
            peer: message.from,
            next: 0,
        });
        self.request_chunk(&first, message.from);
        StepOutcome::Progress
    }

    fn on_chunk_data(&mut self, message: InboundMessage) -> StepOutcome {
        let (peer, next, total, expected_root) = match self.plan.as_ref() {
            Some(plan) => (
                plan.peer,
                plan.next,
                plan.headers.len(),
                plan.headers[plan.next].root_hash,
            ),
            None => {
                debug!("Chunk body without a plan, ignoring");
                return StepOutcome::Ignored;
            }
        };

        if message.from != peer {
            debug!(peer = %short_hex(&message.from.0), "Chunk body from an unexpected peer");
            return StepOutcome::Ignored;
        }

        let data: ChunkData = match from_wire_bytes(&message.data) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "Failed to decode chunk body");
                return StepOutcome::Ignored;
            }
        };

        if data.header.root_hash != expected_root {
            debug!("Chunk body does not fill the expected header");
            return StepOutcome::Ignored;
        }

        let blocks = match data.verify_blocks() {
            Ok(blocks) => blocks,
            Err(e) => {
                debug!(error = %e, "Chunk body failed verification");
                return StepOutcome::Ignored;
            }
        };

        for block in blocks {
            let hash = block.hash();
            if let Err(e) = self.sink.push(block) {
                debug!(hash = %short_hex(&hash), error = %e, "Chunk block was not admitted");
            }
        }
        SYNC_CHUNKS_APPLIED.inc();

        if next + 1 < total {
            let header = self
                .plan
                .as_ref()
                .and_then(|plan| plan.headers.get(next + 1).cloned());
            if let Some(plan) = self.plan.as_mut() {
                plan.next = next + 1;
            }
            if let Some(header) = header {
                self.request_chunk(&header, peer);
            }
        } else {
            info!(chunks = total, "Chunk window applied, asking for the next window");
            self.plan = None;
            self.broadcast_sync_request();
        }
        StepOutcome::Progress
    }

    fn resend_current(&self) {
        match self.plan.as_ref() {
            Some(plan) => {
                if let Some(header) = plan.headers.get(plan.next) {
                    self.request_chunk(header, plan.peer);
                }
            }
            None => self.broadcast_sync_request(),
        }
    }

    fn broadcast_sync_request(&self) {
        let request = SyncRequest {
            tail_block_hash: self.chain.tail_block().hash(),
        };
        match to_wire_bytes(&request) {
            Ok(bytes) => {
                self.network
                    .broadcast(MessageKind::ChainSync, bytes, MessagePriority::Low);
                debug!(tail = %short_hex(&request.tail_block_hash), "Requested chunk headers");
            }
            Err(e) => debug!(error = %e, "Failed to encode sync request"),
        }
    }

    fn request_chunk(&self, header: &ChunkHeader, peer: PeerId) {
        match to_wire_bytes(header) {
            Ok(bytes) => {
                self.network
                    .send_to_peer(MessageKind::ChainGetChunk, bytes, peer, MessagePriority::Low);
            }
            Err(e) => debug!(error = %e, "Failed to encode chunk request"),
        }
    }
}
