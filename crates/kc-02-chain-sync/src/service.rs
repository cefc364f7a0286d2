//! Sync service implementation.
//!
//! One loop dispatching the four sync message kinds. A node that is
//! actively syncing never serves sync requests itself; chunk traffic for
//! the active task is forwarded, everything else is answered from the
//! chunk provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use kronos_telemetry::SYNC_MESSAGE_CHANNEL_DEPTH;
use shared_net::{InboundMessage, MessageKind, MessagePriority, NetworkService, Subscriber};
use shared_types::{from_wire_bytes, short_hex, to_wire_bytes, PeerId};

use crate::config::SyncConfig;
use crate::events::{ChunkData, ChunkHeader, ChunkHeaders, SyncError, SyncRequest};
use crate::ports::inbound::SyncApi;
use crate::ports::outbound::{BlockSink, ChainView, ChunkProvider};
use crate::task::ActiveTask;

/// Manages sync tasks and serves the chunk protocol to peers.
pub struct SyncService {
    config: SyncConfig,
    chain: Arc<dyn ChainView>,
    chunk: Arc<dyn ChunkProvider>,
    sink: Arc<dyn BlockSink>,
    network: Arc<dyn NetworkService>,
    message_tx: mpsc::Sender<InboundMessage>,
    message_rx: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
    subscriber_ids: Mutex<Vec<u64>>,
    active_task: Mutex<Option<ActiveTask>>,
    shutdown: watch::Sender<bool>,
}

impl SyncService {
    /// Create a sync service.
    pub fn new(
        config: SyncConfig,
        chain: Arc<dyn ChainView>,
        chunk: Arc<dyn ChunkProvider>,
        sink: Arc<dyn BlockSink>,
        network: Arc<dyn NetworkService>,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::channel(config.message_channel_capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            chain,
            chunk,
            sink,
            network,
            message_tx,
            message_rx: Mutex::new(Some(message_rx)),
            subscriber_ids: Mutex::new(Vec::new()),
            active_task: Mutex::new(None),
            shutdown,
        }
    }

    /// Register the four sync message kinds and launch the loop.
    pub fn start(self: &Arc<Self>) {
        info!("Starting sync service");

        let subscriptions = [
            (MessageKind::ChainSync, MessagePriority::Zero),
            (MessageKind::ChainChunks, MessagePriority::Normal),
            (MessageKind::ChainGetChunk, MessagePriority::Zero),
            (MessageKind::ChainChunkData, MessagePriority::Normal),
        ];
        let mut ids = self.subscriber_ids.lock();
        for (kind, priority) in subscriptions {
            let subscriber =
                Subscriber::new(vec![kind], self.message_tx.clone(), false, priority);
            ids.push(subscriber.id());
            self.network.register(subscriber);
        }
        drop(ids);

        let service = Arc::clone(self);
        tokio::spawn(async move { service.run().await });
    }

    /// Deregister, stop the active task and terminate the loop.
    pub fn stop(&self) {
        info!("Stopping sync service");
        for id in self.subscriber_ids.lock().drain(..) {
            self.network.deregister(id);
        }
        self.stop_active_sync();
        let _ = self.shutdown.send(true);
    }

    async fn run(&self) {
        let Some(mut messages) = self.message_rx.lock().take() else {
            warn!("Sync service loop is already running");
            return;
        };
        let mut shutdown = self.shutdown.subscribe();
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        info!("Started sync service");

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    SYNC_MESSAGE_CHANNEL_DEPTH.set(messages.len() as f64);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        self.stop_active_sync();
                        info!("Stopped sync service");
                        return;
                    }
                }
                Some(message) = messages.recv() => self.dispatch(message),
            }
        }
    }

    fn dispatch(&self, message: InboundMessage) {
        match message.kind {
            MessageKind::ChainSync => self.on_chain_sync(message),
            MessageKind::ChainGetChunk => self.on_chain_get_chunk(message),
            MessageKind::ChainChunks | MessageKind::ChainChunkData => {
                self.forward_to_task(message)
            }
            other => debug!(kind = other.as_str(), "Received unknown message"),
        }
    }

    /// Answer a header request, unless we are busy syncing ourselves.
    fn on_chain_sync(&self, message: InboundMessage) {
        if self.is_active_syncing() {
            return;
        }

        let request: SyncRequest = match from_wire_bytes(&message.data) {
            Ok(request) => request,
            Err(e) => {
                debug!(peer = %short_hex(&message.from.0), error = %e, "Invalid ChainSync message data");
                self.network.close_peer(
                    message.from,
                    SyncError::InvalidChainSyncMessageData.to_string(),
                );
                return;
            }
        };

        let headers = match self.chunk.generate_chunk_headers(&request.tail_block_hash) {
            Ok(headers) => headers,
            // Too small a gap is not a protocol violation; answer empty.
            Err(SyncError::TooSmallGapToSync) => ChunkHeaders::default(),
            Err(e) => {
                debug!(
                    peer = %short_hex(&message.from.0),
                    tail = %short_hex(&request.tail_block_hash),
                    error = %e,
                    "Failed to generate chunk headers"
                );
                return;
            }
        };

        self.send_chunk_headers(message.from, &headers);
    }

    /// Answer a chunk body request, unless we are busy syncing ourselves.
    fn on_chain_get_chunk(&self, message: InboundMessage) {
        if self.is_active_syncing() {
            return;
        }

        let header: ChunkHeader = match from_wire_bytes(&message.data) {
            Ok(header) => header,
            Err(e) => {
                debug!(peer = %short_hex(&message.from.0), error = %e, "Invalid ChainGetChunk message data");
                self.network.close_peer(
                    message.from,
                    SyncError::InvalidChainGetChunkMessageData.to_string(),
                );
                return;
            }
        };

        let data = match self.chunk.generate_chunk_data(&header) {
            Ok(data) => data,
            Err(e) => {
                // Asking for a chunk inconsistent with what was advertised
                // is a protocol violation.
                if matches!(e, SyncError::WrongChunkHeaderRootHash) {
                    self.network.close_peer(message.from, e.to_string());
                } else {
                    debug!(peer = %short_hex(&message.from.0), error = %e, "Failed to generate chunk data");
                }
                return;
            }
        };

        self.send_chunk_data(message.from, &data);
    }

    fn forward_to_task(&self, message: InboundMessage) {
        let guard = self.active_task.lock();
        let Some(task) = guard.as_ref() else {
            debug!(kind = message.kind.as_str(), "No active sync task, ignoring");
            return;
        };
        match message.kind {
            MessageKind::ChainChunks => task.process_chunk_headers(message),
            MessageKind::ChainChunkData => task.process_chunk_data(message),
            _ => {}
        }
    }

    fn send_chunk_headers(&self, peer: PeerId, headers: &ChunkHeaders) {
        match to_wire_bytes(headers) {
            Ok(bytes) => {
                self.network
                    .send_to_peer(MessageKind::ChainChunks, bytes, peer, MessagePriority::Low);
            }
            Err(e) => debug!(error = %e, "Failed to marshal chunk headers"),
        }
    }

    fn send_chunk_data(&self, peer: PeerId, data: &ChunkData) {
        match to_wire_bytes(data) {
            Ok(bytes) => {
                self.network.send_to_peer(
                    MessageKind::ChainChunkData,
                    bytes,
                    peer,
                    MessagePriority::Low,
                );
            }
            Err(e) => debug!(error = %e, "Failed to marshal chunk data"),
        }
    }
}

#[async_trait]
impl SyncApi for SyncService {
    fn start_active_sync(&self) -> bool {
        let mut guard = self.active_task.lock();
        if guard.is_some() {
            return false;
        }

        let task = ActiveTask::start(
            self.chain.clone(),
            self.network.clone(),
            self.sink.clone(),
            self.config.clone(),
        );
        *guard = Some(task);
        info!(
            tail = %short_hex(&self.chain.tail_block().hash()),
            "Started active sync task"
        );
        true
    }

    fn stop_active_sync(&self) {
        if let Some(task) = self.active_task.lock().take() {
            task.stop();
        }
    }

    fn is_active_syncing(&self) -> bool {
        self.active_task.lock().is_some()
    }

    async fn waiting_for_finish(&self) -> Result<(), SyncError> {
        let receiver = {
            let mut guard = self.active_task.lock();
            match guard.as_mut() {
                Some(task) => task.take_status_receiver(),
                None => return Ok(()),
            }
        };
        let Some(mut receiver) = receiver else {
            return Ok(());
        };

        let status = receiver
            .recv()
            .await
            .unwrap_or_else(|| Err(SyncError::SyncFailed("task aborted".to_string())));
        *self.active_task.lock() = None;
        info!("Active sync task finished");
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use shared_net::LoopbackNetwork;
    use shared_types::test_utils::{make_test_block, make_test_chain};
    use shared_types::{Block, Hash, NodeId};

    struct FixedChain {
        tail: Block,
    }

    impl ChainView for FixedChain {
        fn tail_block(&self) -> Block {
            self.tail.clone()
        }
    }

    struct MockChunkProvider {
        headers: Mutex<Result<ChunkHeaders, SyncError>>,
        data: Mutex<Result<ChunkData, SyncError>>,
        header_calls: AtomicUsize,
    }

    impl MockChunkProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                headers: Mutex::new(Ok(ChunkHeaders::default())),
                data: Mutex::new(Err(SyncError::SyncFailed("unset".into()))),
                header_calls: AtomicUsize::new(0),
            })
        }

        fn set_headers(&self, result: Result<ChunkHeaders, SyncError>) {
            *self.headers.lock() = result;
        }

        fn set_data(&self, result: Result<ChunkData, SyncError>) {
            *self.data.lock() = result;
        }

        fn header_call_count(&self) -> usize {
            self.header_calls.load(Ordering::SeqCst)
        }
    }

    fn clone_result<T: Clone>(source: &Mutex<Result<T, SyncError>>) -> Result<T, SyncError> {
        match &*source.lock() {
            Ok(value) => Ok(value.clone()),
            Err(SyncError::TooSmallGapToSync) => Err(SyncError::TooSmallGapToSync),
            Err(SyncError::WrongChunkHeaderRootHash) => Err(SyncError::WrongChunkHeaderRootHash),
            Err(e) => Err(SyncError::SyncFailed(e.to_string())),
        }
    }

    impl ChunkProvider for MockChunkProvider {
        fn generate_chunk_headers(&self, _tail_hash: &Hash) -> Result<ChunkHeaders, SyncError> {
            self.header_calls.fetch_add(1, Ordering::SeqCst);
            clone_result(&self.headers)
        }

        fn generate_chunk_data(&self, _header: &ChunkHeader) -> Result<ChunkData, SyncError> {
            clone_result(&self.data)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        pushed: Mutex<Vec<Hash>>,
    }

    impl BlockSink for RecordingSink {
        fn push(&self, block: Block) -> Result<(), SyncError> {
            self.pushed.lock().push(block.hash());
            Ok(())
        }
    }

    struct Harness {
        service: Arc<SyncService>,
        provider: Arc<MockChunkProvider>,
        sink: Arc<RecordingSink>,
        network: Arc<LoopbackNetwork>,
        tail: Block,
    }

    fn peer(n: u8) -> PeerId {
        NodeId::new([n; 32])
    }

    fn harness() -> Harness {
        let tail = make_test_block(10, [0u8; 32], 1_700_000_000);
        let provider = MockChunkProvider::new();
        let sink = Arc::new(RecordingSink::default());
        let network = LoopbackNetwork::new(NodeId::new([0xB1; 32]));
        let service = Arc::new(SyncService::new(
            SyncConfig::for_testing(),
            Arc::new(FixedChain { tail: tail.clone() }),
            provider.clone(),
            sink.clone(),
            network.clone(),
        ));
        Harness {
            service,
            provider,
            sink,
            network,
            tail,
        }
    }

    fn sync_request_message(from: PeerId, tail: Hash) -> InboundMessage {
        InboundMessage::new(
            MessageKind::ChainSync,
            from,
            to_wire_bytes(&SyncRequest {
                tail_block_hash: tail,
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_chain_sync_is_served_with_headers() {
        let h = harness();
        let advert = ChunkHeaders {
            headers: vec![ChunkHeader::new(vec![[1u8; 32]])],
        };
        h.provider.set_headers(Ok(advert.clone()));

        h.service.dispatch(sync_request_message(peer(2), [7u8; 32]));

        let sent = h.network.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, MessageKind::ChainChunks);
        assert_eq!(sent[0].peer, Some(peer(2)));
        assert_eq!(sent[0].priority, MessagePriority::Low);
        let reply: ChunkHeaders = from_wire_bytes(&sent[0].data).unwrap();
        assert_eq!(reply, advert);
    }

    #[tokio::test]
    async fn test_chain_sync_small_gap_answers_empty() {
        let h = harness();
        h.provider.set_headers(Err(SyncError::TooSmallGapToSync));

        h.service.dispatch(sync_request_message(peer(2), [7u8; 32]));

        let sent = h.network.sent();
        assert_eq!(sent.len(), 1);
        let reply: ChunkHeaders = from_wire_bytes(&sent[0].data).unwrap();
        assert!(reply.headers.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_chain_sync_closes_peer() {
        let h = harness();
        let message = InboundMessage::new(MessageKind::ChainSync, peer(3), vec![0xFF, 0xFF]);

        h.service.dispatch(message);

        let closed = h.network.closed_peers();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].peer, peer(3));
        assert_eq!(
            closed[0].reason,
            SyncError::InvalidChainSyncMessageData.to_string()
        );
    }

    #[tokio::test]
    async fn test_malformed_chain_get_chunk_closes_peer() {
        let h = harness();
        let message = InboundMessage::new(MessageKind::ChainGetChunk, peer(3), vec![0xFF]);

        h.service.dispatch(message);

        let closed = h.network.closed_peers();
        assert_eq!(closed.len(), 1);
        assert_eq!(
            closed[0].reason,
            SyncError::InvalidChainGetChunkMessageData.to_string()
        );
    }

    #[tokio::test]
    async fn test_wrong_chunk_root_closes_peer() {
        let h = harness();
        h.provider.set_data(Err(SyncError::WrongChunkHeaderRootHash));
        let header = ChunkHeader::new(vec![[1u8; 32]]);
        let message = InboundMessage::new(
            MessageKind::ChainGetChunk,
            peer(4),
            to_wire_bytes(&header).unwrap(),
        );

        h.service.dispatch(message);

        let closed = h.network.closed_peers();
        assert_eq!(closed.len(), 1);
        assert_eq!(
            closed[0].reason,
            SyncError::WrongChunkHeaderRootHash.to_string()
        );
    }

    #[tokio::test]
    async fn test_chain_get_chunk_replies_with_data() {
        let h = harness();
        let blocks = make_test_chain(2, 11, h.tail.hash(), 1_700_000_100);
        let header = ChunkHeader::new(blocks.iter().map(Block::hash).collect());
        let data = ChunkData {
            header: header.clone(),
            blocks: blocks.iter().map(|b| b.to_wire().unwrap()).collect(),
        };
        h.provider.set_data(Ok(data));

        let message = InboundMessage::new(
            MessageKind::ChainGetChunk,
            peer(4),
            to_wire_bytes(&header).unwrap(),
        );
        h.service.dispatch(message);

        let sent = h.network.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, MessageKind::ChainChunkData);
        assert_eq!(sent[0].priority, MessagePriority::Low);
    }

    #[tokio::test]
    async fn test_requests_are_not_served_while_syncing() {
        let h = harness();
        assert!(h.service.start_active_sync());

        h.service.dispatch(sync_request_message(peer(2), [7u8; 32]));

        assert_eq!(h.provider.header_call_count(), 0);
        // The only traffic is the task's own ChainSync broadcast.
        assert!(h
            .network
            .sent()
            .iter()
            .all(|record| record.kind == MessageKind::ChainSync));
        h.service.stop_active_sync();
    }

    #[tokio::test]
    async fn test_start_active_sync_is_single_flight() {
        let h = harness();
        assert!(h.service.start_active_sync());
        assert!(!h.service.start_active_sync());
        assert!(h.service.is_active_syncing());

        h.service.stop_active_sync();
        assert!(!h.service.is_active_syncing());
        assert!(h.service.start_active_sync());
        h.service.stop_active_sync();
    }

    #[tokio::test]
    async fn test_waiting_for_finish_without_task() {
        let h = harness();
        assert!(h.service.waiting_for_finish().await.is_ok());
    }

    #[tokio::test]
    async fn test_chunk_messages_without_task_are_ignored() {
        let h = harness();
        let message = InboundMessage::new(
            MessageKind::ChainChunks,
            peer(2),
            to_wire_bytes(&ChunkHeaders::default()).unwrap(),
        );
        // No task: forwarding is a no-op rather than a panic.
        h.service.dispatch(message);
        assert!(h.network.sent().is_empty());
    }

    #[tokio::test]
    async fn test_active_task_completes_over_the_wire() {
        let h = harness();
        assert!(h.service.start_active_sync());

        // The task broadcasts a sync request on start.
        let mut saw_request = false;
        for _ in 0..50 {
            if h.network
                .sent()
                .iter()
                .any(|record| record.kind == MessageKind::ChainSync)
            {
                saw_request = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(saw_request, "task never broadcast a sync request");

        // A peer advertises one chunk of two blocks.
        let blocks = make_test_chain(2, 11, h.tail.hash(), 1_700_000_100);
        let header = ChunkHeader::new(blocks.iter().map(Block::hash).collect());
        let advert = ChunkHeaders {
            headers: vec![header.clone()],
        };
        h.service.dispatch(InboundMessage::new(
            MessageKind::ChainChunks,
            peer(8),
            to_wire_bytes(&advert).unwrap(),
        ));

        // Wait for the task to request the chunk body.
        let mut asked = false;
        for _ in 0..50 {
            if h.network
                .sent()
                .iter()
                .any(|record| record.kind == MessageKind::ChainGetChunk)
            {
                asked = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(asked, "task never requested the chunk body");

        // The peer answers with the body; the follow-up window is empty.
        let data = ChunkData {
            header,
            blocks: blocks.iter().map(|b| b.to_wire().unwrap()).collect(),
        };
        h.service.dispatch(InboundMessage::new(
            MessageKind::ChainChunkData,
            peer(8),
            to_wire_bytes(&data).unwrap(),
        ));

        let mut drained = false;
        for _ in 0..50 {
            if h.sink.pushed.lock().len() == 2 {
                drained = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(drained, "chunk blocks never reached the sink");

        h.service.dispatch(InboundMessage::new(
            MessageKind::ChainChunks,
            peer(8),
            to_wire_bytes(&ChunkHeaders::default()).unwrap(),
        ));

        assert!(h.service.waiting_for_finish().await.is_ok());
        assert!(!h.service.is_active_syncing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_times_out_without_progress() {
        let h = harness();
        assert!(h.service.start_active_sync());

        let status = h.service.waiting_for_finish().await;
        assert!(matches!(status, Err(SyncError::SyncTimeout)));
        assert!(!h.service.is_active_syncing());
    }
}
