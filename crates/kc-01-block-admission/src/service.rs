//! Block Pool service implementation.
//!
//! One admission critical section guarded by a single mutex, one event loop
//! multiplexing the two inbound channels, the quit signal and a metrics
//! tick. Handlers are synchronous; channels are the only suspension points.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use kronos_telemetry::{
    ADMISSION_BLOCKS_PROMOTED, ADMISSION_BLOCK_CHANNEL_DEPTH, ADMISSION_DOWNLOAD_CHANNEL_DEPTH,
    ADMISSION_DUPLICATED_BLOCKS, ADMISSION_INVALID_BLOCKS,
};
use shared_net::{InboundMessage, MessageKind, MessagePriority, NetworkService, Subscriber};
use shared_types::{from_wire_bytes, short_hex, to_wire_bytes, Block, Hash, PeerId};

use crate::config::AdmissionConfig;
use crate::domain::forest::PendingForest;
use crate::domain::invariants;
use crate::events::{AdmissionError, DownloadRequest};
use crate::ports::inbound::BlockAdmissionApi;
use crate::ports::outbound::{ChainGateway, ConsensusGateway};

struct PoolReceivers {
    blocks: mpsc::Receiver<InboundMessage>,
    downloads: mpsc::Receiver<InboundMessage>,
}

/// The pool of blocks received from the network, pending promotion.
pub struct BlockPoolService {
    config: AdmissionConfig,
    chain: Arc<dyn ChainGateway>,
    consensus: Arc<dyn ConsensusGateway>,
    network: RwLock<Option<Arc<dyn NetworkService>>>,
    forest: Mutex<PendingForest>,
    block_tx: mpsc::Sender<InboundMessage>,
    download_tx: mpsc::Sender<InboundMessage>,
    receivers: Mutex<Option<PoolReceivers>>,
    shutdown: watch::Sender<bool>,
}

impl BlockPoolService {
    /// Create a pool. Capacities below 1 are clamped to 1.
    pub fn new(
        config: AdmissionConfig,
        chain: Arc<dyn ChainGateway>,
        consensus: Arc<dyn ConsensusGateway>,
    ) -> Self {
        let size = config.pool_size.max(1);
        let (block_tx, block_rx) = mpsc::channel(size);
        let (download_tx, download_rx) = mpsc::channel(size);
        let (shutdown, _) = watch::channel(false);
        Self {
            forest: Mutex::new(PendingForest::new(size)),
            config,
            chain,
            consensus,
            network: RwLock::new(None),
            block_tx,
            download_tx,
            receivers: Mutex::new(Some(PoolReceivers {
                blocks: block_rx,
                downloads: download_rx,
            })),
            shutdown,
        }
    }

    /// Subscribe the pool's three message kinds in the network service.
    pub fn register_in_network(&self, network: Arc<dyn NetworkService>) {
        network.register(Subscriber::new(
            vec![MessageKind::NewBlock],
            self.block_tx.clone(),
            true,
            MessagePriority::High,
        ));
        network.register(Subscriber::new(
            vec![MessageKind::DownloadReply],
            self.block_tx.clone(),
            false,
            MessagePriority::Zero,
        ));
        network.register(Subscriber::new(
            vec![MessageKind::DownloadRequest],
            self.download_tx.clone(),
            false,
            MessagePriority::Zero,
        ));
        *self.network.write() = Some(network);
    }

    /// Launch the event loop.
    pub fn start(self: &Arc<Self>) {
        info!(size = self.config.pool_size, "Starting block pool");
        let pool = Arc::clone(self);
        tokio::spawn(async move { pool.run().await });
    }

    /// Signal the event loop to drain and return.
    pub fn stop(&self) {
        info!("Stopping block pool");
        let _ = self.shutdown.send(true);
    }

    async fn run(&self) {
        let Some(PoolReceivers {
            mut blocks,
            mut downloads,
        }) = self.receivers.lock().take()
        else {
            warn!("Block pool loop is already running");
            return;
        };
        let mut shutdown = self.shutdown.subscribe();
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        info!("Started block pool");

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    ADMISSION_BLOCK_CHANNEL_DEPTH.set(blocks.len() as f64);
                    ADMISSION_DOWNLOAD_CHANNEL_DEPTH.set(downloads.len() as f64);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        info!("Stopped block pool");
                        return;
                    }
                }
                Some(message) = blocks.recv() => self.handle_block(message),
                Some(message) = downloads.recv() => self.handle_download_request(message),
            }
        }
    }

    /// Fresh blocks and download replies share one handler; only fresh
    /// gossip is subject to the staleness filter.
    fn handle_block(&self, message: InboundMessage) {
        if message.kind != MessageKind::NewBlock && message.kind != MessageKind::DownloadReply {
            debug!(kind = message.kind.as_str(), "Received unregistered message");
            return;
        }

        let block = match Block::from_wire(&message.data) {
            Ok(block) => block,
            Err(e) => {
                debug!(kind = message.kind.as_str(), error = %e, "Failed to decode block");
                return;
            }
        };

        if message.kind == MessageKind::NewBlock {
            let now = unix_now();
            if invariants::is_behind(
                now,
                block.timestamp(),
                self.config.accepted_network_delay_secs,
            ) {
                debug!(
                    hash = %short_hex(&block.hash()),
                    behind_secs = now - block.timestamp(),
                    limit_secs = self.config.accepted_network_delay_secs,
                    "Dropped stale fresh block"
                );
                return;
            }
        }

        debug!(
            hash = %short_hex(&block.hash()),
            kind = message.kind.as_str(),
            "Received a block"
        );

        if let Err(e) = self.push_and_relay(message.from, block) {
            debug!(error = %e, "Block was not admitted");
        }
    }

    /// Serve a download request with the requested block's parent.
    fn handle_download_request(&self, message: InboundMessage) {
        if message.kind != MessageKind::DownloadRequest {
            debug!(kind = message.kind.as_str(), "Received unregistered message");
            return;
        }

        let request: DownloadRequest = match from_wire_bytes(&message.data) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Failed to decode download request");
                return;
            }
        };

        if request.hash == self.chain.genesis_hash() {
            debug!("Asked for the genesis parent, ignoring");
            return;
        }

        let Some(block) = self.chain.get_block(&request.hash) else {
            debug!(hash = %short_hex(&request.hash), "Requested block not found");
            return;
        };

        // The request must present the named block's exact signature,
        // proving the requester holds the block rather than probing hashes.
        if block.signature != request.signature {
            debug!(hash = %short_hex(&request.hash), "Download request signature mismatch");
            return;
        }

        let Some(parent) = self.chain.get_block(&block.parent_hash()) else {
            debug!(hash = %short_hex(&request.hash), "Requested block has no stored parent");
            return;
        };

        let bytes = match parent.to_wire() {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Failed to encode download reply");
                return;
            }
        };
        self.with_network(move |ns| {
            ns.send_to_peer(
                MessageKind::DownloadReply,
                bytes,
                message.from,
                MessagePriority::Normal,
            );
        });
        debug!(
            hash = %short_hex(&request.hash),
            parent = %short_hex(&parent.hash()),
            "Responded to download request"
        );
    }

    /// Issue a single-block download to `sender` for `block`'s parent.
    fn request_download(&self, sender: PeerId, block: &Block) -> Result<(), AdmissionError> {
        let request = DownloadRequest {
            hash: block.hash(),
            signature: block.signature,
        };
        let bytes = to_wire_bytes(&request)?;
        self.with_network(move |ns| {
            ns.send_to_peer(
                MessageKind::DownloadRequest,
                bytes,
                sender,
                MessagePriority::Normal,
            );
        });

        let tail = self.chain.tail_block();
        info!(
            target = %short_hex(&sender.0),
            hash = %short_hex(&block.hash()),
            gap_secs = block.timestamp() - tail.timestamp(),
            "Requested block download"
        );
        Ok(())
    }

    /// The admission critical section. Serialised by the forest mutex.
    fn admit(&self, sender: Option<PeerId>, block: Block) -> Result<(), AdmissionError> {
        let mut forest = self.forest.lock();
        let hash = block.hash();

        // Duplicates: already pooled or already chained.
        if forest.contains(&hash) || self.chain.get_block(&hash).is_some() {
            ADMISSION_DUPLICATED_BLOCKS.inc();
            debug!(hash = %short_hex(&hash), "Found duplicated block");
            return Err(AdmissionError::DuplicatedBlock);
        }

        // Integrity.
        if let Err(e) = self.consensus.verify_integrity(&block, self.chain.chain_id()) {
            ADMISSION_INVALID_BLOCKS.inc();
            debug!(hash = %short_hex(&hash), error = %e, "Failed block integrity check");
            return Err(e);
        }

        // One block per timestamp slot.
        if let Some(occupant) = forest.slot_occupant(block.timestamp()) {
            ADMISSION_INVALID_BLOCKS.inc();
            warn!(
                current = %short_hex(&hash),
                previous = %short_hex(&occupant.hash()),
                timestamp = block.timestamp(),
                "Multiple blocks minted in the same slot"
            );
            return Err(AdmissionError::DoubleBlockMinted);
        }
        forest.occupy_slot(block.timestamp(), block.clone());

        let parent_hash = block.parent_hash();
        let height = block.height();
        forest.insert(block.clone());

        // Adopt any orphans that were already waiting for this block.
        forest.adopt_orphans(&hash);

        // Parent pooled: link in and ask the sender for the topmost missing
        // ancestor. No relay on this path even with a sender present.
        if forest.contains(&parent_hash) {
            forest.link_child(&parent_hash, &hash);
            let ancestor_hash = forest.topmost_pooled_ancestor(&parent_hash);
            warn!(hash = %short_hex(&ancestor_hash), "Found unlinked ancestor in pool");

            let Some(sender) = sender else {
                return Err(AdmissionError::MissingParentBlock);
            };
            if let Some(ancestor) = forest.get(&ancestor_hash).map(|node| node.block.clone()) {
                self.request_download(sender, &ancestor)?;
            }
            return Ok(());
        }

        // Parent in the chain, or nowhere.
        let Some(parent_block) = self.chain.get_block(&parent_hash) else {
            let Some(sender) = sender else {
                return Err(AdmissionError::MissingParentBlock);
            };

            let tail = self.chain.tail_block();
            if invariants::gap_requires_bulk_sync(height, tail.height(), self.config.chunk_size) {
                if self.chain.start_active_sync() {
                    warn!(
                        height,
                        tail_height = tail.height(),
                        offline_secs = block.timestamp() - tail.timestamp(),
                        "Tail too far behind, pausing downloads and syncing in chunks"
                    );
                }
                return Err(AdmissionError::CannotFindParentInLocalAndTrySync);
            }

            self.request_download(sender, &block)?;
            return Err(AdmissionError::CannotFindParentInLocalAndTryDownload);
        };

        // Chain-attachable and network-originated: relay onward.
        if sender.is_some() {
            let bytes = block.to_wire()?;
            self.with_network(move |ns| {
                ns.relay(MessageKind::NewBlock, bytes, MessagePriority::High);
            });
        }

        // Verify the whole pooled subtree rooted here.
        let (all_blocks, tail_blocks) = collect_valid_subtree(
            &forest,
            &hash,
            &parent_block,
            self.chain.as_ref(),
            self.consensus.as_ref(),
        )?;

        self.chain
            .put_verified_blocks(&parent_block, &all_blocks, &tail_blocks)?;
        ADMISSION_BLOCKS_PROMOTED.inc_by(all_blocks.len() as f64);

        for promoted in &all_blocks {
            forest.remove(&promoted.hash());
        }

        self.consensus.fork_choice()
    }

    fn with_network<F>(&self, f: F)
    where
        F: FnOnce(&dyn NetworkService),
    {
        match self.network.read().as_ref() {
            Some(network) => f(network.as_ref()),
            None => debug!("No network service registered"),
        }
    }

    #[cfg(test)]
    fn forest_node_count(&self) -> usize {
        self.forest.lock().node_count()
    }

    #[cfg(test)]
    fn forest_contains(&self, hash: &Hash) -> bool {
        self.forest.lock().contains(hash)
    }
}

impl BlockAdmissionApi for BlockPoolService {
    fn push(&self, block: Block) -> Result<(), AdmissionError> {
        let block = block.normalise_via_wire()?;
        match self.admit(None, block) {
            Err(e) if e.is_benign() => Ok(()),
            other => other,
        }
    }

    fn push_and_relay(&self, sender: PeerId, block: Block) -> Result<(), AdmissionError> {
        let block = block.normalise_via_wire()?;
        self.admit(Some(sender), block)
    }

    fn push_and_broadcast(&self, block: Block) -> Result<(), AdmissionError> {
        let block = block.normalise_via_wire()?;
        let bytes = block.to_wire()?;
        self.with_network(move |ns| {
            ns.broadcast(MessageKind::NewBlock, bytes, MessagePriority::High);
        });
        self.admit(None, block)
    }
}

/// Pre-order DFS from `root` with `parent_block` as the chain-resident
/// ancestor. A child whose verification fails is skipped together with its
/// subtree; failure at the root fails the whole call.
fn collect_valid_subtree(
    forest: &PendingForest,
    root: &Hash,
    parent_block: &Block,
    chain: &dyn ChainGateway,
    consensus: &dyn ConsensusGateway,
) -> Result<(Vec<Block>, Vec<Block>), AdmissionError> {
    let Some(node) = forest.get(root) else {
        return Err(AdmissionError::LinkFailed(format!(
            "pending block {} vanished from the pool",
            short_hex(root)
        )));
    };

    chain.link_parent(&node.block, parent_block)?;
    consensus.verify_execution(&node.block, parent_block)?;
    debug!(hash = %short_hex(root), "Block verified");

    let block = node.block.clone();
    let children: Vec<Hash> = node.children.iter().copied().collect();

    let mut all_blocks = vec![block.clone()];
    let mut tail_blocks = Vec::new();
    if children.is_empty() {
        tail_blocks.push(block.clone());
    }

    for child in children {
        match collect_valid_subtree(forest, &child, &block, chain, consensus) {
            Ok((all, tails)) => {
                all_blocks.extend(all);
                tail_blocks.extend(tails);
            }
            Err(e) => {
                debug!(hash = %short_hex(&child), error = %e, "Skipping failed child subtree");
            }
        }
    }

    Ok((all_blocks, tail_blocks))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
