//! Shared doubles and adapters for cross-subsystem scenarios.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use kc_01_block_admission::{
    AdmissionError, BlockAdmissionApi, BlockPoolService, ChainGateway, ConsensusGateway,
};
use kc_02_chain_sync::{
    BlockSink, ChainView, ChunkData, ChunkHeader, ChunkHeaders, ChunkProvider, SyncApi,
    SyncError, SyncService,
};
use shared_types::test_utils::TEST_CHAIN_ID;
use shared_types::{Block, Hash};

/// In-memory chain double serving both the admission gateway and the sync
/// view. History is linear; promoted subtrees are appended in order.
pub struct MockChain {
    genesis: Block,
    history: Mutex<Vec<Block>>,
    blocks: Mutex<HashMap<Hash, Block>>,
    promotions: Mutex<Vec<(Vec<Hash>, Vec<Hash>)>>,
    sync_starts: AtomicUsize,
    sync_service: Mutex<Option<Arc<SyncService>>>,
}

impl MockChain {
    /// A chain holding only the given genesis block.
    pub fn new(genesis: Block) -> Arc<Self> {
        let mut blocks = HashMap::new();
        blocks.insert(genesis.hash(), genesis.clone());
        Arc::new(Self {
            history: Mutex::new(vec![genesis.clone()]),
            blocks: Mutex::new(blocks),
            genesis,
            promotions: Mutex::new(Vec::new()),
            sync_starts: AtomicUsize::new(0),
            sync_service: Mutex::new(None),
        })
    }

    /// Append a block to the stored history (test seeding).
    pub fn seed(&self, block: Block) {
        self.blocks.lock().insert(block.hash(), block.clone());
        self.history.lock().push(block);
    }

    /// Route `start_active_sync` into a real sync service.
    pub fn hook_sync_service(&self, service: Arc<SyncService>) {
        *self.sync_service.lock() = Some(service);
    }

    /// Current tail of the stored history.
    pub fn tail(&self) -> Block {
        self.history
            .lock()
            .last()
            .cloned()
            .unwrap_or_else(|| self.genesis.clone())
    }

    /// Whether the chain stores this hash.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.lock().contains_key(hash)
    }

    /// Recorded promotions as (all, tails) hash lists.
    pub fn promotions(&self) -> Vec<(Vec<Hash>, Vec<Hash>)> {
        self.promotions.lock().clone()
    }

    /// Times `start_active_sync` was invoked.
    pub fn sync_start_count(&self) -> usize {
        self.sync_starts.load(Ordering::SeqCst)
    }

    /// The history strictly above the block with the given hash; `None`
    /// when the hash is not part of the history.
    pub fn blocks_above(&self, hash: &Hash) -> Option<Vec<Block>> {
        let history = self.history.lock();
        let position = history.iter().position(|block| block.hash() == *hash)?;
        Some(history[position + 1..].to_vec())
    }
}

impl ChainGateway for MockChain {
    fn chain_id(&self) -> u32 {
        TEST_CHAIN_ID
    }

    fn genesis_hash(&self) -> Hash {
        self.genesis.hash()
    }

    fn tail_block(&self) -> Block {
        self.tail()
    }

    fn get_block(&self, hash: &Hash) -> Option<Block> {
        self.blocks.lock().get(hash).cloned()
    }

    fn link_parent(&self, _block: &Block, _parent: &Block) -> Result<(), AdmissionError> {
        Ok(())
    }

    fn put_verified_blocks(
        &self,
        _parent: &Block,
        all: &[Block],
        tails: &[Block],
    ) -> Result<(), AdmissionError> {
        self.promotions.lock().push((
            all.iter().map(Block::hash).collect(),
            tails.iter().map(Block::hash).collect(),
        ));
        let mut blocks = self.blocks.lock();
        let mut history = self.history.lock();
        for block in all {
            blocks.insert(block.hash(), block.clone());
            history.push(block.clone());
        }
        Ok(())
    }

    fn start_active_sync(&self) -> bool {
        self.sync_starts.fetch_add(1, Ordering::SeqCst);
        match self.sync_service.lock().as_ref() {
            Some(service) => service.start_active_sync(),
            None => true,
        }
    }
}

impl ChainView for MockChain {
    fn tail_block(&self) -> Block {
        self.tail()
    }
}

/// Accept-all consensus double.
#[derive(Default)]
pub struct MockConsensus {
    fork_choices: AtomicUsize,
}

impl MockConsensus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fork_choice_count(&self) -> usize {
        self.fork_choices.load(Ordering::SeqCst)
    }
}

impl ConsensusGateway for MockConsensus {
    fn verify_integrity(&self, block: &Block, chain_id: u32) -> Result<(), AdmissionError> {
        if block.header.chain_id != chain_id {
            return Err(AdmissionError::InvalidBlock("wrong chain id".into()));
        }
        Ok(())
    }

    fn verify_execution(&self, _block: &Block, _parent: &Block) -> Result<(), AdmissionError> {
        Ok(())
    }

    fn fork_choice(&self) -> Result<(), AdmissionError> {
        self.fork_choices.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Chunk provider slicing a [`MockChain`]'s history into fixed-size chunks.
pub struct SimpleChunkProvider {
    chain: Arc<MockChain>,
    chunk_len: usize,
}

impl SimpleChunkProvider {
    pub fn new(chain: Arc<MockChain>, chunk_len: usize) -> Arc<Self> {
        Arc::new(Self {
            chain,
            chunk_len: chunk_len.max(1),
        })
    }
}

impl ChunkProvider for SimpleChunkProvider {
    fn generate_chunk_headers(&self, tail_hash: &Hash) -> Result<ChunkHeaders, SyncError> {
        let missing = self
            .chain
            .blocks_above(tail_hash)
            .ok_or_else(|| SyncError::SyncFailed("unknown tail".to_string()))?;
        if missing.is_empty() {
            return Err(SyncError::TooSmallGapToSync);
        }
        let headers = missing
            .chunks(self.chunk_len)
            .map(|chunk| ChunkHeader::new(chunk.iter().map(Block::hash).collect()))
            .collect();
        Ok(ChunkHeaders { headers })
    }

    fn generate_chunk_data(&self, header: &ChunkHeader) -> Result<ChunkData, SyncError> {
        if !header.verify_root() {
            return Err(SyncError::WrongChunkHeaderRootHash);
        }
        let mut blocks = Vec::with_capacity(header.block_hashes.len());
        for hash in &header.block_hashes {
            let block = ChainGateway::get_block(self.chain.as_ref(), hash)
                .ok_or(SyncError::WrongChunkHeaderRootHash)?;
            blocks.push(block.to_wire()?);
        }
        Ok(ChunkData {
            header: header.clone(),
            blocks,
        })
    }
}

/// Chunk provider for nodes that never serve chunks.
pub struct NullChunkProvider;

impl ChunkProvider for NullChunkProvider {
    fn generate_chunk_headers(&self, _tail_hash: &Hash) -> Result<ChunkHeaders, SyncError> {
        Err(SyncError::TooSmallGapToSync)
    }

    fn generate_chunk_data(&self, _header: &ChunkHeader) -> Result<ChunkData, SyncError> {
        Err(SyncError::WrongChunkHeaderRootHash)
    }
}

/// Feeds blocks recovered by the sync task through the admission pool.
pub struct PoolBlockSink {
    pool: Arc<BlockPoolService>,
}

impl PoolBlockSink {
    pub fn new(pool: Arc<BlockPoolService>) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

impl BlockSink for PoolBlockSink {
    fn push(&self, block: Block) -> Result<(), SyncError> {
        self.pool
            .push(block)
            .map_err(|e| SyncError::SyncFailed(e.to_string()))
    }
}
