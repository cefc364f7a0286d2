//! End-to-end chunk catch-up between a lagging node and a serving peer.

use std::sync::Arc;
use std::time::Duration;

use kc_01_block_admission::{
    AdmissionConfig, AdmissionError, BlockAdmissionApi, BlockPoolService,
};
use kc_02_chain_sync::{SyncApi, SyncConfig, SyncService};
use shared_net::{LoopbackNetwork, MessageKind, NetworkService};
use shared_types::test_utils::{make_test_block, make_test_chain};
use shared_types::NodeId;

use crate::support::{
    MockChain, MockConsensus, NullChunkProvider, PoolBlockSink, SimpleChunkProvider,
};

const BASE_TS: i64 = 1_700_000_000;

fn sync_config() -> SyncConfig {
    SyncConfig {
        request_timeout_secs: 5,
        max_request_retries: 3,
        ..SyncConfig::default()
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// A block far past the local tail flips admission into active sync; the
/// task then pulls three chunks from the serving peer and closes the gap.
#[tokio::test]
async fn test_deep_gap_catches_up_in_chunks() {
    let genesis = make_test_block(0, [0u8; 32], BASE_TS);
    let history = make_test_chain(6, 1, genesis.hash(), BASE_TS + 15);

    // Node A: genesis only. Node B: the full six-block history.
    let net_a = LoopbackNetwork::new(NodeId::new([0xA0; 32]));
    let net_b = LoopbackNetwork::new(NodeId::new([0xB0; 32]));
    LoopbackNetwork::link(&net_a, &net_b);

    let chain_a = MockChain::new(genesis.clone());
    let chain_b = MockChain::new(genesis.clone());
    for block in &history {
        chain_b.seed(block.clone());
    }

    let pool_a = Arc::new(BlockPoolService::new(
        AdmissionConfig::for_testing(), // chunk_size 4 < gap of 6
        chain_a.clone(),
        MockConsensus::new(),
    ));
    pool_a.register_in_network(net_a.clone());
    pool_a.start();

    let sync_a = Arc::new(SyncService::new(
        sync_config(),
        chain_a.clone(),
        Arc::new(NullChunkProvider),
        PoolBlockSink::new(pool_a.clone()),
        net_a.clone(),
    ));
    sync_a.start();
    chain_a.hook_sync_service(sync_a.clone());

    let sync_b = Arc::new(SyncService::new(
        sync_config(),
        chain_b.clone(),
        SimpleChunkProvider::new(chain_b.clone(), 2),
        PoolBlockSink::new(Arc::new(BlockPoolService::new(
            AdmissionConfig::for_testing(),
            chain_b.clone(),
            MockConsensus::new(),
        ))),
        net_b.clone(),
    ));
    sync_b.start();

    // The tip of B's chain arrives at A: gap 6 > chunk_size 4.
    let tip = history.last().unwrap().clone();
    let result = pool_a.push_and_relay(net_b.local_id(), tip.clone());
    assert!(matches!(
        result,
        Err(AdmissionError::CannotFindParentInLocalAndTrySync)
    ));
    assert_eq!(chain_a.sync_start_count(), 1);
    assert!(sync_a.is_active_syncing());

    // The chunk protocol closes the gap block by block.
    let caught_up = wait_until(|| chain_a.tail().hash() == tip.hash()).await;
    assert!(caught_up, "node A never caught up to B's tail");
    for block in &history {
        assert!(chain_a.contains(&block.hash()));
    }

    // The final empty advertisement finishes the task.
    assert!(sync_a.waiting_for_finish().await.is_ok());
    assert!(!sync_a.is_active_syncing());

    sync_a.stop();
    sync_b.stop();
    pool_a.stop();
}

/// Malformed ChainSync bytes get the offending peer closed.
#[tokio::test]
async fn test_malformed_sync_payload_closes_peer() {
    let genesis = make_test_block(0, [0u8; 32], BASE_TS);
    let net_a = LoopbackNetwork::new(NodeId::new([0xA0; 32]));
    let net_b = LoopbackNetwork::new(NodeId::new([0xB0; 32]));
    LoopbackNetwork::link(&net_a, &net_b);

    let chain_a = MockChain::new(genesis.clone());
    let pool_a = Arc::new(BlockPoolService::new(
        AdmissionConfig::for_testing(),
        chain_a.clone(),
        MockConsensus::new(),
    ));
    let sync_a = Arc::new(SyncService::new(
        sync_config(),
        chain_a.clone(),
        Arc::new(NullChunkProvider),
        PoolBlockSink::new(pool_a),
        net_a.clone(),
    ));
    sync_a.start();

    net_b.send_to_peer(
        MessageKind::ChainSync,
        vec![0xDE, 0xAD],
        net_a.local_id(),
        shared_net::MessagePriority::Zero,
    );

    let closed = wait_until(|| !net_a.closed_peers().is_empty()).await;
    assert!(closed, "the malformed peer was never closed");
    let closed = net_a.closed_peers();
    assert_eq!(closed[0].peer, net_b.local_id());
    assert!(closed[0].reason.contains("ChainSync"));

    sync_a.stop();
}
