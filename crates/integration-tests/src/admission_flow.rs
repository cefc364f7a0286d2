//! Two-node admission scenarios over the in-process hub.

use std::sync::Arc;
use std::time::Duration;

use kc_01_block_admission::{
    AdmissionConfig, AdmissionError, BlockAdmissionApi, BlockPoolService, DownloadRequest,
};
use shared_net::{MessageKind, NetworkService};
use shared_types::test_utils::{make_test_block, make_test_chain};
use shared_types::{to_wire_bytes, NodeId};

use crate::support::{MockChain, MockConsensus};

const BASE_TS: i64 = 1_700_000_000;

struct Node {
    pool: Arc<BlockPoolService>,
    chain: Arc<MockChain>,
    network: Arc<shared_net::LoopbackNetwork>,
}

fn node(id: u8, chain: Arc<MockChain>) -> Node {
    let network = shared_net::LoopbackNetwork::new(NodeId::new([id; 32]));
    let pool = Arc::new(BlockPoolService::new(
        AdmissionConfig::for_testing(),
        chain.clone(),
        MockConsensus::new(),
    ));
    pool.register_in_network(network.clone());
    pool.start();
    Node {
        pool,
        chain,
        network,
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// A lone orphan triggers a download from its sender; once the reply
/// arrives, the whole two-block subtree is promoted.
#[tokio::test]
async fn test_orphan_then_parent_round_trip() {
    let genesis = make_test_block(0, [0u8; 32], BASE_TS);
    let fork = make_test_chain(2, 1, genesis.hash(), BASE_TS + 15);
    let (b1, b2) = (fork[0].clone(), fork[1].clone());

    // Node A only has genesis; node B already stores b1 and b2.
    let a = node(0xA0, MockChain::new(genesis.clone()));
    let b = node(0xB0, MockChain::new(genesis.clone()));
    b.chain.seed(b1.clone());
    b.chain.seed(b2.clone());
    shared_net::LoopbackNetwork::link(&a.network, &b.network);

    // b2 arrives at A from B: parent b1 is unknown, gap is small.
    let result = a.pool.push_and_relay(b.network.local_id(), b2.clone());
    assert!(matches!(
        result,
        Err(AdmissionError::CannotFindParentInLocalAndTryDownload)
    ));

    // B answers the download request with b2's parent; A promotes both.
    let promoted = wait_until(|| a.chain.contains(&b2.hash())).await;
    assert!(promoted, "the downloaded parent never completed the subtree");
    assert!(a.chain.contains(&b1.hash()));

    let promotions = a.chain.promotions();
    assert_eq!(promotions.len(), 1);
    let (all, tails) = &promotions[0];
    assert_eq!(*all, vec![b1.hash(), b2.hash()]);
    assert_eq!(*tails, vec![b2.hash()]);

    a.pool.stop();
    b.pool.stop();
}

/// The download responder stays silent for probes: genesis parents,
/// unknown hashes and mismatched signatures all go unanswered.
#[tokio::test]
async fn test_download_probe_denial() {
    let genesis = make_test_block(0, [0u8; 32], BASE_TS);
    let b1 = make_test_block(1, genesis.hash(), BASE_TS + 15);

    let a = node(0xA0, MockChain::new(genesis.clone()));
    let b = node(0xB0, MockChain::new(genesis.clone()));
    b.chain.seed(b1.clone());
    shared_net::LoopbackNetwork::link(&a.network, &b.network);

    // Probe 1: the genesis parent.
    let probe = DownloadRequest {
        hash: genesis.hash(),
        signature: genesis.signature,
    };
    a.network.send_to_peer(
        MessageKind::DownloadRequest,
        to_wire_bytes(&probe).unwrap(),
        b.network.local_id(),
        shared_net::MessagePriority::Normal,
    );

    // Probe 2: an unknown hash.
    let probe = DownloadRequest {
        hash: [0x77; 32],
        signature: [0u8; 64],
    };
    a.network.send_to_peer(
        MessageKind::DownloadRequest,
        to_wire_bytes(&probe).unwrap(),
        b.network.local_id(),
        shared_net::MessagePriority::Normal,
    );

    // Probe 3: a known hash with the wrong signature.
    let probe = DownloadRequest {
        hash: b1.hash(),
        signature: [0x99; 64],
    };
    a.network.send_to_peer(
        MessageKind::DownloadRequest,
        to_wire_bytes(&probe).unwrap(),
        b.network.local_id(),
        shared_net::MessagePriority::Normal,
    );

    // Give B time to process, then confirm it never replied.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(b
        .network
        .sent()
        .iter()
        .all(|record| record.kind != MessageKind::DownloadReply));

    a.pool.stop();
    b.pool.stop();
}
