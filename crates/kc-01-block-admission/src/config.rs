//! Block admission configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the block pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Capacity of the pending-block arena, the timestamp slot index and
    /// each inbound message channel.
    pub pool_size: usize,

    /// Maximum staleness (seconds) a fresh gossip block may have before it
    /// is dropped without admission. Download replies are exempt.
    pub accepted_network_delay_secs: i64,

    /// Height gap above which per-block download is abandoned in favour of
    /// bulk chunk sync.
    pub chunk_size: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            pool_size: 1024,
            accepted_network_delay_secs: 60,
            chunk_size: 32,
        }
    }
}

impl AdmissionConfig {
    /// Small sizes for tests.
    pub fn for_testing() -> Self {
        Self {
            pool_size: 16,
            accepted_network_delay_secs: 60,
            chunk_size: 4,
        }
    }
}
