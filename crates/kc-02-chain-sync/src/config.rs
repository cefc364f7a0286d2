//! Chain sync configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the sync service and its active task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Capacity of the channel multiplexing all four sync message kinds.
    pub message_channel_capacity: usize,

    /// Capacity of the channel feeding the active task.
    pub task_channel_capacity: usize,

    /// Seconds without progress before the active task re-sends its
    /// current request.
    pub request_timeout_secs: u64,

    /// Re-sends tolerated before the active task gives up.
    pub max_request_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            message_channel_capacity: 128,
            task_channel_capacity: 64,
            request_timeout_secs: 10,
            max_request_retries: 3,
        }
    }
}

impl SyncConfig {
    /// Small sizes and short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            message_channel_capacity: 16,
            task_channel_capacity: 8,
            request_timeout_secs: 1,
            max_request_retries: 1,
        }
    }
}
