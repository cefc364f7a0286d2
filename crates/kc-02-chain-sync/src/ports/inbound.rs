//! Inbound ports (API) for chain sync.

use async_trait::async_trait;

use crate::events::SyncError;

/// Single-flight active sync control surface.
#[async_trait]
pub trait SyncApi: Send + Sync {
    /// Start an active catch-up task. Returns false when one is already
    /// running.
    fn start_active_sync(&self) -> bool;

    /// Stop and clear the active task, if any.
    fn stop_active_sync(&self);

    /// Whether a task is currently active.
    fn is_active_syncing(&self) -> bool;

    /// Block until the active task reaches a terminal status, then clear
    /// it. Returns immediately when no task is active.
    async fn waiting_for_finish(&self) -> Result<(), SyncError>;
}
