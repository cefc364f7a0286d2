//! Prometheus metrics for Kronos-Chain subsystems.
//!
//! All metrics follow the naming convention: `kc_<subsystem>_<metric>_<unit>`.
//!
//! ## Metric Types
//!
//! - **Counter**: monotonically increasing (e.g. duplicated_blocks_total)
//! - **Gauge**: sampled value (e.g. channel depths, updated by the 1 s tick
//!   of each subsystem loop)

use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BLOCK ADMISSION METRICS (kc-01)
    // =========================================================================

    /// Blocks rejected as duplicates at admission.
    pub static ref ADMISSION_DUPLICATED_BLOCKS: Counter = Counter::new(
        "kc_admission_duplicated_blocks_total",
        "Blocks rejected because their hash was already pooled or chained"
    ).expect("metric creation failed");

    /// Blocks rejected as invalid at admission (integrity or equivocation).
    pub static ref ADMISSION_INVALID_BLOCKS: Counter = Counter::new(
        "kc_admission_invalid_blocks_total",
        "Blocks rejected by integrity or timestamp-slot checks"
    ).expect("metric creation failed");

    /// Blocks promoted into the chain after subtree verification.
    pub static ref ADMISSION_BLOCKS_PROMOTED: Counter = Counter::new(
        "kc_admission_blocks_promoted_total",
        "Blocks handed to the chain as verified"
    ).expect("metric creation failed");

    /// Depth of the fresh/reply block channel, sampled each second.
    pub static ref ADMISSION_BLOCK_CHANNEL_DEPTH: Gauge = Gauge::new(
        "kc_admission_block_channel_depth",
        "Pending messages in the block ingestion channel"
    ).expect("metric creation failed");

    /// Depth of the download-request channel, sampled each second.
    pub static ref ADMISSION_DOWNLOAD_CHANNEL_DEPTH: Gauge = Gauge::new(
        "kc_admission_download_channel_depth",
        "Pending messages in the download-request channel"
    ).expect("metric creation failed");

    // =========================================================================
    // CHAIN SYNC METRICS (kc-02)
    // =========================================================================

    /// Depth of the sync message channel, sampled each second.
    pub static ref SYNC_MESSAGE_CHANNEL_DEPTH: Gauge = Gauge::new(
        "kc_sync_message_channel_depth",
        "Pending messages in the sync service channel"
    ).expect("metric creation failed");

    /// Chunk bodies applied by the active task.
    pub static ref SYNC_CHUNKS_APPLIED: Counter = Counter::new(
        "kc_sync_chunks_applied_total",
        "Chunk bodies verified and fed into block admission"
    ).expect("metric creation failed");

    /// Active sync tasks started.
    pub static ref SYNC_ACTIVE_TASKS_STARTED: Counter = Counter::new(
        "kc_sync_active_tasks_total",
        "Active catch-up tasks started"
    ).expect("metric creation failed");
}

/// Handle keeping the registry alive.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Admission
        Box::new(ADMISSION_DUPLICATED_BLOCKS.clone()),
        Box::new(ADMISSION_INVALID_BLOCKS.clone()),
        Box::new(ADMISSION_BLOCKS_PROMOTED.clone()),
        Box::new(ADMISSION_BLOCK_CHANNEL_DEPTH.clone()),
        Box::new(ADMISSION_DOWNLOAD_CHANNEL_DEPTH.clone()),
        // Sync
        Box::new(SYNC_MESSAGE_CHANNEL_DEPTH.clone()),
        Box::new(SYNC_CHUNKS_APPLIED.clone()),
        Box::new(SYNC_ACTIVE_TASKS_STARTED.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
