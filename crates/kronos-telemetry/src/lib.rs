//! # Kronos Telemetry
//!
//! Observability for Kronos-Chain subsystems: structured logging via
//! `tracing` and Prometheus metrics.
//!
//! ## Usage
//!
//! ```rust,ignore
//! kronos_telemetry::init_tracing("info")?;
//! let _metrics = kronos_telemetry::register_metrics()?;
//! ```
//!
//! Subsystems touch the metric statics directly
//! (`ADMISSION_DUPLICATED_BLOCKS.inc()`); a scrape endpoint calls
//! [`encode_metrics`].

pub mod metrics;

pub use metrics::{encode_metrics, register_metrics, MetricsHandle};
pub use metrics::{
    ADMISSION_BLOCKS_PROMOTED, ADMISSION_BLOCK_CHANNEL_DEPTH, ADMISSION_DOWNLOAD_CHANNEL_DEPTH,
    ADMISSION_DUPLICATED_BLOCKS, ADMISSION_INVALID_BLOCKS, SYNC_ACTIVE_TASKS_STARTED,
    SYNC_CHUNKS_APPLIED, SYNC_MESSAGE_CHANNEL_DEPTH,
};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Tracing subscriber could not be installed.
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),

    /// Prometheus registration failed.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),
}

/// Install the global `tracing` subscriber.
///
/// `default_directive` is used when `RUST_LOG` is unset (e.g. `"info"`).
/// Safe to call once per process; a second call reports an error.
pub fn init_tracing(default_directive: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))
}
