//! # Integration Tests Crate
//!
//! Cross-subsystem scenarios wiring block admission (kc-01) and chain sync
//! (kc-02) together over the in-process network hub:
//!
//! - `admission_flow`: orphan-then-parent download round trips between two
//!   nodes, and download probe denial.
//! - `sync_flow`: a lagging node catching up over the chunk protocol end to
//!   end, plus peer-close on malformed sync payloads.
//!
//! `support` holds the shared chain/consensus doubles and the adapters that
//! connect the pool to the sync task.

pub mod support;

#[cfg(test)]
mod admission_flow;
#[cfg(test)]
mod sync_flow;
