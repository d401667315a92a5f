//! Tracing/logging setup shared by ledgerkit embedders.
//!
//! The domain crates only emit `tracing` records; whether and how those are
//! collected is the embedder's call. This crate provides the default setup.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
