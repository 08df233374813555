//! Extension points for diagnostics.

use sessionstore_core::session::{Result, SessionId};

/// Hooks called by the store at well-defined points.
///
/// Every method defaults to doing nothing.
pub trait StoreObserver: Send + Sync {
    /// `get` found no row for `sid`.
    fn on_lookup_miss(&self, _sid: &SessionId) {}

    /// `set` found nothing to write for an existing row.
    fn on_write_skip(&self, _sid: &SessionId) {}

    /// An expiry sweep is about to run.
    fn on_sweep_start(&self) {}

    /// An expiry sweep finished, with the number of deleted rows or the error.
    fn on_sweep_end(&self, _result: &Result<u64>) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StoreObserver for NoopObserver {}

/// Observer that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StoreObserver for TracingObserver {
    fn on_lookup_miss(&self, sid: &SessionId) {
        tracing::debug!(%sid, "Session not found");
    }

    fn on_write_skip(&self, sid: &SessionId) {
        tracing::debug!(%sid, "Session unchanged, skipping write");
    }

    fn on_sweep_start(&self) {
        tracing::debug!("Expiry sweep started");
    }

    fn on_sweep_end(&self, result: &Result<u64>) {
        match result {
            Ok(deleted) => tracing::debug!(deleted, "Expiry sweep finished"),
            Err(err) => tracing::debug!(error = %err, "Expiry sweep failed"),
        }
    }
}
