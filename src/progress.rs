//! Progress reporting and cancellation capabilities.
//!
//! The builder never owns a global logger. Hosts pass a [`ProgressSink`]
//! into the orchestrator; the sink is advisory and must not fail back into
//! the build.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives scalar status updates from the build pipeline.
///
/// Invoked on the caller's thread. Implementations must not panic.
pub trait ProgressSink {
    fn status(&self, message: &str);

    fn warning(&self, message: &str) {
        self.status(message);
    }
}

/// Sink that discards everything.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn status(&self, _message: &str) {}
}

/// Sink that forwards to `tracing` at info/warn level.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn status(&self, message: &str) {
        tracing::info!(target: "pbipgen", "{message}");
    }

    fn warning(&self, message: &str) {
        tracing::warn!(target: "pbipgen", "{message}");
    }
}

/// Cooperative cancellation token, checked at coarse pipeline checkpoints.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
