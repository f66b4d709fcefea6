//! Progress reporting for batch lookups.
//!
//! [`ProgressCallback`] decouples the batch runner from any rendering
//! backend. The CLI plugs in `indicatif` bars; tests and library callers
//! use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a running batch.
///
/// Implementations must be `Send + Sync` so one instance can be shared
/// through an `Arc` across tasks.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of identifiers in the batch.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` identifiers.
    fn inc(&self, delta: u64);

    /// Shows `msg` next to the indicator (usually the current identifier).
    fn set_message(&self, msg: String);

    /// Marks the batch complete with a final message.
    fn finish(&self, msg: String);

    /// Marks the batch complete and removes the indicator.
    fn finish_and_clear(&self);
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
