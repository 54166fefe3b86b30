//! Cooperative cancellation shared between a controller and a worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::Cancelled;

/// A shared flag polled by the pipeline at designated suspension points.
///
/// Cancelling is non-blocking on the caller's side: the caller sets the
/// flag and returns, and the worker observes it at its next suspension
/// point (the head of every full-image scan row, every edgel scan, every
/// candidate pairing step, and every flood-fill iteration) and tears
/// itself down without producing a result.
///
/// Cloning the token yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Suspension point: fail with [`Cancelled`] once cancellation has
    /// been requested.
    pub(crate) fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() { Err(Cancelled) } else { Ok(()) }
    }
}
