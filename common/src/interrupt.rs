//! Run-loop interruption contract.
//!
//! Guardians request interruption through [`RunInterrupter`]; the host's
//! execution loop owns the decision of when to actually stop.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use thiserror::Error;
use tokio::sync::Notify;

/// Failure to deliver an interruption request to the host run loop.
///
/// A safeguard that cannot interrupt has failed its purpose, so callers are
/// expected to surface this loudly rather than swallow it.
#[derive(Debug, Error)]
#[error("failed to deliver interruption to the host run loop: {0}")]
pub struct InterruptError(pub String);

/// One-way interruption request into the host run loop.
///
/// Implementations must be cheap and non-blocking: callers invoke this from
/// polling tasks and never wait for the host to act on it.
pub trait RunInterrupter: Send + Sync {
    /// Request that the host stop executing remaining run steps.
    fn interrupt(&self, reason: &str) -> Result<(), InterruptError>;
}

/// Cooperative interruption signal for hosts without their own primitive.
///
/// The host polls [`InterruptSignal::is_interrupted`] between steps, or awaits
/// [`InterruptSignal::wait`] inside a select loop.
#[derive(Clone, Debug, Default)]
pub struct InterruptSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

impl InterruptSignal {
    /// Create a signal in the not-interrupted state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once interruption has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.inner.requested.load(Ordering::Relaxed)
    }

    /// Wait until interruption is requested.
    pub async fn wait(&self) {
        if self.is_interrupted() {
            return;
        }
        self.inner.notify.notified().await;
    }
}

impl RunInterrupter for InterruptSignal {
    fn interrupt(&self, reason: &str) -> Result<(), InterruptError> {
        let already = self.inner.requested.swap(true, Ordering::SeqCst);
        if !already {
            tracing::warn!(reason = %reason, "run interruption requested");
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }
}
