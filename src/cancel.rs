//! Best-effort cancellation for in-flight sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Clonable cancellation token.
///
/// The active phase selects [`CancelToken::cancelled`] against its network
/// awaits, so a cancel aborts the in-flight operation rather than waiting
/// for it to finish.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token has been cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before re-checking the flag so a cancel
            // landing in between cannot be missed.
            let notified = self.inner.notify.notified();

            if self.is_cancelled() {
                return;
            }

            notified.await;
        }
    }
}
