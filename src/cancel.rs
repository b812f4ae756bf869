// ABOUTME: Cooperative cancellation flag shared between a pass and its watcher.
// ABOUTME: Checked at pass checkpoints and while sleeping between polls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Returned when work stops because cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable handle; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    shared: Arc<Shared>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early with an error on cancellation.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let notified = self.shared.notify.notified();
        tokio::pin!(notified);
        // Register before checking so a concurrent cancel() is not missed.
        notified.as_mut().enable();
        self.checkpoint()?;

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = notified => Err(Cancelled),
        }
    }
}
