// ABOUTME: Background task that turns a stored Cancelled status into a cancel signal.
// ABOUTME: Polls the store at a fixed interval and is aborted when the pass ends.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cancel::CancelFlag;
use crate::store::DeploymentStore;
use crate::types::DeploymentId;

/// A running watcher. Stops when dropped.
pub(crate) struct CancelWatcher {
    task: JoinHandle<()>,
}

impl CancelWatcher {
    pub(crate) fn spawn(
        store: Arc<dyn DeploymentStore>,
        id: DeploymentId,
        cancel: CancelFlag,
        interval: Duration,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.is_cancelled(&id).await {
                    Ok(true) => {
                        tracing::info!(deployment = %id, "cancellation requested");
                        cancel.cancel();
                        return;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::debug!(deployment = %id, error = %e, "failed to poll cancellation");
                    }
                }
            }
        });
        Self { task }
    }
}

impl Drop for CancelWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
