//! Background removal of expired rows.

use super::store::MessageStore;
use crate::database::QueueDialect;
use crate::logging::log_queue_operation;
use sqlx::Pool;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Running cleanup task and the token that stops it
pub(crate) struct CleanupHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Signal the task and wait for it to finish its current pass
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Expired-message cleanup task ended abnormally");
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Spawn a loop that deletes expired rows every `interval` until either
/// `cancel` or `caller` fires. Stopping the handle fires `cancel` only.
pub(crate) fn spawn_expired_cleanup<D: QueueDialect>(
    store: MessageStore<D>,
    pool: Pool<D::Database>,
    interval: Duration,
    cancel: CancellationToken,
    caller: CancellationToken,
) -> CleanupHandle {
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        debug!(table = %store.table(), ?interval, "Expired-message cleanup started");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = caller.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    match store.delete_expired(&pool).await {
                        Ok(0) => {}
                        Ok(removed) => log_queue_operation(
                            "delete_expired",
                            store.table(),
                            None,
                            "success",
                            Some(removed),
                        ),
                        Err(e) => warn!(table = %store.table(), error = %e, "Expired-message cleanup pass failed"),
                    }
                }
            }
        }
        debug!(table = %store.table(), "Expired-message cleanup stopped");
    });

    CleanupHandle { cancel, task }
}
