//! Monitor cleanup after Ingress deletion
//!
//! A deleted Ingress can no longer be fetched, so its monitor is removed from
//! the metadata captured at deletion time. Deletions are queued on a bounded
//! channel and handled by one worker task; submitting never blocks the
//! event path, and cleanup failures are only logged.

use crate::apis::ingress::events::IngressKey;
use crate::error::OperatorError;
use crate::monitor::dispatcher::MonitorDispatcher;
use crate::monitor::labels::MetadataSource;
use crate::monitor::service::MonitorAction;
use k8s_openapi::api::networking::v1::Ingress;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Monitor removal for one deleted Ingress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTask {
    pub key: IngressKey,
    pub metadata: BTreeMap<String, String>,
}

impl CleanupTask {
    pub fn from_ingress(ingress: &Ingress, source: MetadataSource) -> Self {
        Self {
            key: IngressKey::from_ingress(ingress),
            metadata: source.select(&ingress.metadata).cloned().unwrap_or_default(),
        }
    }
}

/// Sending side of the cleanup queue
#[derive(Debug, Clone)]
pub struct CleanupHandle {
    tx: mpsc::Sender<CleanupTask>,
}

impl CleanupHandle {
    /// Queue a cleanup without waiting
    ///
    /// Returns false when the task was dropped (queue full or stopped).
    pub fn submit(&self, task: CleanupTask) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                warn!(
                    "Cleanup queue full, monitor for deleted Ingress {} will not be removed",
                    task.key
                );
                false
            }
            Err(TrySendError::Closed(task)) => {
                warn!(
                    "Cleanup queue stopped, monitor for deleted Ingress {} will not be removed",
                    task.key
                );
                false
            }
        }
    }

    /// Handle wired to a bare receiver instead of a worker
    #[cfg(test)]
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<CleanupTask>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

/// Cleanup worker owned by the controller
pub struct CleanupQueue {
    worker: JoinHandle<usize>,
}

impl CleanupQueue {
    /// Spawn the worker; must be called inside a tokio runtime
    pub fn start(dispatcher: MonitorDispatcher, capacity: usize) -> (Self, CleanupHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(dispatcher, rx));
        (Self { worker }, CleanupHandle { tx })
    }

    /// Wait for every queued cleanup to finish
    ///
    /// Completes once all handles have been dropped and the queue is empty.
    /// Returns the number of cleanups the worker handled.
    pub async fn shutdown(self) -> usize {
        match self.worker.await {
            Ok(processed) => processed,
            Err(e) => {
                error!("Cleanup worker failed: {}", e);
                0
            }
        }
    }
}

async fn run_worker(dispatcher: MonitorDispatcher, mut rx: mpsc::Receiver<CleanupTask>) -> usize {
    let mut processed = 0;
    while let Some(task) = rx.recv().await {
        // Failures stay here, nothing is retried
        let _ = delete_monitor(&dispatcher, &task).await;
        processed += 1;
    }
    info!("Cleanup worker stopped after {} deletion(s)", processed);
    processed
}

/// Remove the monitor belonging to a deleted Ingress
pub async fn delete_monitor(
    dispatcher: &MonitorDispatcher,
    task: &CleanupTask,
) -> Result<(), OperatorError> {
    let monitor = dispatcher
        .domain()
        .friendly_name(Some(&task.metadata))
        .map(str::to_string)
        .unwrap_or_else(|| task.key.to_string());

    let result = dispatcher
        .dispatch("", Some(&task.metadata), MonitorAction::Delete)
        .await;

    match &result {
        Ok(()) => info!("Monitor {} successfully deleted", monitor),
        Err(e) => error!(
            ingress = %task.key,
            "Monitor {} not successfully deleted: {}",
            monitor, e
        ),
    }

    result
}
