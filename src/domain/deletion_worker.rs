//! Deferred batch deletion.
//!
//! Delete requests are buffered by a single dispatch task and flushed on a
//! fixed interval. A flush runs every accumulated request against the store
//! with at most `concurrency` calls in flight. Requests whose call fails are
//! merged back into the next cycle and retried until they succeed or the
//! process stops. Deletes are idempotent, so there is no retry cap.
//!
//! Requests still pending at shutdown are dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::entities::DeleteRequest;
use crate::domain::repositories::UrlStore;
use crate::error::QueueError;

/// Deletion worker settings.
#[derive(Debug, Clone, Copy)]
pub struct DeletionWorkerConfig {
    pub flush_interval: Duration,
    pub concurrency: usize,
    pub queue_capacity: usize,
}

impl Default for DeletionWorkerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(3),
            concurrency: 5,
            queue_capacity: 100,
        }
    }
}

/// Cloneable producer side of the deletion worker.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    sender: mpsc::Sender<DeleteRequest>,
}

impl DeletionQueue {
    /// Enqueues a request. Waits while the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the worker has shut down.
    pub async fn delete(&self, request: DeleteRequest) -> Result<(), QueueError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| QueueError::Closed("deletion"))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queue without a worker behind it, for inspecting what gets enqueued.
    #[cfg(test)]
    pub(crate) fn detached(capacity: usize) -> (Self, mpsc::Receiver<DeleteRequest>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

/// Owner of the deletion dispatch task.
pub struct DeletionWorker {
    queue: DeletionQueue,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl DeletionWorker {
    /// Spawns the dispatch task.
    pub fn start(store: Arc<dyn UrlStore>, config: DeletionWorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_deletion_worker(receiver, shutdown_rx, store, config));
        info!(
            "Deletion worker started (interval {:?}, concurrency {})",
            config.flush_interval, config.concurrency
        );

        Self {
            queue: DeletionQueue { sender },
            shutdown,
            handle,
        }
    }

    /// Handle for producers.
    pub fn queue(&self) -> DeletionQueue {
        self.queue.clone()
    }

    /// Enqueues a request through the worker's own queue.
    pub async fn delete(&self, request: DeleteRequest) -> Result<(), QueueError> {
        self.queue.delete(request).await
    }

    /// Stops accepting requests, lets a running flush finish and waits for the
    /// dispatch task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!("Deletion worker task failed: {}", e);
        }
    }
}

async fn run_deletion_worker(
    mut receiver: mpsc::Receiver<DeleteRequest>,
    mut shutdown: watch::Receiver<bool>,
    store: Arc<dyn UrlStore>,
    config: DeletionWorkerConfig,
) {
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut pending: Vec<DeleteRequest> = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            request = receiver.recv() => match request {
                Some(request) => pending.push(request),
                None => break,
            },
            _ = ticker.tick() => {
                if pending.is_empty() {
                    continue;
                }
                let batch = std::mem::take(&mut pending);
                pending = flush(&store, &semaphore, batch).await;
            }
        }
    }

    receiver.close();
    while let Ok(request) = receiver.try_recv() {
        pending.push(request);
    }

    if pending.is_empty() {
        info!("Deletion worker stopped");
    } else {
        warn!(
            "Deletion worker stopped, dropping {} pending request(s)",
            pending.len()
        );
    }
}

/// Runs one flush cycle and returns the requests that must be retried.
async fn flush(
    store: &Arc<dyn UrlStore>,
    semaphore: &Arc<Semaphore>,
    batch: Vec<DeleteRequest>,
) -> Vec<DeleteRequest> {
    let total = batch.len();
    debug!("Flushing {} delete request(s)", total);

    let mut tasks = JoinSet::new();
    let mut failed = Vec::new();

    for request in batch {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                failed.push(request);
                continue;
            }
        };
        let store = Arc::clone(store);

        tasks.spawn(async move {
            let _permit = permit;
            match store.delete_batch(&request.keys, request.owner_id).await {
                Ok(()) => None,
                Err(e) => {
                    error!(
                        "delete_batch failed for owner {} ({} key(s)): {}",
                        request.owner_id,
                        request.keys.len(),
                        e
                    );
                    Some(request)
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(request)) => failed.push(request),
            Ok(None) => {}
            Err(e) => error!("Delete task panicked: {}", e),
        }
    }

    let completed = total - failed.len();
    metrics::counter!("deletion_requests_completed_total").increment(completed as u64);
    if !failed.is_empty() {
        metrics::counter!("deletion_requests_failed_total").increment(failed.len() as u64);
        warn!(
            "{} of {} delete request(s) failed, re-queued for the next flush",
            failed.len(),
            total
        );
    }

    failed
}
