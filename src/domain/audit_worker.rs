//! Asynchronous audit fan-out.
//!
//! A fixed pool of workers drains a shared bounded queue. Every event is
//! delivered to every registered sink. Delivery is best-effort: a failing
//! sink is logged and counted, the remaining sinks still receive the event,
//! and nothing is retried.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::domain::audit_event::AuditEvent;
use crate::domain::repositories::AuditSink;
use crate::error::QueueError;

/// Audit worker pool settings.
#[derive(Debug, Clone, Copy)]
pub struct AuditWorkerConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
}

impl Default for AuditWorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            queue_capacity: 1000,
        }
    }
}

/// Cloneable producer side of the audit pipeline.
#[derive(Debug, Clone)]
pub struct AuditQueue {
    sender: mpsc::Sender<AuditEvent>,
}

impl AuditQueue {
    /// Enqueues an event, waiting while the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] after the pool has been shut down.
    pub async fn record(&self, event: AuditEvent) -> Result<(), QueueError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| QueueError::Closed("audit"))
    }
}

/// Owner of the audit worker pool.
pub struct AuditWorker {
    queue: AuditQueue,
    shutdown: watch::Sender<bool>,
    workers: JoinSet<()>,
}

impl AuditWorker {
    /// Spawns `worker_count` workers sharing one queue.
    pub fn start(sinks: Vec<Arc<dyn AuditSink>>, config: AuditWorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let receiver = Arc::new(Mutex::new(receiver));
        let sinks: Arc<[Arc<dyn AuditSink>]> = sinks.into();

        let mut workers = JoinSet::new();
        for id in 0..config.worker_count.max(1) {
            workers.spawn(run_audit_worker(
                id,
                Arc::clone(&receiver),
                shutdown_rx.clone(),
                Arc::clone(&sinks),
            ));
        }

        info!(
            "Audit pipeline started ({} worker(s), {} sink(s))",
            config.worker_count.max(1),
            sinks.len()
        );

        Self {
            queue: AuditQueue { sender },
            shutdown,
            workers,
        }
    }

    pub fn queue(&self) -> AuditQueue {
        self.queue.clone()
    }

    pub async fn record(&self, event: AuditEvent) -> Result<(), QueueError> {
        self.queue.record(event).await
    }

    /// Signals every worker and waits for all of them to exit. Events still
    /// queued are dropped.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!("Audit worker task failed: {}", e);
            }
        }
        info!("Audit pipeline stopped");
    }
}

async fn run_audit_worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<AuditEvent>>>,
    mut shutdown: watch::Receiver<bool>,
    sinks: Arc<[Arc<dyn AuditSink>]>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            event = next_event(&receiver) => match event {
                Some(event) => event,
                None => break,
            },
        };

        deliver(&sinks, &event).await;
    }

    let dropped = receiver.lock().await.len();
    if dropped > 0 {
        warn!("Audit worker {} stopped with {} queued event(s) dropped", id, dropped);
    } else {
        debug!("Audit worker {} stopped", id);
    }
}

async fn next_event(receiver: &Mutex<mpsc::Receiver<AuditEvent>>) -> Option<AuditEvent> {
    receiver.lock().await.recv().await
}

/// Hands one event to every sink, logging failures.
pub(crate) async fn deliver(sinks: &[Arc<dyn AuditSink>], event: &AuditEvent) {
    for sink in sinks {
        match sink.record(event).await {
            Ok(()) => {
                metrics::counter!("audit_events_delivered_total", "sink" => sink.name())
                    .increment(1);
            }
            Err(e) => {
                metrics::counter!("audit_delivery_failures_total", "sink" => sink.name())
                    .increment(1);
                error!("Audit sink {} failed: {}", sink.name(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit_event::AuditAction;
    use crate::domain::repositories::MockAuditSink;
    use crate::error::AuditError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    /// Sink that counts deliveries, optionally after a delay.
    struct CountingSink {
        name: &'static str,
        delay: Duration,
        started: Option<mpsc::UnboundedSender<()>>,
        delivered: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AuditSink for CountingSink {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            if let Some(started) = &self.started {
                let _ = started.send(());
            }
            tokio::time::sleep(self.delay).await;
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn failing_sink() -> MockAuditSink {
        let mut sink = MockAuditSink::new();
        sink.expect_name().return_const("broken");
        sink.expect_record().returning(|_| {
            Err(AuditError::Http("connection refused".to_string()))
        });
        sink
    }

    #[tokio::test]
    async fn test_every_event_reaches_every_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut working = MockAuditSink::new();
        working.expect_name().return_const("memory");
        working.expect_record().times(3).returning(move |event| {
            let _ = tx.send(event.url.clone());
            Ok(())
        });

        let worker = AuditWorker::start(
            vec![Arc::new(failing_sink()), Arc::new(working)],
            AuditWorkerConfig {
                worker_count: 2,
                queue_capacity: 8,
            },
        );

        let owner = Uuid::new_v4();
        for url in ["https://a.example", "https://b.example", "https://c.example"] {
            worker.record(AuditEvent::shorten(owner, url)).await.unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..3 {
            let url = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("event was not delivered")
                .unwrap();
            received.push(url);
        }
        received.sort();

        assert_eq!(
            received,
            vec!["https://a.example", "https://b.example", "https://c.example"]
        );

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_deliver_continues_after_sink_failure() {
        let mut second = MockAuditSink::new();
        second.expect_name().return_const("second");
        second
            .expect_record()
            .withf(|event| event.action == AuditAction::Follow)
            .times(1)
            .returning(|_| Ok(()));

        let sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(failing_sink()), Arc::new(second)];

        deliver(&sinks, &AuditEvent::follow(Uuid::new_v4(), "https://example.com")).await;
    }

    #[tokio::test]
    async fn test_record_after_shutdown_is_rejected() {
        let worker = AuditWorker::start(Vec::new(), AuditWorkerConfig::default());
        let queue = worker.queue();

        worker.shutdown().await;

        let result = queue
            .record(AuditEvent::shorten(Uuid::new_v4(), "https://example.com"))
            .await;
        assert_eq!(result, Err(QueueError::Closed("audit")));
    }

    #[tokio::test]
    async fn test_event_in_delivery_reaches_all_sinks_despite_shutdown() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let slow_delivered = Arc::new(AtomicUsize::new(0));
        let fast_delivered = Arc::new(AtomicUsize::new(0));

        let slow = CountingSink {
            name: "slow",
            delay: Duration::from_millis(200),
            started: Some(started_tx),
            delivered: slow_delivered.clone(),
        };
        let fast = CountingSink {
            name: "fast",
            delay: Duration::ZERO,
            started: None,
            delivered: fast_delivered.clone(),
        };

        let worker = AuditWorker::start(
            vec![Arc::new(slow), Arc::new(fast)],
            AuditWorkerConfig {
                worker_count: 1,
                queue_capacity: 8,
            },
        );
        worker
            .record(AuditEvent::shorten(Uuid::new_v4(), "https://example.com"))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), started_rx.recv())
            .await
            .expect("delivery did not start")
            .unwrap();
        worker.shutdown().await;

        assert_eq!(slow_delivered.load(Ordering::SeqCst), 1);
        assert_eq!(fast_delivered.load(Ordering::SeqCst), 1);
    }
}
