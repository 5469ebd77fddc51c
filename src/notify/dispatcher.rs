//! Notification dispatch task
//!
//! Drains the engine's notification queue in order, one send at a time. Each
//! send is attempted once and produces exactly one log entry.

use super::Notifier;
use crate::monitor::{
    NotificationLogEntry, NotificationOutcome, NotificationQueue, NotificationRecorder,
    OutboundNotification,
};
use crate::notify_span;
use crate::observability::metrics::metrics;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

/// Consumes queued notifications and delivers them through a [`Notifier`]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    receiver: mpsc::Receiver<OutboundNotification>,
    recorder: NotificationRecorder,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, queue: NotificationQueue) -> Self {
        Self {
            notifier,
            receiver: queue.receiver,
            recorder: queue.recorder,
        }
    }

    /// Run on a new task, see [`run`](Self::run)
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Process notifications in queue order.
    ///
    /// Once `shutdown` flips to true (or its sender is dropped) the queue is
    /// closed to new notifications, whatever is already buffered is still
    /// delivered, and the task ends. It also ends if the engine goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(notifier = self.notifier.name(), "Notification dispatcher started");

        let mut processed = 0u64;
        let mut draining = false;
        loop {
            let next = tokio::select! {
                biased;
                notification = self.receiver.recv() => notification,
                changed = shutdown.changed(), if !draining => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Closing notification queue, draining remaining items");
                        self.receiver.close();
                        draining = true;
                    }
                    continue;
                }
            };

            let Some(notification) = next else {
                break;
            };
            let span = notify_span!(kind = ?notification.kind);
            self.dispatch(notification).instrument(span).await;
            processed += 1;
        }

        info!(processed, "Notification dispatcher stopped");
    }

    /// Deliver one notification and record its outcome
    pub async fn dispatch(&self, notification: OutboundNotification) -> NotificationLogEntry {
        let started = Instant::now();
        let outcome = self.deliver(&notification).await;
        metrics().notification_completed(started.elapsed(), outcome.ok);

        if outcome.ok {
            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Notification delivered"
            );
        } else {
            warn!(
                detail = outcome.detail.as_deref().unwrap_or(""),
                "Notification delivery failed"
            );
        }

        self.recorder.record(&notification, outcome)
    }

    /// The send runs on its own task so a panicking notifier only fails this
    /// one delivery.
    async fn deliver(&self, notification: &OutboundNotification) -> NotificationOutcome {
        let notifier = self.notifier.clone();
        let text = notification.text.clone();
        let send = tokio::spawn(async move { notifier.send(&text).await });

        match send.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => NotificationOutcome::failed("notifier panicked"),
            Err(e) => NotificationOutcome::failed(format!("notifier task failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSection;
    use crate::monitor::{Engine, EngineEvent, NotificationKind};
    use async_trait::async_trait;

    struct PanickingNotifier;

    #[async_trait]
    impl Notifier for PanickingNotifier {
        async fn send(&self, _text: &str) -> NotificationOutcome {
            panic!("gateway client bug");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_panicking_notifier_is_recorded_as_failure() {
        let (engine, queue) = Engine::new(EngineSection::default());
        let mut events = engine.subscribe();
        engine.ingest_alert(2500.0).unwrap();
        engine.notify_startup("still alive");

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            NotificationDispatcher::new(Arc::new(PanickingNotifier), queue).spawn(shutdown_rx);

        let mut recorded = Vec::new();
        while recorded.len() < 2 {
            if let EngineEvent::NotificationRecorded(entry) = events.recv().await.unwrap() {
                recorded.push(entry);
            }
        }

        assert!(recorded.iter().all(|entry| !entry.ok));
        assert_eq!(recorded[0].kind, NotificationKind::Alert);
        assert_eq!(recorded[1].kind, NotificationKind::Startup);
        assert_eq!(
            recorded[0].detail.as_deref(),
            Some("notifier panicked")
        );

        // Dropping the engine closes the queue and the dispatcher exits
        drop(engine);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_drains_buffered_notifications() {
        let (engine, queue) = Engine::new(EngineSection::default());
        let notifier = Arc::new(crate::testing::MockNotifier::new());
        for value in [2100.0, 2200.0, 2300.0] {
            engine.ingest_alert(value).unwrap();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        NotificationDispatcher::new(notifier.clone(), queue)
            .run(shutdown_rx)
            .await;

        assert_eq!(notifier.sent_count().await, 3);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.notifications.len(), 3);
        assert!(snapshot.notifications.iter().all(|entry| entry.ok));

        // Queue is closed now; further notifications fail immediately
        engine.ingest_alert(2400.0).unwrap();
        let last = engine.snapshot().notifications.last().cloned().unwrap();
        assert!(!last.ok);
        assert_eq!(last.detail.as_deref(), Some("notification dispatcher stopped"));
    }
}
