//! Stateful stream-processing engine
//!
//! The engine owns every piece of derived state: the accepted-reading sequence,
//! the current reading, the three bounded histories and the tier-transition
//! memory. All of it lives behind one mutex, so an ingest is a single
//! indivisible step for any concurrent [`Engine::snapshot`] caller.
//!
//! Notifications are never sent from inside the engine. They are pushed onto a
//! bounded queue drained by a [`NotificationDispatcher`](crate::notify::NotificationDispatcher),
//! which reports each outcome back through a [`NotificationRecorder`].

use super::history::BoundedHistory;
use super::messages;
use super::model::{
    AlertEvent, CurrentReading, EngineEvent, NotificationKind, NotificationLogEntry,
    NotificationOutcome, OutboundNotification, Reading, Snapshot,
};
use super::tier::{classify, StatusTier};
use crate::config::EngineSection;
use crate::error::MonitorError;
use crate::observability::metrics::metrics;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Mutable state guarded by the engine mutex
#[derive(Debug)]
struct EngineState {
    sequence: u64,
    current: Option<CurrentReading>,
    last_tier: Option<StatusTier>,
    last_alert: Option<AlertEvent>,
    readings: BoundedHistory<Reading>,
    alerts: BoundedHistory<AlertEvent>,
    notifications: BoundedHistory<NotificationLogEntry>,
}

impl EngineState {
    fn new(capacity: usize) -> Self {
        Self {
            sequence: 0,
            current: None,
            last_tier: None,
            last_alert: None,
            readings: BoundedHistory::with_capacity(capacity),
            alerts: BoundedHistory::with_capacity(capacity),
            notifications: BoundedHistory::with_capacity(capacity),
        }
    }
}

/// State shared between the engine and the notification recorder
#[derive(Debug)]
struct Shared {
    state: Mutex<EngineState>,
    events: broadcast::Sender<EngineEvent>,
}

impl Shared {
    /// Every critical section leaves the state consistent, so a poisoned lock
    /// is still safe to use.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn append_log(&self, entry: NotificationLogEntry) {
        self.lock().notifications.push(entry.clone());
        self.publish(EngineEvent::NotificationRecorded(entry));
    }
}

/// Gas telemetry state engine
#[derive(Debug)]
pub struct Engine {
    shared: Arc<Shared>,
    outbox: mpsc::Sender<OutboundNotification>,
    settings: EngineSection,
}

/// Receiving half of the notification queue, handed to the dispatcher
#[derive(Debug)]
pub struct NotificationQueue {
    pub receiver: mpsc::Receiver<OutboundNotification>,
    pub recorder: NotificationRecorder,
}

/// Appends delivery outcomes to the engine's notification log
#[derive(Debug, Clone)]
pub struct NotificationRecorder {
    shared: Arc<Shared>,
}

impl NotificationRecorder {
    /// Record the outcome of one delivery attempt and return the log entry
    pub fn record(
        &self,
        notification: &OutboundNotification,
        outcome: NotificationOutcome,
    ) -> NotificationLogEntry {
        let entry = NotificationLogEntry::from_outcome(notification, outcome);
        self.shared.append_log(entry.clone());
        entry
    }
}

impl Engine {
    /// Create an engine and the queue its notifications are delivered through
    pub fn new(settings: EngineSection) -> (Self, NotificationQueue) {
        let (outbox, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState::new(settings.history_capacity)),
            events,
        });

        let queue = NotificationQueue {
            receiver,
            recorder: NotificationRecorder {
                shared: shared.clone(),
            },
        };

        (
            Self {
                shared,
                outbox,
                settings,
            },
            queue,
        )
    }

    pub fn settings(&self) -> &EngineSection {
        &self.settings
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Apply one reading from the reading channel.
    ///
    /// Non-finite values are rejected without touching any state.
    pub fn ingest_reading(&self, value: f64) -> Result<Reading, MonitorError> {
        if !value.is_finite() {
            metrics().reading_rejected();
            return Err(MonitorError::invalid_reading(value));
        }

        let now = Utc::now();
        let tier = classify(value);
        let mut failed_entries = Vec::new();

        let reading = {
            let mut state = self.shared.lock();

            state.sequence += 1;
            let sequence = state.sequence;
            let reading = Reading {
                sequence,
                value,
                tier,
                elapsed_secs: sequence.saturating_mul(self.settings.sample_interval_secs),
                timestamp: now,
            };

            let delta = state
                .current
                .as_ref()
                .map(|previous| value - previous.value)
                .unwrap_or(0.0);
            state.readings.push(reading.clone());
            state.current = Some(CurrentReading {
                sequence,
                value,
                tier,
                timestamp: now,
                delta,
            });

            if let Some(notification) = self.detect_transition(&mut state, &reading) {
                failed_entries.extend(self.enqueue(&mut state, notification));
            }

            reading
        };

        metrics().reading_accepted();
        debug!(
            sequence = reading.sequence,
            value = reading.value,
            tier = %reading.tier,
            "Reading accepted"
        );

        self.shared
            .publish(EngineEvent::ReadingAccepted(reading.clone()));
        for entry in failed_entries {
            self.shared.publish(EngineEvent::NotificationRecorded(entry));
        }

        Ok(reading)
    }

    /// Apply one event from the alert channel. Every accepted alert is notified.
    pub fn ingest_alert(&self, value: f64) -> Result<AlertEvent, MonitorError> {
        if !value.is_finite() {
            metrics().reading_rejected();
            return Err(MonitorError::invalid_reading(value));
        }

        let alert = AlertEvent {
            value,
            timestamp: Utc::now(),
        };

        let failed_entry = {
            let mut state = self.shared.lock();
            state.alerts.push(alert.clone());
            state.last_alert = Some(alert.clone());

            let notification = OutboundNotification::new(
                NotificationKind::Alert,
                messages::gas_alert(value, &alert.timestamp),
            );
            self.enqueue(&mut state, notification)
        };

        metrics().alert_received();
        warn!(value = alert.value, "Gas alert received");

        self.shared.publish(EngineEvent::AlertReceived(alert.clone()));
        if let Some(entry) = failed_entry {
            self.shared.publish(EngineEvent::NotificationRecorded(entry));
        }

        Ok(alert)
    }

    /// Queue a free-form notification, such as the startup delivery check
    pub fn notify_startup(&self, text: impl Into<String>) {
        let notification = OutboundNotification::new(NotificationKind::Startup, text.into());
        let failed_entry = {
            let mut state = self.shared.lock();
            self.enqueue(&mut state, notification)
        };
        if let Some(entry) = failed_entry {
            self.shared.publish(EngineEvent::NotificationRecorded(entry));
        }
    }

    /// Consistent copy of the whole engine state
    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.lock();
        Snapshot {
            taken_at: Utc::now(),
            current: state.current.clone(),
            last_alert: state.last_alert.clone(),
            last_tier: state.last_tier,
            readings: state.readings.to_vec(),
            alerts: state.alerts.to_vec(),
            notifications: state.notifications.to_vec(),
        }
    }

    /// Number of accepted readings so far
    pub fn sequence(&self) -> u64 {
        self.shared.lock().sequence
    }

    pub fn current_tier(&self) -> Option<StatusTier> {
        self.shared.lock().last_tier
    }

    /// Notifications queued but not yet picked up by the dispatcher
    pub fn pending_notifications(&self) -> usize {
        self.outbox.max_capacity() - self.outbox.capacity()
    }

    /// Update the transition memory and decide whether the reading warrants a
    /// notification. Must be called with the state lock held.
    fn detect_transition(
        &self,
        state: &mut EngineState,
        reading: &Reading,
    ) -> Option<OutboundNotification> {
        let tier = reading.tier;
        match state.last_tier {
            None => {
                state.last_tier = Some(tier);
                info!(tier = %tier, value = reading.value, "Initial air quality tier");
                if tier == StatusTier::Danger && self.settings.notify_on_initial_danger {
                    Some(OutboundNotification::new(
                        NotificationKind::TierTransition {
                            from: None,
                            to: tier,
                        },
                        messages::initial_danger(reading.value, &reading.timestamp),
                    ))
                } else {
                    None
                }
            }
            Some(previous) if previous != tier => {
                state.last_tier = Some(tier);
                info!(
                    from = %previous,
                    to = %tier,
                    value = reading.value,
                    "Air quality tier changed"
                );
                Some(OutboundNotification::new(
                    NotificationKind::TierTransition {
                        from: Some(previous),
                        to: tier,
                    },
                    messages::tier_transition(previous, tier, reading.value, &reading.timestamp),
                ))
            }
            Some(_) => None,
        }
    }

    /// Hand a notification to the dispatcher without blocking.
    ///
    /// If the queue cannot take it, the attempt is logged as failed right away
    /// so every notification still yields exactly one log entry.
    fn enqueue(
        &self,
        state: &mut EngineState,
        notification: OutboundNotification,
    ) -> Option<NotificationLogEntry> {
        match self.outbox.try_send(notification) {
            Ok(()) => {
                metrics().notification_queued();
                None
            }
            Err(err) => {
                let (notification, reason) = match err {
                    mpsc::error::TrySendError::Full(n) => (n, "notification queue full"),
                    mpsc::error::TrySendError::Closed(n) => (n, "notification dispatcher stopped"),
                };
                metrics().notification_dropped();
                warn!(kind = ?notification.kind, "Notification not queued: {}", reason);

                let entry = NotificationLogEntry::from_outcome(
                    &notification,
                    NotificationOutcome::failed(reason),
                );
                state.notifications.push(entry.clone());
                Some(entry)
            }
        }
    }
}
