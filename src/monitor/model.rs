//! Domain types produced and retained by the engine

use super::tier::StatusTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single accepted measurement. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// 1-based position among accepted readings
    pub sequence: u64,
    /// Concentration in ppm
    pub value: f64,
    /// Tier the value classified into
    pub tier: StatusTier,
    /// `sequence * sample_interval`, the x-axis of the reading chart
    pub elapsed_secs: u64,
    pub timestamp: DateTime<Utc>,
}

/// Discrete alert received on the alert channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Latest accepted reading together with its change from the previous one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReading {
    pub sequence: u64,
    pub value: f64,
    pub tier: StatusTier,
    pub timestamp: DateTime<Utc>,
    /// Difference to the previously accepted value; 0.0 for the first reading
    pub delta: f64,
}

/// Why a notification was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Tier changed between consecutive readings. `from` is `None` for the
    /// first classified reading.
    TierTransition {
        from: Option<StatusTier>,
        to: StatusTier,
    },
    /// Event received on the alert channel
    Alert,
    /// Delivery self-test sent at startup
    Startup,
}

/// A notification waiting for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundNotification {
    pub kind: NotificationKind,
    pub text: String,
    pub queued_at: DateTime<Utc>,
}

impl OutboundNotification {
    pub fn new(kind: NotificationKind, text: String) -> Self {
        Self {
            kind,
            text,
            queued_at: Utc::now(),
        }
    }
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    pub ok: bool,
    /// Status code and body excerpt, or error text
    pub detail: Option<String>,
}

impl NotificationOutcome {
    pub fn delivered(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

/// One row of the notification log: exactly one per delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: NotificationKind,
    pub message: String,
    pub ok: bool,
    pub detail: Option<String>,
}

impl NotificationLogEntry {
    pub fn from_outcome(notification: &OutboundNotification, outcome: NotificationOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: notification.kind.clone(),
            message: notification.text.clone(),
            ok: outcome.ok,
            detail: outcome.detail,
        }
    }
}

/// Consistent, owned copy of engine state
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub current: Option<CurrentReading>,
    pub last_alert: Option<AlertEvent>,
    /// Tier remembered for transition detection (`None` until the first reading)
    pub last_tier: Option<StatusTier>,
    /// Oldest first
    pub readings: Vec<Reading>,
    /// Oldest first
    pub alerts: Vec<AlertEvent>,
    /// Oldest first
    pub notifications: Vec<NotificationLogEntry>,
}

/// Pushed to subscribers whenever engine state changes
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ReadingAccepted(Reading),
    AlertReceived(AlertEvent),
    NotificationRecorded(NotificationLogEntry),
}
