//! Telemetry state engine
//!
//! Classification, bounded histories, transition detection and the message
//! templates used for outbound notifications.

pub mod engine;
pub mod history;
pub mod messages;
pub mod model;
pub mod tier;

pub use engine::{Engine, NotificationQueue, NotificationRecorder};
pub use history::BoundedHistory;
pub use model::{
    AlertEvent, CurrentReading, EngineEvent, NotificationKind, NotificationLogEntry,
    NotificationOutcome, OutboundNotification, Reading, Snapshot,
};
pub use tier::{classify, StatusTier, SAFE_MAX_PPM, WARNING_MAX_PPM};
