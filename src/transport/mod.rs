//! Transport layer for sensor telemetry
//!
//! Decoded messages leave the transport as [`InboundMessage`] values and are
//! handed to a [`TelemetrySink`]. The engine is the production sink; tests
//! substitute their own.

use crate::error::MonitorError;
use crate::monitor::Engine;
use serde::Serialize;

pub mod mqtt;

/// Logical channel a message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Periodic ppm readings
    Reading,
    /// Discrete threshold alerts
    Alert,
}

/// A decoded telemetry message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InboundMessage {
    pub channel: Channel,
    pub value: f64,
}

impl InboundMessage {
    pub fn reading(value: f64) -> Self {
        Self {
            channel: Channel::Reading,
            value,
        }
    }

    pub fn alert(value: f64) -> Self {
        Self {
            channel: Channel::Alert,
            value,
        }
    }
}

/// Consumer of decoded telemetry
pub trait TelemetrySink: Send + Sync {
    /// Apply one message. Errors describe rejected input; they are not fatal.
    fn accept(&self, message: InboundMessage) -> Result<(), MonitorError>;
}

impl TelemetrySink for Engine {
    fn accept(&self, message: InboundMessage) -> Result<(), MonitorError> {
        match message.channel {
            Channel::Reading => self.ingest_reading(message.value).map(|_| ()),
            Channel::Alert => self.ingest_alert(message.value).map(|_| ()),
        }
    }
}
