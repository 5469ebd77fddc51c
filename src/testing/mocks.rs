//! Mock implementations for testing
//!
//! Provides a mock [`Notifier`] and a mock [`TelemetrySink`] so the dispatcher
//! and the listener can be exercised without a gateway or an engine.

use crate::error::MonitorError;
use crate::monitor::NotificationOutcome;
use crate::notify::Notifier;
use crate::transport::{InboundMessage, TelemetrySink};
use async_trait::async_trait;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock notifier for testing
#[derive(Debug, Default, Clone)]
pub struct MockNotifier {
    pub sent_messages: Arc<Mutex<Vec<String>>>,
    pub should_fail: bool,
    pub delay: Option<Duration>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send reports `ok = false`
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Every send takes this long before completing
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub async fn get_sent_messages(&self) -> Vec<String> {
        self.sent_messages.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent_messages.lock().await.len()
    }

    pub async fn clear_history(&self) {
        self.sent_messages.lock().await.clear();
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, text: &str) -> NotificationOutcome {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.sent_messages.lock().await.push(text.to_string());

        if self.should_fail {
            NotificationOutcome::failed("HTTP 503 - mock gateway unavailable")
        } else {
            NotificationOutcome::delivered("HTTP 200 - mock delivered")
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock telemetry sink for testing
///
/// Mirrors the engine's input contract: non-finite values are rejected.
#[derive(Debug, Default, Clone)]
pub struct MockSink {
    pub accepted: Arc<StdMutex<Vec<InboundMessage>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_accepted(&self) -> Vec<InboundMessage> {
        self.accepted
            .lock()
            .map(|accepted| accepted.clone())
            .unwrap_or_default()
    }
}

impl TelemetrySink for MockSink {
    fn accept(&self, message: InboundMessage) -> Result<(), MonitorError> {
        if !message.value.is_finite() {
            return Err(MonitorError::invalid_reading(message.value));
        }
        if let Ok(mut accepted) = self.accepted.lock() {
            accepted.push(message);
        }
        Ok(())
    }
}
