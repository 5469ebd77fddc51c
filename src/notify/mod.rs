//! Outbound text notifications
//!
//! The engine never talks to a notifier directly. It queues
//! [`OutboundNotification`](crate::monitor::OutboundNotification)s which the
//! [`NotificationDispatcher`] hands, one at a time, to a [`Notifier`].

pub mod dispatcher;
pub mod http;

pub use dispatcher::NotificationDispatcher;
pub use http::{HttpNotifier, HttpNotifierConfig};

use crate::monitor::NotificationOutcome;
use async_trait::async_trait;

/// Sends a text message somewhere and reports whether it got there.
///
/// Implementations must not panic on delivery failure; every failure is an
/// `ok = false` outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> NotificationOutcome;

    /// Short name for logs
    fn name(&self) -> &str;
}
