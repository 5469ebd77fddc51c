//! Observability: structured logging, process metrics and the HTTP status server

pub mod logging;
pub mod metrics;
pub mod status;

pub use logging::{LogFormat, init_default_logging, init_logging};
pub use metrics::{MetricsCollector, MetricsSnapshot, metrics};
pub use status::StatusServer;

pub use logging::{lifecycle_span, mqtt_span, notify_span};
