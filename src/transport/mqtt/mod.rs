//! MQTT listener for the gas sensor topics
//!
//! Pure logic is kept apart from I/O:
//!
//! - [`connection`] - connection state, backoff schedule and client options
//! - [`message_handler`] - event routing and payload decoding
//! - [`health_monitor`] - reconnection decisions and health metrics
//! - [`listener`] - the spawned event-loop task
//!
//! # Usage
//!
//! ```rust,no_run
//! use gasmon::config::MonitorConfig;
//! use gasmon::monitor::Engine;
//! use gasmon::transport::mqtt::MqttListener;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let config = MonitorConfig::load_from_file("gasmon.toml".as_ref())?;
//! let (engine, _queue) = Engine::new(config.engine.clone());
//!
//! let mut listener = MqttListener::new(config.mqtt.clone(), Arc::new(engine));
//! listener.start()?;
//! // ...
//! listener.stop().await;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod connection;
pub mod health_monitor;
pub mod listener;
pub mod message_handler;

pub use connection::{ConnectionState, MqttError, ReconnectConfig};
pub use health_monitor::{ConnectionEvent, HealthMetrics, HealthMonitor, ReconnectionDecision};
pub use listener::MqttListener;
pub use message_handler::{EventRoute, MessageHandler};
