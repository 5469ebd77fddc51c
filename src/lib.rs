//! gasmon - LPG gas concentration monitor
//!
//! Consumes ppm readings and threshold alerts from an MQTT broker, classifies
//! them into SAFE / WARNING / DANGER tiers, keeps bounded histories and sends
//! text notifications through an HTTP messaging gateway when the tier changes
//! or the sensor raises an alert.
//!
//! # Overview
//!
//! - [`monitor`]: the state engine (classification, histories, transitions)
//! - [`transport`]: MQTT listener with reconnection and payload decoding
//! - [`notify`]: notification dispatch and the HTTP gateway client
//! - [`observability`]: logging, metrics and the status endpoints
//! - [`service`]: wiring and lifecycle
//!
//! # Quick Start
//!
//! ```rust
//! use gasmon::config::EngineSection;
//! use gasmon::monitor::{Engine, StatusTier};
//!
//! let (engine, _queue) = Engine::new(EngineSection::default());
//! engine.ingest_reading(350.0).unwrap();
//! engine.ingest_reading(1200.0).unwrap();
//!
//! let snapshot = engine.snapshot();
//! assert_eq!(snapshot.current.unwrap().tier, StatusTier::Warning);
//! assert_eq!(snapshot.readings.len(), 2);
//! ```

pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod observability;
pub mod service;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, MonitorConfig};
pub use error::MonitorError;
pub use monitor::{Engine, Snapshot, StatusTier, classify};
pub use notify::{HttpNotifier, Notifier};
pub use service::GasMonitor;
pub use transport::mqtt::MqttListener;
