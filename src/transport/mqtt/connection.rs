//! Pure connection state management for the MQTT listener
//!
//! Connection states, the reconnect backoff schedule and translation of the
//! `[mqtt]` config section into `rumqttc` options.

use crate::config::MqttSection;
use rumqttc::Transport as RumqttcTransport;
use rumqttc::v5::MqttOptions;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Connection state of the MQTT listener
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial state, first connection attempt in progress
    Connecting,
    /// Broker acknowledged the session and subscriptions were requested
    Connected,
    /// Connection dropped with reason
    Disconnected(String),
    /// Waiting before reconnection attempt N
    Reconnecting(u32),
    /// Listener gave up after exhausting the configured attempts
    PermanentlyDisconnected(String),
    /// Listener was asked to stop
    Stopped,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Short lowercase name for status output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected(_) => "disconnected",
            Self::Reconnecting(_) => "reconnecting",
            Self::PermanentlyDisconnected(_) => "permanently_disconnected",
            Self::Stopped => "stopped",
        }
    }
}

/// Reconnection configuration
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts (None = unlimited)
    pub max_attempts: Option<u32>,
    /// Backoff schedule in milliseconds, indexed by attempt
    pub backoff_pattern: Vec<u64>,
    /// Delay used once the pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_pattern: vec![250, 500, 1000, 2000, 5000],
            sustained_delay: 5000,
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay in milliseconds for a 1-based attempt number
    pub fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        let index = attempt.saturating_sub(1) as usize;
        self.backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Listener is already running")]
    AlreadyRunning,
    #[error("Gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Build `rumqttc` options from the `[mqtt]` section.
///
/// Credentials are read from the environment variables the section names.
/// A fresh client id is generated on every call.
pub fn configure_mqtt_options(config: &MqttSection) -> Result<MqttOptions, MqttError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let client_id = format!("{}-{timestamp}", config.client_id);
    let mut mqtt_options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(username) = config.username() {
        let password = config.password().unwrap_or_default();
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));

    Ok(mqtt_options)
}
