//! Pure health monitoring and reconnection logic for the MQTT listener

use super::connection::{ConnectionState, ReconnectConfig};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Readings are expected every few tens of seconds; silence longer than this
/// on a live connection is treated as unhealthy.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// Pure health monitoring and reconnection decision logic
pub struct HealthMonitor;

impl HealthMonitor {
    /// Determine if reconnection should be attempted.
    /// Retries forever when `max_attempts` is None.
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        if let Some(max_attempts) = config.max_attempts {
            if current_attempts >= max_attempts {
                return ReconnectionDecision::AbortMaxAttemptsExceeded;
            }
        }

        let attempt = current_attempts.saturating_add(1);
        ReconnectionDecision::Proceed {
            attempt,
            delay_ms: config.calculate_backoff_delay(attempt),
        }
    }

    /// Determine next state after connection event
    pub fn determine_next_state(event: ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnAckReceived => ConnectionState::Connected,
            ConnectionEvent::DisconnectedByBroker => {
                ConnectionState::Disconnected("Broker disconnected".to_string())
            }
            ConnectionEvent::NetworkError(error) => ConnectionState::Disconnected(error),
            ConnectionEvent::ReconnectionStarted(attempt) => ConnectionState::Reconnecting(attempt),
            ConnectionEvent::PermanentFailure(reason) => {
                ConnectionState::PermanentlyDisconnected(reason)
            }
            ConnectionEvent::ShutdownRequested => ConnectionState::Stopped,
        }
    }

    /// Calculate health metrics for the listener
    pub fn calculate_health_metrics(
        connect_time: Option<Instant>,
        last_message_time: Option<Instant>,
        reconnect_count: u32,
        stale_after: Duration,
    ) -> HealthMetrics {
        let now = Instant::now();

        let uptime = connect_time.map(|t| now.duration_since(t));
        let time_since_last_message = last_message_time.map(|t| now.duration_since(t));

        HealthMetrics {
            uptime,
            time_since_last_message,
            reconnect_count,
            is_healthy: Self::determine_health_status(uptime, time_since_last_message, stale_after),
        }
    }

    fn determine_health_status(
        uptime: Option<Duration>,
        time_since_last_message: Option<Duration>,
        stale_after: Duration,
    ) -> bool {
        match (uptime, time_since_last_message) {
            (Some(_), None) => true,
            (Some(_), Some(last_msg)) => last_msg < stale_after,
            _ => false,
        }
    }

    /// Log connection state transition
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                info!("MQTT connection established");
            }
            (ConnectionState::Connected, ConnectionState::Disconnected(reason)) => {
                warn!("MQTT connection lost: {}", reason);
            }
            (_, ConnectionState::Disconnected(reason)) => {
                warn!("MQTT connection attempt failed: {}", reason);
            }
            (ConnectionState::Reconnecting(attempt), ConnectionState::Connected) => {
                info!("Reconnected to MQTT broker after {} attempt(s)", attempt);
            }
            (_, ConnectionState::PermanentlyDisconnected(reason)) => {
                error!("MQTT connection permanently failed: {}", reason);
            }
            (_, ConnectionState::Reconnecting(_)) => {}
            _ => {
                info!("MQTT connection state: {:?} -> {:?}", from, to);
            }
        }
    }

    /// Validate reconnection configuration
    pub fn validate_connection_config(config: &ReconnectConfig) -> Result<(), String> {
        if config.max_attempts == Some(0) {
            return Err("max_attempts must be greater than 0 or None for unlimited".to_string());
        }

        if config.sustained_delay == 0 {
            return Err("sustained_delay must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay_ms: u64 },
    /// Abort reconnection, shutdown requested
    AbortShutdownRequested,
    /// Abort reconnection, max attempts exceeded
    AbortMaxAttemptsExceeded,
}

/// Connection events that trigger state transitions
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    ConnAckReceived,
    DisconnectedByBroker,
    NetworkError(String),
    ReconnectionStarted(u32),
    PermanentFailure(String),
    ShutdownRequested,
}

/// Health metrics for connection monitoring
#[derive(Debug, Clone)]
pub struct HealthMetrics {
    /// Time since the current session was established
    pub uptime: Option<Duration>,
    /// Time since last message received
    pub time_since_last_message: Option<Duration>,
    /// Number of reconnections since start
    pub reconnect_count: u32,
    pub is_healthy: bool,
}
