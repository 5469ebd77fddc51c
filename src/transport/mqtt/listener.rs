//! Impure I/O for the MQTT listener
//!
//! A single spawned task owns the `rumqttc` client and event loop. It
//! subscribes on every ConnAck, decodes publishes into [`InboundMessage`]s for
//! the sink and rebuilds the connection with backoff after any failure.

use super::connection::{ConnectionState, MqttError, ReconnectConfig, configure_mqtt_options};
use super::health_monitor::{
    ConnectionEvent, DEFAULT_STALE_AFTER, HealthMetrics, HealthMonitor, ReconnectionDecision,
};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::MqttSection;
use crate::error::MonitorError;
use crate::mqtt_span;
use crate::observability::metrics::metrics;
use crate::transport::{InboundMessage, TelemetrySink};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, EventLoop};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

/// Capacity of the rumqttc request channel
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// How long `stop()` waits for the task before aborting it
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Timestamps behind [`MqttListener::get_health_metrics`]
#[derive(Debug, Default)]
struct Activity {
    connect_time: Option<Instant>,
    last_message_time: Option<Instant>,
    reconnect_count: u32,
}

type SharedActivity = Arc<Mutex<Activity>>;

fn with_activity<R>(activity: &SharedActivity, f: impl FnOnce(&mut Activity) -> R) -> R {
    let mut guard = activity.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// Everything the event-loop task needs, moved into it on start
struct ListenerTask {
    config: MqttSection,
    reconnect_config: ReconnectConfig,
    sink: Arc<dyn TelemetrySink>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_rx: watch::Receiver<bool>,
    activity: SharedActivity,
    topics: Vec<String>,
}

/// MQTT subscriber feeding decoded telemetry into a [`TelemetrySink`]
pub struct MqttListener {
    config: MqttSection,
    reconnect_config: ReconnectConfig,
    sink: Arc<dyn TelemetrySink>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    activity: SharedActivity,
    handle: Option<JoinHandle<()>>,
}

impl MqttListener {
    pub fn new(config: MqttSection, sink: Arc<dyn TelemetrySink>) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            reconnect_config: ReconnectConfig::default(),
            sink,
            state_tx,
            state_rx,
            shutdown_tx,
            activity: Arc::new(Mutex::new(Activity::default())),
            handle: None,
        }
    }

    /// Override the reconnection schedule
    pub fn with_reconnect_config(mut self, reconnect_config: ReconnectConfig) -> Self {
        self.set_reconnect_config(reconnect_config);
        self
    }

    /// Takes effect on the next `start`
    pub fn set_reconnect_config(&mut self, reconnect_config: ReconnectConfig) {
        self.reconnect_config = reconnect_config;
    }

    /// Spawn the event-loop task. Returns immediately; the connection is
    /// established (and retried) in the background.
    pub fn start(&mut self) -> Result<(), MqttError> {
        if self.handle.is_some() {
            return Err(MqttError::AlreadyRunning);
        }
        HealthMonitor::validate_connection_config(&self.reconnect_config)
            .map_err(|e| MqttError::ConnectionFailed(e.into()))?;

        let options = configure_mqtt_options(&self.config)?;
        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        // No receivers exist after a previous stop, so plain `send` would not clear the flag
        self.shutdown_tx.send_replace(false);
        let task = ListenerTask {
            config: self.config.clone(),
            reconnect_config: self.reconnect_config.clone(),
            sink: self.sink.clone(),
            state_tx: self.state_tx.clone(),
            shutdown_rx: self.shutdown_tx.subscribe(),
            activity: self.activity.clone(),
            topics: MessageHandler::build_subscription_topics(&self.config),
        };

        let span = mqtt_span!(broker = %self.config.broker_url);
        self.handle = Some(tokio::spawn(task.run(client, event_loop).instrument(span)));
        Ok(())
    }

    /// Signal shutdown and wait for the task to finish
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);

        if let Some(mut handle) = self.handle.take() {
            match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
                Ok(_) => debug!("MQTT listener task joined"),
                Err(_) => {
                    warn!("MQTT listener did not stop within {:?}, aborting", STOP_TIMEOUT);
                    handle.abort();
                }
            }
        }

        let _ = self.state_tx.send(ConnectionState::Stopped);
        metrics().mqtt_connection_lost();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Watch connection state changes
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn get_health_metrics(&self) -> HealthMetrics {
        with_activity(&self.activity, |activity| {
            HealthMonitor::calculate_health_metrics(
                activity.connect_time,
                activity.last_message_time,
                activity.reconnect_count,
                DEFAULT_STALE_AFTER,
            )
        })
    }

    /// Decode one publish and hand it to the sink.
    ///
    /// Returns `Ok(None)` for topics that are not ours, `Ok(Some(..))` for a
    /// message the sink accepted.
    pub fn handle_publish(
        topic: &str,
        payload: &[u8],
        config: &MqttSection,
        sink: &dyn TelemetrySink,
    ) -> Result<Option<InboundMessage>, MonitorError> {
        let Some(channel) = MessageHandler::resolve_channel(topic, config) else {
            return Ok(None);
        };

        let value = MessageHandler::decode_payload(payload)?;
        let message = InboundMessage { channel, value };
        sink.accept(message)?;
        Ok(Some(message))
    }
}

impl Drop for MqttListener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.shutdown_tx.send(true);
            handle.abort();
        }
    }
}

impl ListenerTask {
    async fn run(mut self, mut client: AsyncClient, mut event_loop: EventLoop) {
        info!(
            reading_topic = %self.config.reading_topic,
            alert_topic = %self.config.alert_topic,
            "Starting MQTT listener"
        );
        let mut reconnect_attempts = 0u32;

        loop {
            let polled = tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
                polled = event_loop.poll() => polled,
            };

            match polled {
                Ok(event) => {
                    let route = MessageHandler::route_mqtt_event(&event);
                    self.process_event_route(route, &client, &mut reconnect_attempts)
                        .await;
                }
                Err(e) => self.transition(ConnectionEvent::NetworkError(e.to_string())),
            }

            if matches!(*self.state_tx.borrow(), ConnectionState::Disconnected(_)) {
                match self.reconnect(&mut reconnect_attempts).await {
                    Some((new_client, new_event_loop)) => {
                        client = new_client;
                        event_loop = new_event_loop;
                    }
                    None => break,
                }
            }
        }

        let _ = client.try_disconnect();
        if !matches!(
            *self.state_tx.borrow(),
            ConnectionState::PermanentlyDisconnected(_)
        ) {
            self.transition(ConnectionEvent::ShutdownRequested);
        }
        info!("MQTT listener stopped");
    }

    async fn process_event_route(
        &self,
        route: EventRoute,
        client: &AsyncClient,
        reconnect_attempts: &mut u32,
    ) {
        match route {
            EventRoute::ConnectionAcknowledged => {
                if *reconnect_attempts > 0 {
                    with_activity(&self.activity, |a| a.reconnect_count += 1);
                }
                *reconnect_attempts = 0;
                with_activity(&self.activity, |a| a.connect_time = Some(Instant::now()));
                self.transition(ConnectionEvent::ConnAckReceived);
                self.subscribe_all(client).await;
            }
            EventRoute::MessageReceived {
                topic,
                payload,
                retain,
            } => {
                metrics().mqtt_message_received();
                with_activity(&self.activity, |a| a.last_message_time = Some(Instant::now()));
                self.handle_message(&topic, &payload, retain);
            }
            EventRoute::Disconnected => {
                self.transition(ConnectionEvent::DisconnectedByBroker);
            }
            EventRoute::SubscriptionConfirmed {
                packet_id,
                rejected,
            } => {
                if rejected > 0 {
                    warn!(packet_id, rejected, "Broker refused subscription");
                } else {
                    debug!(packet_id, "Subscription confirmed");
                }
            }
            EventRoute::InfrastructureEvent(event) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event);
            }
            EventRoute::OutgoingEvent => {}
        }
    }

    fn handle_message(&self, topic: &str, payload: &[u8], retain: bool) {
        debug!(topic, retain, bytes = payload.len(), "Received MQTT message");

        match MqttListener::handle_publish(topic, payload, &self.config, self.sink.as_ref()) {
            Ok(_) => {}
            Err(MonitorError::Decode(e)) => {
                metrics().payload_discarded();
                debug!(topic, "Discarding payload: {}", e);
            }
            Err(e) => warn!(topic, "Telemetry rejected: {}", e),
        }
    }

    async fn subscribe_all(&self, client: &AsyncClient) {
        for topic in &self.topics {
            match client.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
                Ok(()) => debug!(topic = %topic, "Subscribed"),
                Err(e) => warn!(topic = %topic, "Failed to subscribe: {}", e),
            }
        }
    }

    /// Sleep the backoff delay and build a fresh client. `None` means stop.
    async fn reconnect(&mut self, reconnect_attempts: &mut u32) -> Option<(AsyncClient, EventLoop)> {
        loop {
            let decision = HealthMonitor::should_attempt_reconnection(
                *reconnect_attempts,
                &self.reconnect_config,
                *self.shutdown_rx.borrow(),
            );

            match decision {
                ReconnectionDecision::Proceed { attempt, delay_ms } => {
                    *reconnect_attempts = attempt;
                    self.transition(ConnectionEvent::ReconnectionStarted(attempt));
                    metrics().mqtt_reconnect_attempt();
                    info!("Reconnecting to MQTT broker (attempt {}) in {}ms", attempt, delay_ms);

                    if !self.interruptible_sleep(delay_ms).await {
                        return None;
                    }

                    match configure_mqtt_options(&self.config) {
                        Ok(options) => {
                            return Some(AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY));
                        }
                        Err(e) => warn!("Failed to build MQTT options: {}", e),
                    }
                }
                ReconnectionDecision::AbortShutdownRequested => return None,
                ReconnectionDecision::AbortMaxAttemptsExceeded => {
                    let reason = MqttError::RetriesExhausted {
                        attempts: *reconnect_attempts,
                    }
                    .to_string();
                    self.transition(ConnectionEvent::PermanentFailure(reason));
                    return None;
                }
            }
        }
    }

    /// Returns false if shutdown was requested during the sleep
    async fn interruptible_sleep(&mut self, delay_ms: u64) -> bool {
        tokio::select! {
            changed = self.shutdown_rx.changed() => {
                changed.is_ok() && !*self.shutdown_rx.borrow()
            }
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
        }
    }

    fn transition(&self, event: ConnectionEvent) {
        let next = HealthMonitor::determine_next_state(event);
        let previous = self.state_tx.borrow().clone();
        if previous == next {
            return;
        }

        match &next {
            ConnectionState::Connected => metrics().mqtt_connection_established(),
            ConnectionState::Disconnected(_) if previous.is_connected() => {
                with_activity(&self.activity, |a| a.connect_time = None);
                metrics().mqtt_connection_lost();
            }
            ConnectionState::Disconnected(_) => metrics().mqtt_connection_failed(),
            _ => {}
        }

        HealthMonitor::log_state_transition(&previous, &next);
        let _ = self.state_tx.send(next);
    }
}
