//! Service lifecycle
//!
//! Wires the engine, the notification dispatcher, the MQTT listener and the
//! optional status server together, and tears them down in order.

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::lifecycle_span;
use crate::monitor::{Engine, NotificationQueue};
use crate::notify::{HttpNotifier, HttpNotifierConfig, NotificationDispatcher, Notifier};
use crate::observability::StatusServer;
use crate::observability::metrics::metrics;
use crate::transport::TelemetrySink;
use crate::transport::mqtt::{ConnectionState, MqttListener, ReconnectConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, warn};

/// How long shutdown waits for queued notifications to go out
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Running gas monitor with injected notifier
pub struct GasMonitor {
    config: MonitorConfig,
    engine: Arc<Engine>,
    notifier: Arc<dyn Notifier>,
    queue: Option<NotificationQueue>,
    listener: MqttListener,
    shutdown_tx: watch::Sender<bool>,
    dispatcher_handle: Option<JoinHandle<()>>,
    status_handle: Option<JoinHandle<()>>,
    status_sync_handle: Option<JoinHandle<()>>,
    status_addr: Option<SocketAddr>,
    drain_timeout: Duration,
    running: bool,
}

impl GasMonitor {
    /// Build a monitor that delivers through `notifier`
    pub fn new(config: MonitorConfig, notifier: Arc<dyn Notifier>) -> Self {
        let (engine, queue) = Engine::new(config.engine.clone());
        let engine = Arc::new(engine);
        let sink: Arc<dyn TelemetrySink> = engine.clone();
        let listener = MqttListener::new(config.mqtt.clone(), sink);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            engine,
            notifier,
            queue: Some(queue),
            listener,
            shutdown_tx,
            dispatcher_handle: None,
            status_handle: None,
            status_sync_handle: None,
            status_addr: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            running: false,
        }
    }

    /// Build a monitor backed by the configured HTTP gateway
    pub fn from_config(config: MonitorConfig) -> Result<Self, MonitorError> {
        let notifier = HttpNotifier::new(HttpNotifierConfig::from_monitor_config(&config)?)?;
        Ok(Self::new(config, Arc::new(notifier)))
    }

    /// Override the listener's reconnect policy. Only effective before `start`.
    pub fn with_reconnect_config(mut self, reconnect_config: ReconnectConfig) -> Self {
        self.listener.set_reconnect_config(reconnect_config);
        self
    }

    /// Bound on how long `shutdown` waits for queued notifications
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn engine(&self) -> Arc<Engine> {
        self.engine.clone()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Address the status server is bound to, if it is enabled and running
    pub fn status_addr(&self) -> Option<SocketAddr> {
        self.status_addr
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.listener.connection_state()
    }

    /// Start every component. The startup notification, if configured, is
    /// queued before the listener connects.
    pub async fn start(&mut self) -> Result<(), MonitorError> {
        let span = lifecycle_span!(phase = "start");
        async {
            let queue = self
                .queue
                .take()
                .ok_or_else(|| MonitorError::internal_error("Monitor already started"))?;

            metrics().set_monitor_state("starting");

            let dispatcher = NotificationDispatcher::new(self.notifier.clone(), queue);
            self.dispatcher_handle = Some(dispatcher.spawn(self.shutdown_tx.subscribe()));

            if let Some(message) = &self.config.notifier.startup_message {
                self.engine.notify_startup(message.clone());
            }

            self.listener.start()?;

            if let Some(status) = self.config.status.clone() {
                self.start_status_server(status.port)?;
            }

            self.running = true;
            metrics().set_monitor_state("running");
            info!(
                broker = %self.config.mqtt.broker_url,
                "Gas monitor running"
            );
            Ok::<(), MonitorError>(())
        }
        .instrument(span)
        .await
    }

    fn start_status_server(&mut self, port: u16) -> Result<(), MonitorError> {
        let server = Arc::new(StatusServer::new(port, self.engine.clone()));

        let mut shutdown = self.shutdown_tx.subscribe();
        let signal = async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        };
        let (addr, serve) = server.clone().bind(signal).map_err(|e| {
            MonitorError::internal_error(format!("Failed to bind status server: {e}"))
        })?;
        self.status_addr = Some(addr);
        self.status_handle = Some(tokio::spawn(serve));

        let mut states = self.listener.state_receiver();
        self.status_sync_handle = Some(tokio::spawn(async move {
            loop {
                let connected = states.borrow_and_update().is_connected();
                server.set_mqtt_connected(connected);
                if states.changed().await.is_err() {
                    break;
                }
            }
        }));

        Ok(())
    }

    /// Resolves once the listener has given up reconnecting
    pub async fn wait_for_permanent_disconnect(&self) {
        let mut states = self.listener.state_receiver();
        loop {
            if matches!(
                *states.borrow_and_update(),
                ConnectionState::PermanentlyDisconnected(_)
            ) {
                return;
            }
            if states.changed().await.is_err() {
                // Listener is gone; nothing will ever change again
                std::future::pending::<()>().await;
            }
        }
    }

    /// Stop the listener, drain queued notifications, stop the status server
    pub async fn shutdown(&mut self) -> Result<(), MonitorError> {
        let span = lifecycle_span!(phase = "shutdown");
        async {
            if !self.running {
                return Ok(());
            }
            metrics().set_monitor_state("stopping");
            info!("Shutting down gas monitor");

            self.listener.stop().await;

            // Dispatcher closes the queue and finishes what is buffered
            let _ = self.shutdown_tx.send(true);

            if let Some(mut handle) = self.dispatcher_handle.take() {
                match tokio::time::timeout(self.drain_timeout, &mut handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Notification dispatcher failed: {}", e),
                    Err(_) => {
                        handle.abort();
                        warn!(
                            timeout_ms = self.drain_timeout.as_millis() as u64,
                            abandoned = self.engine.pending_notifications(),
                            "Timed out draining notifications, dispatcher aborted"
                        );
                    }
                }
            }

            if let Some(handle) = self.status_sync_handle.take() {
                handle.abort();
            }
            if let Some(handle) = self.status_handle.take() {
                if let Err(e) = handle.await {
                    error!("Status server task failed: {}", e);
                }
            }
            self.status_addr = None;

            self.running = false;
            metrics().set_monitor_state("stopped");
            info!("Gas monitor stopped");
            Ok::<(), MonitorError>(())
        }
        .instrument(span)
        .await
    }
}

impl Drop for GasMonitor {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in [
            self.dispatcher_handle.take(),
            self.status_sync_handle.take(),
            self.status_handle.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}
