//! Thread-safe metrics collection system
//!
//! Provides atomic counters and mutex-protected collections for tracking
//! operational statistics across ingestion, notification delivery and MQTT transport.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

const MAX_DELIVERY_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    // Ingestion metrics
    readings_accepted: AtomicU64,
    readings_rejected: AtomicU64,
    payloads_discarded: AtomicU64,
    alerts_received: AtomicU64,
    last_reading_at: AtomicU64,

    // Notification metrics
    notifications_queued: AtomicU64,
    notifications_delivered: AtomicU64,
    notifications_failed: AtomicU64,
    notifications_dropped: AtomicU64,
    delivery_times: Mutex<Vec<u64>>, // in milliseconds

    // MQTT metrics
    mqtt_connected: AtomicBool,
    connections_established: AtomicU64,
    connection_failures: AtomicU64,
    reconnect_attempts: AtomicU64,
    messages_received: AtomicU64,
    connection_start_time: AtomicU64,

    // Lifecycle metrics
    monitor_state: Mutex<String>,
    uptime_start: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            readings_accepted: AtomicU64::new(0),
            readings_rejected: AtomicU64::new(0),
            payloads_discarded: AtomicU64::new(0),
            alerts_received: AtomicU64::new(0),
            last_reading_at: AtomicU64::new(0),
            notifications_queued: AtomicU64::new(0),
            notifications_delivered: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            notifications_dropped: AtomicU64::new(0),
            delivery_times: Mutex::new(Vec::new()),
            mqtt_connected: AtomicBool::new(false),
            connections_established: AtomicU64::new(0),
            connection_failures: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            connection_start_time: AtomicU64::new(0),
            monitor_state: Mutex::new("initializing".to_string()),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    // Ingestion metrics
    pub fn reading_accepted(&self) {
        self.readings_accepted.fetch_add(1, Ordering::Relaxed);
        self.last_reading_at
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn reading_rejected(&self) {
        self.readings_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn payload_discarded(&self) {
        self.payloads_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn alert_received(&self) {
        self.alerts_received.fetch_add(1, Ordering::Relaxed);
    }

    // Notification metrics
    pub fn notification_queued(&self) {
        self.notifications_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notification_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notification_completed(&self, duration: Duration, ok: bool) {
        if ok {
            self.notifications_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.delivery_times.lock() {
            times.push(duration.as_millis() as u64);

            // Limit to last 1000 measurements to prevent unbounded growth
            if times.len() > MAX_DELIVERY_SAMPLES {
                times.remove(0);
            }
        }
    }

    // MQTT metrics
    pub fn mqtt_connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(true, Ordering::Relaxed);
        self.connection_start_time
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn mqtt_connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(false, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
    }

    pub fn mqtt_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mqtt_connection_lost(&self) {
        self.mqtt_connected.store(false, Ordering::Relaxed);
    }

    pub fn mqtt_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_mqtt_connected(&self) -> bool {
        self.mqtt_connected.load(Ordering::Relaxed)
    }

    // Lifecycle metrics
    pub fn set_monitor_state(&self, state: &str) {
        if let Ok(mut current_state) = self.monitor_state.lock() {
            if *current_state != state {
                *current_state = state.to_string();
            }
        }
    }

    // Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.readings_accepted,
            &self.readings_rejected,
            &self.payloads_discarded,
            &self.alerts_received,
            &self.last_reading_at,
            &self.notifications_queued,
            &self.notifications_delivered,
            &self.notifications_failed,
            &self.notifications_dropped,
            &self.connections_established,
            &self.connection_failures,
            &self.reconnect_attempts,
            &self.messages_received,
            &self.connection_start_time,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.mqtt_connected.store(false, Ordering::Relaxed);
        self.uptime_start
            .store(current_timestamp(), Ordering::Relaxed);
        if let Ok(mut times) = self.delivery_times.lock() {
            times.clear();
        }
        if let Ok(mut state) = self.monitor_state.lock() {
            *state = "initializing".to_string();
        }
    }

    /// Calculate delivery time statistics (avg, p50, p95)
    fn calculate_delivery_time_statistics(&self) -> (f64, f64, f64) {
        if let Ok(times) = self.delivery_times.lock() {
            if times.is_empty() {
                (0.0, 0.0, 0.0)
            } else {
                let mut sorted_times = times.clone();
                sorted_times.sort_unstable();

                let avg = sorted_times.iter().sum::<u64>() as f64 / sorted_times.len() as f64;
                (
                    avg,
                    percentile(&sorted_times, 50.0),
                    percentile(&sorted_times, 95.0),
                )
            }
        } else {
            (0.0, 0.0, 0.0)
        }
    }

    fn calculate_connection_duration(&self, now: u64) -> u64 {
        if self.mqtt_connected.load(Ordering::Relaxed) {
            let start_time = self.connection_start_time.load(Ordering::Relaxed);
            if start_time > 0 {
                now.saturating_sub(start_time)
            } else {
                0
            }
        } else {
            0
        }
    }

    fn get_current_monitor_state(&self) -> String {
        self.monitor_state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg_delivery_time_ms, p50, p95) = self.calculate_delivery_time_statistics();

        MetricsSnapshot {
            ingest: IngestMetrics {
                readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
                readings_rejected: self.readings_rejected.load(Ordering::Relaxed),
                payloads_discarded: self.payloads_discarded.load(Ordering::Relaxed),
                alerts_received: self.alerts_received.load(Ordering::Relaxed),
                last_reading_at: self.last_reading_at.load(Ordering::Relaxed),
            },
            notifications: NotificationMetrics {
                queued: self.notifications_queued.load(Ordering::Relaxed),
                delivered: self.notifications_delivered.load(Ordering::Relaxed),
                failed: self.notifications_failed.load(Ordering::Relaxed),
                dropped: self.notifications_dropped.load(Ordering::Relaxed),
                avg_delivery_time_ms,
                delivery_time_p50_ms: p50,
                delivery_time_p95_ms: p95,
            },
            mqtt: MqttMetrics {
                connected: self.mqtt_connected.load(Ordering::Relaxed),
                connections_established: self.connections_established.load(Ordering::Relaxed),
                connection_failures: self.connection_failures.load(Ordering::Relaxed),
                reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
                messages_received: self.messages_received.load(Ordering::Relaxed),
                connection_duration_seconds: self.calculate_connection_duration(now),
            },
            lifecycle: LifecycleMetrics {
                current_state: self.get_current_monitor_state(),
                uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
            },
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Public metrics structures
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub ingest: IngestMetrics,
    pub notifications: NotificationMetrics,
    pub mqtt: MqttMetrics,
    pub lifecycle: LifecycleMetrics,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct IngestMetrics {
    pub readings_accepted: u64,
    pub readings_rejected: u64,
    pub payloads_discarded: u64,
    pub alerts_received: u64,
    /// Unix seconds of the last accepted reading, 0 if none
    pub last_reading_at: u64,
}

#[derive(Debug, Serialize)]
pub struct NotificationMetrics {
    pub queued: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
    pub avg_delivery_time_ms: f64,
    pub delivery_time_p50_ms: f64,
    pub delivery_time_p95_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct MqttMetrics {
    pub connected: bool,
    pub connections_established: u64,
    pub connection_failures: u64,
    pub reconnect_attempts: u64,
    pub messages_received: u64,
    pub connection_duration_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct LifecycleMetrics {
    pub current_state: String,
    pub uptime_seconds: u64,
}

// Helper functions
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let index = (percentile / 100.0) * (len - 1) as f64;

    if index.fract() == 0.0 {
        sorted_data[index as usize] as f64
    } else {
        let lower_index = index.floor() as usize;
        let upper_index = index.ceil() as usize;
        let lower_value = sorted_data[lower_index] as f64;
        let upper_value = sorted_data[upper_index] as f64;

        lower_value + (upper_value - lower_value) * index.fract()
    }
}
