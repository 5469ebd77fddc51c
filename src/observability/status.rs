//! HTTP status server
//!
//! Read-only endpoints over the engine and the process metrics, for operators
//! and container health probes:
//!
//! - `GET /health` - 200 while the MQTT session is up, 503 otherwise
//! - `GET /metrics` - counters from the global [`MetricsCollector`](super::MetricsCollector)
//! - `GET /snapshot` - consistent copy of engine state as JSON
//! - `GET /` - endpoint index

use crate::monitor::{Engine, StatusTier};
use crate::observability::metrics::metrics;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use warp::Filter;
use warp::http::StatusCode;

/// No reading for this long marks the reading check as stale
const READING_STALENESS_THRESHOLD_SECONDS: i64 = 300;

/// HTTP status server
pub struct StatusServer {
    port: u16,
    engine: Arc<Engine>,
    mqtt_connected: AtomicBool,
}

impl StatusServer {
    pub fn new(port: u16, engine: Arc<Engine>) -> Self {
        Self {
            port,
            engine,
            mqtt_connected: AtomicBool::new(false),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Update MQTT connection status
    pub fn set_mqtt_connected(&self, connected: bool) {
        self.mqtt_connected.store(connected, Ordering::Relaxed);
    }

    /// All routes, usable directly with `warp::test`
    pub fn routes(
        self: &Arc<Self>,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let health_route = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_server(self.clone()))
            .and_then(health_handler);

        let metrics_route = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(metrics_handler);

        let snapshot_route = warp::path("snapshot")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_server(self.clone()))
            .and_then(snapshot_handler);

        let root_route = warp::path::end().and(warp::get()).and_then(index_handler);

        health_route
            .or(metrics_route)
            .or(snapshot_route)
            .or(root_route)
            .with(warp::cors().allow_any_origin())
    }

    /// Bind the listening socket and return the server future. The server
    /// stops when `shutdown` resolves.
    pub fn bind(
        self: Arc<Self>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(SocketAddr, impl Future<Output = ()>), warp::Error> {
        let routes = self.routes();
        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(([0, 0, 0, 0], self.port), shutdown)?;
        tracing::info!("Status server listening on {}", addr);
        Ok((addr, server))
    }

    fn health_status(&self) -> HealthStatus {
        let now = current_timestamp();
        let mut checks = BTreeMap::new();
        let mqtt_check = self.check_mqtt_health(now);
        let healthy = mqtt_check.status == "healthy";
        checks.insert("mqtt".to_string(), mqtt_check);
        checks.insert("readings".to_string(), self.check_reading_health(now));

        let status = if checks.values().all(|check| check.status == "healthy") {
            "healthy"
        } else {
            "degraded"
        };

        HealthStatus {
            status: status.to_string(),
            healthy,
            timestamp: now,
            uptime_seconds: metrics().get_metrics().lifecycle.uptime_seconds,
            current_tier: self.engine.current_tier(),
            checks,
        }
    }

    fn check_mqtt_health(&self, now: u64) -> HealthCheck {
        if self.mqtt_connected.load(Ordering::Relaxed) {
            HealthCheck::new("healthy", "MQTT connection established", now)
        } else {
            HealthCheck::new("unhealthy", "MQTT connection failed or disconnected", now)
        }
    }

    fn check_reading_health(&self, now: u64) -> HealthCheck {
        let snapshot = self.engine.snapshot();
        match snapshot.current {
            None => HealthCheck::new("healthy", "No readings received yet", now),
            Some(current) => {
                let age = (Utc::now() - current.timestamp).num_seconds();
                if age > READING_STALENESS_THRESHOLD_SECONDS {
                    HealthCheck::new(
                        "stale",
                        &format!("No reading for {age} seconds"),
                        now,
                    )
                } else {
                    HealthCheck::new("healthy", "Recent reading", now)
                }
            }
        }
    }
}

fn with_server(
    server: Arc<StatusServer>,
) -> impl Filter<Extract = (Arc<StatusServer>,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

async fn health_handler(server: Arc<StatusServer>) -> Result<impl warp::Reply, Infallible> {
    let status = server.health_status();
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok(warp::reply::with_status(warp::reply::json(&status), code))
}

async fn metrics_handler() -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&metrics().get_metrics()))
}

async fn snapshot_handler(server: Arc<StatusServer>) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&server.engine.snapshot()))
}

async fn index_handler() -> Result<impl warp::Reply, Infallible> {
    let mut endpoints = BTreeMap::new();
    endpoints.insert("/health", "MQTT and reading health checks");
    endpoints.insert("/metrics", "Ingestion, notification and MQTT counters");
    endpoints.insert("/snapshot", "Current reading, histories and notification log");
    Ok(warp::reply::json(&ApiDocumentationResponse { endpoints }))
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: Option<String>,
    pub last_check: u64,
}

impl HealthCheck {
    fn new(status: &str, message: &str, last_check: u64) -> Self {
        Self {
            status: status.to_string(),
            message: Some(message.to_string()),
            last_check,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: String,
    #[serde(skip)]
    healthy: bool,
    timestamp: u64,
    uptime_seconds: u64,
    current_tier: Option<StatusTier>,
    checks: BTreeMap<String, HealthCheck>,
}

#[derive(Debug, Serialize)]
struct ApiDocumentationResponse {
    endpoints: BTreeMap<&'static str, &'static str>,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
