//! Prometheus metrics for the minerd control plane.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, register_int_gauge, Counter,
    CounterVec, Encoder, HistogramVec, IntGauge, TextEncoder,
};

/// HTTP requests handled, by route kind and status code.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "minerd_http_requests_total",
        "Total HTTP requests handled by the control plane",
        &["route", "status"]
    )
    .unwrap()
});

/// HTTP request latency in milliseconds, by route kind.
pub static HTTP_REQUEST_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "minerd_http_request_duration_ms",
        "HTTP request latency in milliseconds",
        &["route"],
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Login attempts, by outcome (success/failure).
pub static LOGIN_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "minerd_login_attempts_total",
        "Total login attempts",
        &["outcome"]
    )
    .unwrap()
});

/// Sessions currently held by the session store.
pub static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("minerd_sessions_active", "Sessions currently stored").unwrap()
});

/// Privileged actions, by action name and outcome.
pub static PRIVILEGED_ACTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "minerd_privileged_actions_total",
        "Privileged API actions by outcome (ok/failed/denied)",
        &["action", "outcome"]
    )
    .unwrap()
});

/// Connected push clients.
pub static PUSH_CLIENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("minerd_push_clients", "Connected push channel clients").unwrap()
});

/// Messages published to the push hub.
pub static PUSH_PUBLISHED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "minerd_push_published_total",
        "Messages published to the push hub"
    )
    .unwrap()
});

/// Pending messages dropped because a client queue was full.
pub static PUSH_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "minerd_push_dropped_total",
        "Pending push messages dropped (oldest first) for slow clients"
    )
    .unwrap()
});

/// Forwarded requests, by host type and outcome.
pub static FORWARD_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "minerd_forward_total",
        "Requests forwarded to backend hosts",
        &["host", "outcome"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a handled HTTP request.
    pub fn http_request(route: &str, status: u16, duration_ms: f64) {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[route, &status.to_string()])
            .inc();
        HTTP_REQUEST_DURATION_MS
            .with_label_values(&[route])
            .observe(duration_ms);
    }

    /// Record a login attempt.
    pub fn login_attempt(success: bool) {
        let outcome = if success { "success" } else { "failure" };
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Set the number of stored sessions.
    pub fn sessions_active(count: usize) {
        SESSIONS_ACTIVE.set(count as i64);
    }

    /// Record a privileged action outcome.
    pub fn privileged_action(action: &str, outcome: &str) {
        PRIVILEGED_ACTIONS_TOTAL
            .with_label_values(&[action, outcome])
            .inc();
    }

    /// A push client connected.
    pub fn push_client_connected() {
        PUSH_CLIENTS.inc();
    }

    /// A push client disconnected.
    pub fn push_client_disconnected() {
        PUSH_CLIENTS.dec();
    }

    /// A message was published to the hub.
    pub fn push_published() {
        PUSH_PUBLISHED_TOTAL.inc();
    }

    /// `count` pending messages were dropped for a slow client.
    pub fn push_dropped(count: u64) {
        PUSH_DROPPED_TOTAL.inc_by(count as f64);
    }

    /// Record a forwarded request outcome (ok/unavailable).
    pub fn forward(host: &str, outcome: &str) {
        FORWARD_TOTAL.with_label_values(&[host, outcome]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
