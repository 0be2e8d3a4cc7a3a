//! Prometheus Metrics Module
//!
//! Pre-registered metrics for the telemetry pipeline.
//! All metrics use lock-free atomics for minimal hot-path overhead.

use lazy_static::lazy_static;
use prometheus::{
    opts, register_gauge, register_int_counter_vec, Encoder, Gauge, IntCounterVec, TextEncoder,
};

lazy_static! {
    // --- Frame Metrics ---

    /// Frames decoded successfully (by message type)
    pub static ref FRAMES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        opts!("blackbox_frames_received_total", "Frames decoded successfully"),
        &["kind"]
    ).expect("FATAL: Failed to register FRAMES_RECEIVED metric - check for duplicate registration");

    /// Frames dropped by the codec
    pub static ref FRAMES_DROPPED: IntCounterVec = register_int_counter_vec!(
        opts!("blackbox_frames_dropped_total", "Frames dropped as malformed"),
        &["reason"]
    ).expect("FATAL: Failed to register FRAMES_DROPPED metric - check for duplicate registration");

    /// Handler/callback failures (error or panic)
    pub static ref HANDLER_FAILURES: IntCounterVec = register_int_counter_vec!(
        opts!("blackbox_handler_failures_total", "Handler failures caught at dispatch"),
        &["target", "reason"]
    ).expect("FATAL: Failed to register HANDLER_FAILURES metric - check for duplicate registration");

    // --- Connection Metrics ---

    /// Current connection state (0=idle .. 6=failed)
    pub static ref CONNECTION_STATE: Gauge = register_gauge!(
        opts!("blackbox_connection_state", "Connection state (0=idle, 1=connecting, 2=open, 3=authenticating, 4=reconnecting, 5=closing, 6=failed)")
    ).expect("FATAL: Failed to register CONNECTION_STATE metric - check for duplicate registration");

    /// Connection state transitions
    pub static ref STATE_TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        opts!("blackbox_connection_transitions_total", "Connection state transitions"),
        &["from_state", "to_state"]
    ).expect("FATAL: Failed to register STATE_TRANSITIONS metric - check for duplicate registration");

    /// Reconnect outcomes
    pub static ref RECONNECTS: IntCounterVec = register_int_counter_vec!(
        opts!("blackbox_reconnects_total", "Reconnect attempts by outcome"),
        &["outcome"]
    ).expect("FATAL: Failed to register RECONNECTS metric - check for duplicate registration");

    // --- Strategy Metrics ---

    /// Suggestions published (by priority)
    pub static ref SUGGESTIONS: IntCounterVec = register_int_counter_vec!(
        opts!("blackbox_suggestions_total", "Strategy suggestions published"),
        &["priority"]
    ).expect("FATAL: Failed to register SUGGESTIONS metric - check for duplicate registration");
}

/// Record a decoded frame
pub fn record_frame_received(kind: &str) {
    FRAMES_RECEIVED.with_label_values(&[kind]).inc();
}

/// Record a frame the codec rejected
pub fn record_frame_dropped(reason: &str) {
    FRAMES_DROPPED.with_label_values(&[reason]).inc();
}

pub fn record_handler_failure(target: &str, reason: &str) {
    HANDLER_FAILURES.with_label_values(&[target, reason]).inc();
}

pub fn set_connection_state(code: f64) {
    CONNECTION_STATE.set(code);
}

pub fn record_state_transition(from: &str, to: &str) {
    STATE_TRANSITIONS.with_label_values(&[from, to]).inc();
}

/// Outcome is one of "scheduled", "exhausted" or "connected"
pub fn record_reconnect_attempt(outcome: &str) {
    RECONNECTS.with_label_values(&[outcome]).inc();
}

pub fn record_suggestion(priority: &str) {
    SUGGESTIONS.with_label_values(&[priority]).inc();
}

/// Get metrics as text for /metrics endpoint
///
/// Encoding errors are logged and yield an empty body instead of panicking
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode Prometheus metrics: {}", e);
        return String::new();
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Prometheus metrics buffer is not valid UTF-8: {}", e);
            String::new()
        }
    }
}
