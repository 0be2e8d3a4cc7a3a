//! Health check HTTP endpoint for monitoring

use crate::connection::{ConnectionState, StatusChange};
use crate::metrics;
use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String, // "healthy", "degraded", "critical", "idle"
    pub version: String,
    pub connection_state: String,
    pub detail: Option<String>,
    /// Receive time (epoch ms) of the last frame
    pub last_message_at: Option<i64>,
    pub suggestion_count: usize,
    pub uptime_seconds: u64,
    pub timestamp: i64,
    #[serde(skip)]
    started_at: i64,
}

impl Default for HealthResponse {
    fn default() -> Self {
        let now = Utc::now().timestamp();
        Self {
            status: "idle".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connection_state: ConnectionState::Idle.to_string(),
            detail: None,
            last_message_at: None,
            suggestion_count: 0,
            uptime_seconds: 0,
            timestamp: now,
            started_at: now,
        }
    }
}

// Written from the client's status callbacks, read by the HTTP task
pub type HealthState = Arc<RwLock<HealthResponse>>;

pub fn create_health_state() -> HealthState {
    Arc::new(RwLock::new(HealthResponse::default()))
}

/// Overall status reported for a connection state
pub fn status_for(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Open => "healthy",
        ConnectionState::Connecting
        | ConnectionState::Authenticating
        | ConnectionState::Reconnecting => "degraded",
        ConnectionState::Failed => "critical",
        ConnectionState::Idle | ConnectionState::Closing => "idle",
    }
}

fn with_health(state: &HealthState, update: impl FnOnce(&mut HealthResponse)) {
    let mut health = match state.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    update(&mut health);
    health.timestamp = Utc::now().timestamp();
}

/// Mirror a connection transition into the health document
pub fn update_connection(state: &HealthState, change: &StatusChange) {
    with_health(state, |health| {
        health.status = status_for(change.state).to_string();
        health.connection_state = change.state.to_string();
        health.detail = change.detail.clone();
    });
}

/// Refresh data-flow fields after messages were processed
pub fn update_activity(state: &HealthState, last_message_at: Option<i64>, suggestion_count: usize) {
    with_health(state, |health| {
        health.last_message_at = last_message_at;
        health.suggestion_count = suggestion_count;
    });
}

pub fn snapshot(state: &HealthState) -> HealthResponse {
    let mut health = match state.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    health.uptime_seconds = (Utc::now().timestamp() - health.started_at).max(0) as u64;
    health
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<HealthState>,
) -> Json<HealthResponse> {
    Json(snapshot(&state))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint() -> String {
    metrics::gather_metrics()
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

pub async fn run_health_server(port: u16, state: HealthState) {
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Health check server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(
                "Health server failed to bind to {}: {}. Client will continue without health endpoint.",
                addr,
                e
            );
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Health check server failed: {}", e);
    }
}
