//! Run command handler.
//!
//! Connects to the telemetry server, logs connection status and suggestion
//! changes, and optionally serves health and metrics endpoints.

use std::time::Duration;

use tracing::{info, warn};

use crate::client::{driver, TelemetryClient};
use crate::config::ClientConfig;
use crate::connection::{ConnectionState, SystemClock, WsTransport};
use crate::health::{self, HealthState};
use crate::strategy::Priority;

/// Run the client until Ctrl-C or until `duration_secs` elapse.
///
/// # Errors
/// Returns error if the configuration is invalid.
pub async fn run_client(
    config: ClientConfig,
    health_port: Option<u16>,
    duration_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (transport, mut events) = WsTransport::channel();
    let mut client = TelemetryClient::new(transport, SystemClock, &config)?;

    let health_state: Option<HealthState> = health_port.map(|port| {
        let state = health::create_health_state();
        tokio::spawn(health::run_health_server(port, state.clone()));
        state
    });

    let status_health = health_state.clone();
    client.on_status(move |change| {
        match change.state {
            ConnectionState::Failed => warn!(
                detail = change.detail.as_deref().unwrap_or(""),
                "Connection failed; restart to try again"
            ),
            state => info!(
                %state,
                detail = change.detail.as_deref().unwrap_or(""),
                "Connection status"
            ),
        }
        if let Some(health) = &status_health {
            health::update_connection(health, change);
        }
        Ok(())
    });

    client.on_suggestions(|suggestions| {
        if suggestions.is_empty() {
            info!("No active strategy suggestions");
        }
        for suggestion in suggestions {
            match suggestion.priority {
                Priority::Critical => warn!(
                    category = %suggestion.category,
                    gain = %suggestion.estimated_gain,
                    "{}",
                    suggestion.text
                ),
                priority => info!(
                    %priority,
                    category = %suggestion.category,
                    gain = %suggestion.estimated_gain,
                    "{}",
                    suggestion.text
                ),
            }
        }
        Ok(())
    });

    info!(server = %config.server_url, channels = ?config.channels, "Starting telemetry client");
    client.connect();

    let shutdown = async move {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
    };

    driver::run_with(&mut client, &mut events, shutdown, |client| {
        if let Some(health) = &health_state {
            health::update_activity(health, client.last_message_at(), client.suggestions().len());
        }
    })
    .await;

    let snapshot = client.snapshot();
    info!(
        track = %snapshot.track_name,
        lap = snapshot.lap,
        position = snapshot.position,
        fuel_pct = ?snapshot.fuel_percentage,
        "Client stopped"
    );
    Ok(())
}
