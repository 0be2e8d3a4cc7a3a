//! Connection lifecycle states and the status events emitted on transitions.

use serde::Serialize;

/// Lifecycle of the single server connection.
///
/// Exactly one state holds at any time. `Idle` is both the initial state and
/// the state after an explicit disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Authenticating,
    Reconnecting,
    Closing,
    Failed,
}

impl ConnectionState {
    /// A transport is up (or coming up) for the current generation.
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Authenticating)
    }

    /// States in which transport failures schedule a reconnect.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Authenticating
        )
    }

    /// Numeric code for the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            ConnectionState::Idle => 0.0,
            ConnectionState::Connecting => 1.0,
            ConnectionState::Open => 2.0,
            ConnectionState::Authenticating => 3.0,
            ConnectionState::Reconnecting => 4.0,
            ConnectionState::Closing => 5.0,
            ConnectionState::Failed => 6.0,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Authenticating => write!(f, "authenticating"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Delivered to status subscribers on every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub state: ConnectionState,
    pub previous: ConnectionState,
    /// Human-readable cause ("auth rejected: bad token", "closed by server", ...)
    pub detail: Option<String>,
}
