//! Typed message payloads.
//!
//! Every wire `type` the client understands maps to one [`Message`] variant,
//! and its `data` object is deserialized into that variant's schema. Unknown
//! keys inside a payload are ignored by serde, which is what makes snapshot
//! merges forward-compatible.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Suggestion;

use super::envelope::CodecError;

/// Wire names of the message types the client knows about.
pub mod kinds {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const AUTH: &str = "auth";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const TELEMETRY: &str = "telemetry";
    /// Name used by the reference backend when it rebroadcasts telemetry.
    pub const TELEMETRY_UPDATE: &str = "telemetry_update";
    pub const SESSION: &str = "session";
    pub const TIMING: &str = "timing";
    pub const STRATEGY: &str = "strategy";

    /// Whether `kind` has a typed schema rather than landing in `Other`.
    pub fn is_modelled(kind: &str) -> bool {
        matches!(
            kind,
            PING | PONG | AUTH | TELEMETRY | TELEMETRY_UPDATE | SESSION | TIMING | STRATEGY
        )
    }
}

/// Partial per-corner update. Absent corners are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CornerPatch {
    pub fl: Option<f64>,
    pub fr: Option<f64>,
    pub rl: Option<f64>,
    pub rr: Option<f64>,
}

/// Partial snapshot update carried by `telemetry`, `session`, `timing` and
/// `strategy` messages. `None` means "not named by this message".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPatch {
    pub speed: Option<f64>,
    pub gear: Option<i32>,
    pub rpm: Option<f64>,
    pub engine_temp: Option<f64>,

    pub fuel_level: Option<f64>,
    pub fuel_capacity: Option<f64>,
    pub fuel_usage_per_lap: Option<f64>,

    pub tire_temps: Option<CornerPatch>,
    pub tire_pressures: Option<CornerPatch>,
    pub tire_wear: Option<CornerPatch>,

    pub lap: Option<u32>,
    pub total_laps: Option<u32>,
    pub current_lap_time: Option<f64>,
    pub last_lap_time: Option<f64>,
    pub best_lap_time: Option<f64>,
    pub delta: Option<f64>,

    pub session_type: Option<String>,
    pub track_name: Option<String>,
    pub session_time_remaining: Option<f64>,
    pub flag: Option<String>,

    pub position: Option<u32>,
    pub total_cars: Option<u32>,
    pub gap_ahead: Option<f64>,
    pub gap_behind: Option<f64>,
}

/// Server-side strategy push: snapshot keys plus optional remote suggestions.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StrategyUpdate {
    #[serde(flatten)]
    pub patch: SnapshotPatch,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// Server acknowledgment of an `auth` message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthAck {
    #[serde(default = "default_auth_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_auth_success() -> bool {
    true
}

/// Inbound message, discriminated by the envelope `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Ping,
    Pong,
    Auth(AuthAck),
    Telemetry(SnapshotPatch),
    Session(SnapshotPatch),
    Timing(SnapshotPatch),
    Strategy(StrategyUpdate),
    /// A type the client does not model; routed to handlers untouched.
    Other { kind: String, data: Value },
}

impl Message {
    /// Builds the typed message for `kind`, validating `data` against its schema.
    pub fn from_parts(kind: String, data: Value) -> Result<Self, CodecError> {
        match kind.as_str() {
            kinds::PING => Ok(Message::Ping),
            kinds::PONG => Ok(Message::Pong),
            kinds::AUTH => typed(&kind, data).map(Message::Auth),
            kinds::TELEMETRY | kinds::TELEMETRY_UPDATE => {
                typed(&kind, data).map(Message::Telemetry)
            }
            kinds::SESSION => typed(&kind, data).map(Message::Session),
            kinds::TIMING => typed(&kind, data).map(Message::Timing),
            kinds::STRATEGY => typed(&kind, data).map(Message::Strategy),
            _ => Ok(Message::Other { kind, data }),
        }
    }

    /// Routing key. Aliases collapse onto their canonical name.
    pub fn kind(&self) -> &str {
        match self {
            Message::Ping => kinds::PING,
            Message::Pong => kinds::PONG,
            Message::Auth(_) => kinds::AUTH,
            Message::Telemetry(_) => kinds::TELEMETRY,
            Message::Session(_) => kinds::SESSION,
            Message::Timing(_) => kinds::TIMING,
            Message::Strategy(_) => kinds::STRATEGY,
            Message::Other { kind, .. } => kind,
        }
    }

    /// The snapshot keys this message carries, if it is a domain message.
    pub fn snapshot_patch(&self) -> Option<&SnapshotPatch> {
        match self {
            Message::Telemetry(patch) | Message::Session(patch) | Message::Timing(patch) => {
                Some(patch)
            }
            Message::Strategy(update) => Some(&update.patch),
            _ => None,
        }
    }
}

fn typed<T: for<'de> Deserialize<'de>>(kind: &str, data: Value) -> Result<T, CodecError> {
    if !data.is_object() {
        return Err(CodecError::PayloadNotObject {
            kind: kind.to_string(),
        });
    }
    serde_json::from_value(data).map_err(|source| CodecError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

/// Client-issued messages. Serialized adjacently tagged as `{type, data}`;
/// the codec adds the `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Outbound {
    Ping {},
    Pong {},
    Auth { token: String },
    Subscribe { channels: Vec<String> },
    RequestTelemetry { categories: Vec<String> },
    RequestStrategy { context: Value },
    VoiceCommand { command: String, metadata: Value },
    Status {},
}
