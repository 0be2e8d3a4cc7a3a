//! Envelope codec: raw text frames <-> validated [`Envelope`]s.
//!
//! Wire format: `{ "type": string, "timestamp": number, "data": object }`.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};
use thiserror::Error;

use super::messages::{kinds, Message, Outbound};

/// Reasons a frame is rejected. The offending frame is dropped; none of these
/// affect the connection.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("missing or empty message type")]
    MissingType,

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("payload of `{kind}` must be a JSON object")]
    PayloadNotObject { kind: String },

    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CodecError {
    /// Short label used for the dropped-frame metric.
    pub fn reason(&self) -> &'static str {
        match self {
            CodecError::Json(_) => "malformed_json",
            CodecError::NotAnObject => "not_an_object",
            CodecError::MissingType => "missing_type",
            CodecError::InvalidTimestamp(_) => "invalid_timestamp",
            CodecError::PayloadNotObject { .. } | CodecError::InvalidPayload { .. } => {
                "invalid_payload"
            }
        }
    }
}

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: Message,
}

impl Envelope {
    pub fn new(timestamp: i64, message: Message) -> Self {
        Self { timestamp, message }
    }

    pub fn kind(&self) -> &str {
        self.message.kind()
    }
}

/// Parses and validates one frame. A missing timestamp becomes `received_at`;
/// a missing or null `data` is treated as `{}`, except for types without a
/// schema, whose remaining top-level keys become the data.
pub fn decode(frame: &str, received_at: i64) -> Result<Envelope, CodecError> {
    let value: Value = serde_json::from_str(frame)?;
    let Value::Object(mut fields) = value else {
        return Err(CodecError::NotAnObject);
    };

    let kind = match fields.remove("type") {
        Some(Value::String(kind)) if !kind.trim().is_empty() => kind,
        _ => return Err(CodecError::MissingType),
    };

    let timestamp = match fields.remove("timestamp") {
        None | Some(Value::Null) => received_at,
        Some(raw) => parse_timestamp(&raw)?,
    };

    let data = match fields.remove("data") {
        None | Some(Value::Null) if !kinds::is_modelled(&kind) => Value::Object(fields),
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(data) => data,
    };

    let message = Message::from_parts(kind, data)?;
    Ok(Envelope { timestamp, message })
}

/// Serializes an outbound message, stamping `now` when no timestamp is given.
pub fn encode(message: &Outbound, timestamp: Option<i64>, now: i64) -> Result<String, CodecError> {
    let mut value = serde_json::to_value(message)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("timestamp".to_string(), Value::from(timestamp.unwrap_or(now)));
    }
    Ok(serde_json::to_string(&value)?)
}

/// Accepts epoch milliseconds (integer or float) and ISO 8601 strings.
/// Strings without an offset are read as UTC.
fn parse_timestamp(raw: &Value) -> Result<i64, CodecError> {
    match raw {
        Value::Number(n) => {
            if let Some(ms) = n.as_i64() {
                Ok(ms)
            } else {
                n.as_f64()
                    .filter(|ms| ms.is_finite())
                    .map(|ms| ms as i64)
                    .ok_or_else(|| CodecError::InvalidTimestamp(n.to_string()))
            }
        }
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.timestamp_millis());
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc().timestamp_millis())
                .map_err(|_| CodecError::InvalidTimestamp(s.clone()))
        }
        other => Err(CodecError::InvalidTimestamp(other.to_string())),
    }
}
