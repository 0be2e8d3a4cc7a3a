//! Transport abstraction.
//!
//! The manager issues commands synchronously through [`Transport`]; whatever
//! the transport observes comes back later as a [`TransportEvent`] tagged
//! with the generation it was opened for.

use thiserror::Error;
use url::Url;

/// Close code sent for a deliberate, local disconnect.
pub const LOCAL_DISCONNECT_CODE: u16 = 1000;
/// Close code reported when the stream ended without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;
/// Close code reported when a close frame carried no status.
pub const NO_STATUS_CODE: u16 = 1005;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("transport is not open")]
    NotOpen,

    #[error("send failed: {0}")]
    Send(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    Opened,
    Frame(String),
    Closed { code: u16, reason: String },
    Error(String),
}

/// Something the transport observed on the connection `generation`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub generation: u64,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn opened(generation: u64) -> Self {
        Self {
            generation,
            kind: TransportEventKind::Opened,
        }
    }

    pub fn frame(generation: u64, text: impl Into<String>) -> Self {
        Self {
            generation,
            kind: TransportEventKind::Frame(text.into()),
        }
    }

    pub fn closed(generation: u64, code: u16, reason: impl Into<String>) -> Self {
        Self {
            generation,
            kind: TransportEventKind::Closed {
                code,
                reason: reason.into(),
            },
        }
    }

    pub fn error(generation: u64, message: impl Into<String>) -> Self {
        Self {
            generation,
            kind: TransportEventKind::Error(message.into()),
        }
    }
}

/// Full-duplex text-frame channel to the server.
///
/// `open` only starts the connection; success or failure is reported as an
/// event. An `Err` from `open` means the transport could not even be built.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn open(&mut self, url: &Url, generation: u64) -> Result<(), TransportError>;

    fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Closes the current connection. Idempotent; events from the closed
    /// connection may still arrive and are ignored by generation.
    fn close(&mut self, code: u16, reason: &str);
}

/// Appends the credential as the `auth` query parameter.
pub fn build_endpoint(server_url: &str, credential: Option<&str>) -> Result<Url, TransportError> {
    let mut url =
        Url::parse(server_url).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
    if let Some(token) = credential.filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair("auth", token);
    }
    Ok(url)
}
