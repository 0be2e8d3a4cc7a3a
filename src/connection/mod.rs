//! # Connection
//!
//! Lifecycle of the single server connection.
//!
//! ## Components
//! - `manager`: the state machine (connect, heartbeat, backoff, auth).
//! - `transport`: the seam between the state machine and the network.
//! - `websocket`: the production transport on `tokio-tungstenite`.
//! - `timers`, `backoff`, `clock`: deadline bookkeeping.

pub mod backoff;
pub mod clock;
pub mod manager;
pub mod state;
pub mod timers;
pub mod transport;
pub mod websocket;

pub use backoff::ReconnectPolicy;
pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{ConnectionManager, ConnectionSettings, SendError};
pub use state::{ConnectionState, StatusChange};
pub use timers::{TimerKind, Timers};
pub use transport::{
    build_endpoint, Transport, TransportError, TransportEvent, TransportEventKind,
    LOCAL_DISCONNECT_CODE,
};
pub use websocket::WsTransport;
