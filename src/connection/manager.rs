//! Connection Manager
//!
//! Owns the transport and drives the connection lifecycle:
//! - Connect timeout, heartbeat and reconnect backoff as owned deadlines
//! - Credential handshake and channel subscription on open
//! - Ping/pong interception before anything reaches the router
//! - Generation tagging so events from a dead connection are ignored
//!
//! Everything is synchronous. The caller feeds transport events and timer
//! ticks in; status changes go out through the subscriber list.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::logging::LogThrottle;
use crate::metrics;
use crate::protocol::{decode, encode, AuthAck, CodecError, Envelope, Message, Outbound};
use crate::router::{HandlerId, HandlerResult, Subscribers};

use super::backoff::ReconnectPolicy;
use super::clock::Clock;
use super::state::{ConnectionState, StatusChange};
use super::timers::{TimerKind, Timers};
use super::transport::{
    Transport, TransportError, TransportEvent, TransportEventKind, LOCAL_DISCONNECT_CODE,
};

/// Why an outbound message was not handed to the transport.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("not connected (state: {state})")]
    NotConnected { state: ConnectionState },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Everything the manager needs to know about the server and its timing.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: Url,
    /// Sent in an `auth` message right after open
    pub credential: Option<String>,
    pub reconnect: ReconnectPolicy,
    pub heartbeat_interval_ms: u64,
    pub connect_timeout_ms: u64,
    /// Initial subscription set
    pub channels: Vec<String>,
}

impl ConnectionSettings {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            credential: None,
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval_ms: 30_000,
            connect_timeout_ms: 10_000,
            channels: Vec::new(),
        }
    }
}

pub struct ConnectionManager<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    settings: ConnectionSettings,
    state: ConnectionState,
    detail: Option<String>,
    /// Bumped whenever the current connection is abandoned
    generation: u64,
    /// Consecutive failed attempts since the last successful open
    attempts: u32,
    timers: Timers,
    /// When the outstanding heartbeat ping was sent
    awaiting_pong: Option<i64>,
    last_message_at: Option<i64>,
    channels: Vec<String>,
    status: Subscribers<StatusChange>,
    malformed_log: LogThrottle,
}

impl<T: Transport, C: Clock> ConnectionManager<T, C> {
    pub fn new(transport: T, clock: C, settings: ConnectionSettings) -> Self {
        let channels = settings.channels.clone();
        Self {
            transport,
            clock,
            settings,
            state: ConnectionState::Idle,
            detail: None,
            generation: 0,
            attempts: 0,
            timers: Timers::default(),
            awaiting_pong: None,
            last_message_at: None,
            channels,
            status: Subscribers::new("status"),
            malformed_log: LogThrottle::new(Duration::from_secs(5)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Detail of the most recent transition.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Earliest instant (epoch ms) at which [`poll_timers`](Self::poll_timers)
    /// has work to do.
    pub fn next_deadline(&self) -> Option<i64> {
        self.timers.next_deadline()
    }

    /// Receive time of the last frame on any connection.
    pub fn last_message_at(&self) -> Option<i64> {
        self.last_message_at
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn on_status<F>(&mut self, callback: F) -> HandlerId
    where
        F: FnMut(&StatusChange) -> HandlerResult + 'static,
    {
        self.status.subscribe(callback)
    }

    pub fn off_status(&mut self, id: HandlerId) -> bool {
        self.status.unsubscribe(id)
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Adds a channel. Re-announces the set when connected.
    pub fn subscribe_channel(&mut self, channel: &str) -> bool {
        if self.channels.iter().any(|c| c == channel) {
            return false;
        }
        self.channels.push(channel.to_string());
        self.announce_channels();
        true
    }

    /// Removes a channel. Re-announces the set when connected.
    pub fn unsubscribe_channel(&mut self, channel: &str) -> bool {
        let before = self.channels.len();
        self.channels.retain(|c| c != channel);
        if self.channels.len() == before {
            return false;
        }
        self.announce_channels();
        true
    }

    /// Starts connecting. No-op while a connection is up or in progress.
    ///
    /// From `Reconnecting` the pending backoff is skipped and the attempt
    /// count kept; from `Idle`, `Closing` and `Failed` the count restarts.
    pub fn connect(&mut self) {
        match self.state {
            ConnectionState::Connecting
            | ConnectionState::Open
            | ConnectionState::Authenticating => {
                debug!(state = %self.state, "connect() ignored; already connected or connecting");
                return;
            }
            ConnectionState::Reconnecting => {}
            ConnectionState::Idle | ConnectionState::Closing | ConnectionState::Failed => {
                self.attempts = 0;
            }
        }
        self.start_attempt();
    }

    /// Closes the connection and cancels every timer before returning.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Idle {
            return;
        }
        self.generation += 1;
        self.timers.cancel_all();
        if self.state.is_connected() {
            self.transition(ConnectionState::Closing, None);
        }
        self.transport.close(LOCAL_DISCONNECT_CODE, "client disconnect");
        self.attempts = 0;
        self.awaiting_pong = None;
        self.transition(ConnectionState::Idle, Some("disconnected".to_string()));
    }

    /// Encodes and sends `message` with the current time as its timestamp.
    pub fn send(&mut self, message: &Outbound) -> Result<(), SendError> {
        self.send_stamped(message, None)
    }

    fn send_stamped(&mut self, message: &Outbound, timestamp: Option<i64>) -> Result<(), SendError> {
        if !self.state.is_connected() {
            return Err(SendError::NotConnected { state: self.state });
        }
        let frame = encode(message, timestamp, self.clock.now_ms())?;
        self.transport.send(frame)?;
        Ok(())
    }

    /// Applies one transport event.
    ///
    /// Returns the envelope when the frame is a domain message for the router.
    /// System messages, malformed frames and stale events yield `None`.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<Envelope> {
        if event.generation != self.generation {
            debug!(
                event_generation = event.generation,
                current = self.generation,
                "Ignoring event from a stale connection"
            );
            return None;
        }

        match event.kind {
            TransportEventKind::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.on_open();
                }
                None
            }
            TransportEventKind::Frame(text) => {
                if self.state.is_connected() {
                    self.on_frame(&text)
                } else {
                    debug!(state = %self.state, "Frame outside an open connection dropped");
                    None
                }
            }
            TransportEventKind::Closed { code, reason } => {
                if code == LOCAL_DISCONNECT_CODE && self.state.is_connected() {
                    self.generation += 1;
                    self.attempts = 0;
                    self.transition(ConnectionState::Idle, Some("closed by server".to_string()));
                } else if self.state.is_active() {
                    let detail = if reason.is_empty() {
                        format!("connection closed (code {code})")
                    } else {
                        format!("connection closed (code {code}): {reason}")
                    };
                    self.fault(detail);
                }
                None
            }
            TransportEventKind::Error(message) => {
                if self.state.is_active() {
                    self.fault(format!("transport error: {message}"));
                }
                None
            }
        }
    }

    /// Runs every timer that is due.
    pub fn poll_timers(&mut self) {
        let now = self.clock.now_ms();
        for kind in self.timers.pop_expired(now) {
            debug!(timer = %kind, state = %self.state, "Timer fired");
            match kind {
                TimerKind::ConnectTimeout => match self.state {
                    ConnectionState::Connecting => self.fault(format!(
                        "connection timed out after {} ms",
                        self.settings.connect_timeout_ms
                    )),
                    ConnectionState::Authenticating => {
                        warn!("No auth acknowledgment from server; continuing as open");
                        self.transition(
                            ConnectionState::Open,
                            Some("auth not acknowledged".to_string()),
                        );
                    }
                    _ => {}
                },
                TimerKind::Heartbeat => self.on_heartbeat(now),
                TimerKind::Reconnect => {
                    if self.state == ConnectionState::Reconnecting {
                        self.start_attempt();
                    }
                }
            }
        }
    }

    fn start_attempt(&mut self) {
        self.generation += 1;
        self.awaiting_pong = None;
        let detail = (self.attempts > 0).then(|| format!("attempt {}", self.attempts + 1));
        self.transition(ConnectionState::Connecting, detail);

        if let Err(e) = self.transport.open(&self.settings.endpoint, self.generation) {
            warn!(error = %e, "Transport construction failed");
            self.fault(format!("transport unavailable: {e}"));
        }
    }

    /// With a credential the machine waits in `Authenticating` for the
    /// server's `auth` ack. Servers that never acknowledge are treated as
    /// accepting once the connect timeout elapses.
    fn on_open(&mut self) {
        self.attempts = 0;
        self.awaiting_pong = None;
        self.transition(ConnectionState::Open, None);
        metrics::record_reconnect_attempt("connected");

        if let Some(token) = self.settings.credential.clone() {
            if let Err(e) = self.send(&Outbound::Auth { token }) {
                warn!(error = %e, "Failed to send auth");
            }
            self.transition(ConnectionState::Authenticating, None);
        }
        self.announce_channels();
    }

    fn on_frame(&mut self, text: &str) -> Option<Envelope> {
        let now = self.clock.now_ms();
        self.last_message_at = Some(now);

        let envelope = match decode(text, now) {
            Ok(envelope) => envelope,
            Err(e) => {
                metrics::record_frame_dropped(e.reason());
                if self.malformed_log.should_log() {
                    let suppressed = self.malformed_log.get_and_reset_suppressed_count();
                    warn!(error = %e, suppressed, "Dropping malformed frame");
                }
                return None;
            }
        };
        metrics::record_frame_received(envelope.kind());

        match &envelope.message {
            Message::Ping => {
                if let Err(e) = self.send_stamped(&Outbound::Pong {}, Some(envelope.timestamp)) {
                    warn!(error = %e, "Failed to answer ping");
                }
                None
            }
            Message::Pong => {
                self.awaiting_pong = None;
                None
            }
            Message::Auth(ack) => {
                self.on_auth_ack(ack);
                None
            }
            _ => Some(envelope),
        }
    }

    fn on_auth_ack(&mut self, ack: &AuthAck) {
        if self.state != ConnectionState::Authenticating {
            debug!(state = %self.state, "Unsolicited auth acknowledgment ignored");
            return;
        }
        if ack.success {
            self.transition(ConnectionState::Open, Some("authenticated".to_string()));
            return;
        }

        let reason = ack
            .message
            .clone()
            .unwrap_or_else(|| "credential rejected".to_string());
        self.generation += 1;
        self.transport.close(LOCAL_DISCONNECT_CODE, "auth rejected");
        self.attempts = 0;
        self.transition(ConnectionState::Failed, Some(format!("auth rejected: {reason}")));
    }

    fn on_heartbeat(&mut self, now: i64) {
        if !self.state.is_connected() {
            return;
        }
        if let Some(sent_at) = self.awaiting_pong {
            self.fault(format!("heartbeat not acknowledged (ping sent at {sent_at})"));
            return;
        }
        if let Err(e) = self.send(&Outbound::Ping {}) {
            warn!(error = %e, "Failed to send heartbeat ping");
        }
        self.awaiting_pong = Some(now);
        self.timers.arm(
            TimerKind::Heartbeat,
            deadline_after(now, self.settings.heartbeat_interval_ms),
        );
    }

    /// Abandons the current connection and schedules a retry, or gives up.
    fn fault(&mut self, detail: String) {
        self.generation += 1;
        self.transport.close(LOCAL_DISCONNECT_CODE, "reconnecting");
        self.awaiting_pong = None;
        self.attempts += 1;

        if self.settings.reconnect.is_exhausted(self.attempts) {
            metrics::record_reconnect_attempt("exhausted");
            warn!(attempts = self.attempts, %detail, "Reconnect attempts exhausted");
            let failed = format!("{detail}; gave up after {} attempts", self.attempts);
            self.transition(ConnectionState::Failed, Some(failed));
        } else {
            metrics::record_reconnect_attempt("scheduled");
            self.transition(ConnectionState::Reconnecting, Some(detail));
        }
    }

    fn announce_channels(&mut self) {
        if !self.state.is_connected() {
            return;
        }
        let channels = self.channels.clone();
        if let Err(e) = self.send(&Outbound::Subscribe { channels }) {
            warn!(error = %e, "Failed to send subscription");
        }
    }

    /// The only place timers are armed or cancelled on a state change.
    fn transition(&mut self, to: ConnectionState, detail: Option<String>) {
        let now = self.clock.now_ms();
        match to {
            ConnectionState::Connecting => {
                self.timers.cancel(TimerKind::Heartbeat);
                self.timers.cancel(TimerKind::Reconnect);
                self.timers.arm(
                    TimerKind::ConnectTimeout,
                    deadline_after(now, self.settings.connect_timeout_ms),
                );
            }
            ConnectionState::Open | ConnectionState::Authenticating => {
                self.timers.cancel(TimerKind::Reconnect);
                // While authenticating the connect timeout bounds the wait for the ack
                if to == ConnectionState::Authenticating {
                    self.timers.arm(
                        TimerKind::ConnectTimeout,
                        deadline_after(now, self.settings.connect_timeout_ms),
                    );
                } else {
                    self.timers.cancel(TimerKind::ConnectTimeout);
                }
                if !self.timers.is_armed(TimerKind::Heartbeat) {
                    self.timers.arm(
                        TimerKind::Heartbeat,
                        deadline_after(now, self.settings.heartbeat_interval_ms),
                    );
                }
            }
            ConnectionState::Reconnecting => {
                self.timers.cancel_all();
                let delay = self.settings.reconnect.delay_for(self.attempts);
                self.timers
                    .arm(TimerKind::Reconnect, deadline_after(now, delay));
            }
            ConnectionState::Idle | ConnectionState::Closing | ConnectionState::Failed => {
                self.timers.cancel_all();
            }
        }

        let previous = self.state;
        self.state = to;
        self.detail = detail.clone();
        metrics::set_connection_state(to.as_gauge());
        metrics::record_state_transition(&previous.to_string(), &to.to_string());
        info!(
            from = %previous,
            to = %to,
            detail = detail.as_deref().unwrap_or(""),
            attempts = self.attempts,
            "Connection state changed"
        );

        self.status.notify(&StatusChange {
            state: to,
            previous,
            detail,
        });
    }
}

/// `now + ms`, clamped instead of wrapping for huge intervals.
fn deadline_after(now: i64, ms: u64) -> i64 {
    now.saturating_add(i64::try_from(ms).unwrap_or(i64::MAX))
}
