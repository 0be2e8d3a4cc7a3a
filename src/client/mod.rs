//! # Telemetry Client
//!
//! Composition root: wires the connection manager, router, snapshot store
//! and strategy advisor together and exposes the public surface.
//!
//! The client is single-threaded (`!Send`). Feed it transport events and
//! timer ticks from one task, usually through [`driver::run`].

pub mod driver;

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::config::{ClientConfig, ConfigError};
use crate::connection::{
    Clock, ConnectionManager, ConnectionSettings, ConnectionState, SendError, StatusChange,
    Transport, TransportEvent,
};
use crate::metrics;
use crate::protocol::{kinds, Envelope, Message, Outbound, SnapshotPatch};
use crate::router::{HandlerError, HandlerId, HandlerResult, MessageRouter, Subscribers};
use crate::strategy::{AdvisorThresholds, StrategyAdvisor, Suggestion};
use crate::telemetry::{HistoryField, Sample, TelemetrySnapshot, TelemetryStore};

pub struct TelemetryClient<T: Transport, C: Clock> {
    connection: ConnectionManager<T, C>,
    router: MessageRouter,
    store: Rc<RefCell<TelemetryStore>>,
    advisor: Rc<RefCell<StrategyAdvisor>>,
    suggestion_listeners: Subscribers<[Suggestion]>,
}

impl<T: Transport, C: Clock> TelemetryClient<T, C> {
    /// Builds a client from validated configuration.
    pub fn new(transport: T, clock: C, config: &ClientConfig) -> Result<Self, ConfigError> {
        let settings = config.connection_settings()?;
        Ok(Self::with_settings(
            transport,
            clock,
            settings,
            config.history_capacity,
            &config.advisor,
        ))
    }

    pub fn with_settings(
        transport: T,
        clock: C,
        settings: ConnectionSettings,
        history_capacity: usize,
        thresholds: &AdvisorThresholds,
    ) -> Self {
        let mut client = Self {
            connection: ConnectionManager::new(transport, clock, settings),
            router: MessageRouter::new(),
            store: Rc::new(RefCell::new(TelemetryStore::new(history_capacity))),
            advisor: Rc::new(RefCell::new(StrategyAdvisor::new(thresholds))),
            suggestion_listeners: Subscribers::new("suggestions"),
        };
        client.register_builtin_handlers();
        client
    }

    /// Store-side handlers. Registered first so user handlers for the same
    /// type already see the merged snapshot.
    fn register_builtin_handlers(&mut self) {
        let store = self.store.clone();
        self.router.register(kinds::TELEMETRY, move |env: &Envelope| {
            let patch = expect_patch(env)?;
            let mut store = store.borrow_mut();
            store.merge(patch);
            store.record_history(env.timestamp);
            Ok(())
        });

        for kind in [kinds::SESSION, kinds::TIMING] {
            let store = self.store.clone();
            self.router.register(kind, move |env: &Envelope| {
                store.borrow_mut().merge(expect_patch(env)?);
                Ok(())
            });
        }

        let store = self.store.clone();
        let advisor = self.advisor.clone();
        self.router.register(kinds::STRATEGY, move |env: &Envelope| {
            let Message::Strategy(update) = &env.message else {
                return Err(unexpected(env));
            };
            store.borrow_mut().merge(&update.patch);
            advisor.borrow_mut().set_remote(update.suggestions.clone());
            Ok(())
        });
    }

    // --- Connection ---

    pub fn connect(&mut self) {
        self.connection.connect();
    }

    /// Closes the connection and cancels every pending timer.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Applies one transport event and routes the resulting message.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let Some(envelope) = self.connection.handle_event(event) else {
            return;
        };
        let handlers = self.router.dispatch(&envelope);
        debug!(kind = envelope.kind(), handlers, "Envelope dispatched");

        if envelope.message.snapshot_patch().is_some() {
            self.refresh_suggestions();
        }
    }

    pub fn poll_timers(&mut self) {
        self.connection.poll_timers();
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.connection.next_deadline()
    }

    pub fn now_ms(&self) -> i64 {
        self.connection.now_ms()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Current state with the detail of the last transition.
    pub fn status(&self) -> (ConnectionState, Option<&str>) {
        (self.connection.state(), self.connection.detail())
    }

    pub fn last_message_at(&self) -> Option<i64> {
        self.connection.last_message_at()
    }

    pub fn connection(&self) -> &ConnectionManager<T, C> {
        &self.connection
    }

    // --- Callbacks ---

    pub fn on_status<F>(&mut self, callback: F) -> HandlerId
    where
        F: FnMut(&StatusChange) -> HandlerResult + 'static,
    {
        self.connection.on_status(callback)
    }

    pub fn off_status(&mut self, id: HandlerId) -> bool {
        self.connection.off_status(id)
    }

    /// Registers a handler for messages of `kind`, after the built-in ones.
    pub fn on_message<F>(&mut self, kind: &str, handler: F) -> HandlerId
    where
        F: FnMut(&Envelope) -> HandlerResult + 'static,
    {
        self.router.register(kind, handler)
    }

    pub fn off_message(&mut self, kind: &str, id: HandlerId) {
        self.router.unregister(kind, id);
    }

    /// Called with the full, ranked list whenever it changes.
    pub fn on_suggestions<F>(&mut self, callback: F) -> HandlerId
    where
        F: FnMut(&[Suggestion]) -> HandlerResult + 'static,
    {
        self.suggestion_listeners.subscribe(callback)
    }

    pub fn off_suggestions(&mut self, id: HandlerId) -> bool {
        self.suggestion_listeners.unsubscribe(id)
    }

    // --- Data ---

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.store.borrow().snapshot()
    }

    pub fn history(&self, field: HistoryField) -> Vec<Sample> {
        self.store.borrow().history(field)
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.advisor.borrow().suggestions()
    }

    /// Back to initial values, empty history and no suggestions.
    pub fn reset_telemetry(&mut self) {
        self.store.borrow_mut().reset();
        self.advisor.borrow_mut().set_remote(Vec::new());
        self.refresh_suggestions();
    }

    /// Applies a locally produced patch as if it had arrived as telemetry.
    pub fn apply_patch(&mut self, patch: &SnapshotPatch, timestamp: i64) {
        {
            let mut store = self.store.borrow_mut();
            store.merge(patch);
            store.record_history(timestamp);
        }
        self.refresh_suggestions();
    }

    fn refresh_suggestions(&mut self) {
        let changed = {
            let store = self.store.borrow();
            self.advisor.borrow_mut().recompute(store.current())
        };
        if !changed {
            return;
        }

        let list = self.advisor.borrow().suggestions();
        for suggestion in &list {
            metrics::record_suggestion(&suggestion.priority.to_string());
        }
        debug!(count = list.len(), "Suggestions updated");
        self.suggestion_listeners.notify(list.as_slice());
    }

    // --- Subscriptions ---

    pub fn channels(&self) -> &[String] {
        self.connection.channels()
    }

    pub fn subscribe_channel(&mut self, channel: &str) -> bool {
        self.connection.subscribe_channel(channel)
    }

    pub fn unsubscribe_channel(&mut self, channel: &str) -> bool {
        self.connection.unsubscribe_channel(channel)
    }

    // --- Requests ---

    pub fn send(&mut self, message: &Outbound) -> Result<(), SendError> {
        self.connection.send(message)
    }

    pub fn request_telemetry(&mut self, categories: &[&str]) -> Result<(), SendError> {
        self.send(&Outbound::RequestTelemetry {
            categories: categories.iter().map(|c| c.to_string()).collect(),
        })
    }

    pub fn request_strategy(&mut self, context: Value) -> Result<(), SendError> {
        self.send(&Outbound::RequestStrategy { context })
    }

    pub fn send_voice_command(&mut self, command: &str, metadata: Value) -> Result<(), SendError> {
        self.send(&Outbound::VoiceCommand {
            command: command.to_string(),
            metadata,
        })
    }

    pub fn request_status(&mut self) -> Result<(), SendError> {
        self.send(&Outbound::Status {})
    }
}

fn unexpected(env: &Envelope) -> HandlerError {
    HandlerError::UnexpectedPayload {
        kind: env.kind().to_string(),
    }
}

fn expect_patch(env: &Envelope) -> Result<&SnapshotPatch, HandlerError> {
    env.message.snapshot_patch().ok_or_else(|| unexpected(env))
}
