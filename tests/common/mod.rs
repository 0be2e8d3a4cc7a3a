//! Shared fixtures for the client integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use blackbox::connection::{
    ConnectionSettings, ManualClock, StatusChange, Transport, TransportError, TransportEvent,
};
use blackbox::TelemetryClient;
use serde_json::Value;
use url::Url;

pub const HEARTBEAT_MS: u64 = 5_000;
pub const CONNECT_TIMEOUT_MS: u64 = 2_000;

/// Everything the transport was asked to do.
#[derive(Debug, Default)]
pub struct TransportLog {
    pub opens: Vec<u64>,
    pub sent: Vec<String>,
    pub closes: Vec<u16>,
    /// When set, `open` fails as if the socket could not be constructed
    pub fail_open: bool,
}

/// Transport that records calls; events are injected by the test.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub log: Rc<RefCell<TransportLog>>,
}

impl Transport for RecordingTransport {
    fn open(&mut self, _endpoint: &Url, generation: u64) -> Result<(), TransportError> {
        let mut log = self.log.borrow_mut();
        log.opens.push(generation);
        if log.fail_open {
            return Err(TransportError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.log.borrow_mut().sent.push(frame);
        Ok(())
    }

    fn close(&mut self, code: u16, _reason: &str) {
        self.log.borrow_mut().closes.push(code);
    }
}

pub type TestClient = TelemetryClient<RecordingTransport, Rc<ManualClock>>;

pub struct Harness {
    pub client: TestClient,
    pub clock: Rc<ManualClock>,
    pub log: Rc<RefCell<TransportLog>>,
    pub changes: Rc<RefCell<Vec<StatusChange>>>,
}

impl Harness {
    pub fn new(credential: Option<&str>, channels: &[&str]) -> Self {
        let transport = RecordingTransport::default();
        let log = transport.log.clone();
        let clock = Rc::new(ManualClock::new(1_000_000));

        let mut settings =
            ConnectionSettings::new(Url::parse("ws://telemetry.test/ws").unwrap());
        settings.credential = credential.map(str::to_string);
        settings.channels = channels.iter().map(|c| c.to_string()).collect();
        settings.heartbeat_interval_ms = HEARTBEAT_MS;
        settings.connect_timeout_ms = CONNECT_TIMEOUT_MS;

        let mut client =
            TelemetryClient::with_settings(transport, clock.clone(), settings, 16, &Default::default());

        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        client.on_status(move |change| {
            sink.borrow_mut().push(change.clone());
            Ok(())
        });

        Self {
            client,
            clock,
            log,
            changes,
        }
    }

    fn generation(&self) -> u64 {
        self.client.connection().generation()
    }

    /// Connects and reports the socket as open.
    pub fn connect_and_open(&mut self) {
        self.client.connect();
        self.open();
    }

    pub fn open(&mut self) {
        let generation = self.generation();
        self.client
            .handle_transport_event(TransportEvent::opened(generation));
    }

    pub fn frame(&mut self, text: &str) {
        let generation = self.generation();
        self.client
            .handle_transport_event(TransportEvent::frame(generation, text));
    }

    pub fn close(&mut self, code: u16) {
        let generation = self.generation();
        self.client
            .handle_transport_event(TransportEvent::closed(generation, code, ""));
    }

    /// Moves the clock forward and fires whatever came due.
    pub fn advance(&mut self, ms: i64) {
        self.clock.advance(ms);
        self.client.poll_timers();
    }

    pub fn sent(&self) -> Vec<Value> {
        self.log
            .borrow()
            .sent
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|v| v["type"].as_str().unwrap().to_string())
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.log.borrow().opens.len()
    }

    pub fn change_count(&self) -> usize {
        self.changes.borrow().len()
    }

    pub fn last_detail(&self) -> Option<String> {
        self.changes
            .borrow()
            .last()
            .and_then(|change| change.detail.clone())
    }
}
