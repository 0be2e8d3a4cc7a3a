//! WebSocket transport over `tokio-tungstenite`.
//!
//! Each `open` spawns one connection task on the current Tokio runtime. The
//! task reports back through the shared event channel and takes commands
//! through its own channel; dropping that channel ends the task.

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tracing::{debug, info, warn};
use url::Url;

use super::transport::{
    Transport, TransportError, TransportEvent, ABNORMAL_CLOSE_CODE, NO_STATUS_CODE,
};

#[derive(Debug)]
enum Command {
    Send(String),
    Close { code: u16, reason: String },
}

pub struct WsTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    commands: Option<mpsc::UnboundedSender<Command>>,
}

impl WsTransport {
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            events,
            commands: None,
        }
    }

    /// Transport plus the receiving end the driver should poll.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Transport for WsTransport {
    fn open(&mut self, url: &Url, generation: u64) -> Result<(), TransportError> {
        let handle = Handle::try_current().map_err(|e| TransportError::Unavailable(e.to_string()))?;

        // Only one live connection per transport
        self.close(super::transport::LOCAL_DISCONNECT_CODE, "superseded");

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        self.commands = Some(cmd_tx);
        handle.spawn(run_connection(
            url.to_string(),
            generation,
            self.events.clone(),
            cmd_rx,
        ));
        Ok(())
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let commands = self.commands.as_ref().ok_or(TransportError::NotOpen)?;
        commands
            .send(Command::Send(frame))
            .map_err(|_| TransportError::Send("connection task has exited".to_string()))
    }

    fn close(&mut self, code: u16, reason: &str) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Close {
                code,
                reason: reason.to_string(),
            });
        }
    }
}

async fn run_connection(
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let connect = connect_async(url.as_str());
    tokio::pin!(connect);

    // Frames queued before the handshake finished
    let mut pending = Vec::new();
    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((stream, _)) => break stream,
                Err(e) => {
                    warn!(generation, error = %e, "WebSocket connect failed");
                    let _ = events.send(TransportEvent::error(generation, e.to_string()));
                    return;
                }
            },
            cmd = commands.recv() => match cmd {
                Some(Command::Send(frame)) => pending.push(frame),
                Some(Command::Close { .. }) | None => {
                    debug!(generation, "Connect abandoned");
                    return;
                }
            },
        }
    };

    info!(generation, %url, "WebSocket connected");
    if events.send(TransportEvent::opened(generation)).is_err() {
        return;
    }

    let (mut write, mut read) = ws_stream.split();
    for frame in pending {
        if let Err(e) = write.send(Message::Text(frame.into())).await {
            let _ = events.send(TransportEvent::error(generation, e.to_string()));
            return;
        }
    }

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Send(frame)) => {
                    if let Err(e) = write.send(Message::Text(frame.into())).await {
                        warn!(generation, error = %e, "WebSocket send failed");
                        let _ = events.send(TransportEvent::error(generation, e.to_string()));
                        return;
                    }
                }
                Some(Command::Close { code, reason }) => {
                    debug!(generation, code, %reason, "Closing WebSocket");
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    return;
                }
                None => {
                    let _ = write.close().await;
                    return;
                }
            },
            msg = read.next() => {
                let event = match msg {
                    Some(Ok(Message::Text(text))) => {
                        TransportEvent::frame(generation, text.as_str())
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::frame(generation, text),
                        Err(_) => {
                            debug!(generation, len = bytes.len(), "Ignoring non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = write.send(Message::Pong(payload)).await {
                            warn!(generation, error = %e, "Failed to send pong");
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((NO_STATUS_CODE, String::new()));
                        info!(generation, code, %reason, "WebSocket closed by server");
                        let _ = events.send(TransportEvent::closed(generation, code, reason));
                        return;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(generation, error = %e, "WebSocket error");
                        let _ = events.send(TransportEvent::error(generation, e.to_string()));
                        return;
                    }
                    None => {
                        info!(generation, "WebSocket stream ended");
                        let _ = events.send(TransportEvent::closed(
                            generation,
                            ABNORMAL_CLOSE_CODE,
                            "stream ended",
                        ));
                        return;
                    }
                };
                if events.send(event).is_err() {
                    return;
                }
            }
        }
    }
}
