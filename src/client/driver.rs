//! Async event loop for a [`TelemetryClient`].
//!
//! Suspends on exactly three things: the next transport event, the next
//! timer deadline and the shutdown signal. Everything else is synchronous.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::connection::{Clock, Transport, TransportEvent};

use super::TelemetryClient;

/// Drives `client` until `shutdown` resolves or the event channel closes.
/// The client is disconnected before returning.
pub async fn run<T, C, S>(
    client: &mut TelemetryClient<T, C>,
    events: &mut UnboundedReceiver<TransportEvent>,
    shutdown: S,
) where
    T: Transport,
    C: Clock,
    S: Future<Output = ()>,
{
    run_with(client, events, shutdown, |_| {}).await
}

/// Like [`run`], calling `observe` after every processed event or timer tick.
pub async fn run_with<T, C, S, O>(
    client: &mut TelemetryClient<T, C>,
    events: &mut UnboundedReceiver<TransportEvent>,
    shutdown: S,
    mut observe: O,
) where
    T: Transport,
    C: Clock,
    S: Future<Output = ()>,
    O: FnMut(&TelemetryClient<T, C>),
{
    tokio::pin!(shutdown);

    loop {
        let wait = client
            .next_deadline()
            .map(|deadline| Duration::from_millis((deadline - client.now_ms()).max(0) as u64));

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested");
                client.disconnect();
                break;
            }
            event = events.recv() => match event {
                Some(event) => client.handle_transport_event(event),
                None => {
                    warn!("Transport event channel closed");
                    client.disconnect();
                    break;
                }
            },
            _ = sleep_or_pending(wait) => client.poll_timers(),
        }
        observe(&*client);
    }
    observe(&*client);
}

async fn sleep_or_pending(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}
