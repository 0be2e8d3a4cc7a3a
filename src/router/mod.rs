//! Message Router
//!
//! Maps an envelope's `type` to zero or more handlers and invokes them in
//! registration order. Handler failures are contained by [`Subscribers`].

pub mod subscribers;

pub use subscribers::{HandlerError, HandlerId, HandlerResult, Subscribers};

use std::collections::HashMap;

use tracing::debug;

use crate::protocol::{kinds, Envelope};

/// Type alias for the per-type handler table
type RoutesMap = HashMap<String, Subscribers<Envelope>>;

/// Dispatches validated envelopes to handlers keyed by message type.
///
/// # Example
///
/// ```ignore
/// let mut router = MessageRouter::new();
/// let id = router.register("timing", |env| {
///     println!("timing at {}", env.timestamp);
///     Ok(())
/// });
/// router.dispatch(&envelope);
/// router.unregister("timing", id);
/// ```
#[derive(Default)]
pub struct MessageRouter {
    routes: RoutesMap,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register a handler for `kind`. Several handlers may share a type.
    pub fn register<F>(&mut self, kind: &str, handler: F) -> HandlerId
    where
        F: FnMut(&Envelope) -> HandlerResult + 'static,
    {
        self.routes
            .entry(kind.to_string())
            .or_insert_with(|| Subscribers::new(kind))
            .subscribe(handler)
    }

    /// Remove a handler. Unknown type/id pairs are ignored.
    pub fn unregister(&mut self, kind: &str, id: HandlerId) {
        let Some(handlers) = self.routes.get_mut(kind) else {
            return;
        };
        handlers.unsubscribe(id);
        if handlers.is_empty() {
            self.routes.remove(kind);
        }
    }

    /// Invoke every handler registered for the envelope's type.
    ///
    /// Returns the number of handlers that ran. `ping`/`pong` belong to the
    /// connection layer and are never dispatched here.
    pub fn dispatch(&mut self, envelope: &Envelope) -> usize {
        let kind = envelope.kind();
        if kind == kinds::PING || kind == kinds::PONG {
            debug!(kind, "System message reached the router; ignoring");
            return 0;
        }

        let Some(handlers) = self.routes.get_mut(kind) else {
            debug!(kind, "No handlers registered");
            return 0;
        };

        let failures = handlers.notify(envelope);
        if failures > 0 {
            debug!(kind, failures, "Dispatch completed with handler failures");
        }
        handlers.len()
    }

    #[must_use]
    pub fn has_handlers(&self, kind: &str) -> bool {
        self.routes
            .get(kind)
            .map(|handlers| !handlers.is_empty())
            .unwrap_or(false)
    }

    #[must_use]
    pub fn handler_count(&self, kind: &str) -> usize {
        self.routes.get(kind).map(Subscribers::len).unwrap_or(0)
    }
}
