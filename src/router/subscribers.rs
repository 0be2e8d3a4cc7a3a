//! Ordered, failure-isolated callback lists.
//!
//! Backs the router's per-type handlers as well as the status and suggestion
//! callbacks. Subscribers run synchronously in registration order; an error
//! or a panic in one of them is logged and does not stop the others.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::{error, warn};

use crate::metrics;

/// Failure reported by a handler. Caught at the dispatch boundary.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unexpected payload for `{kind}`")]
    UnexpectedPayload { kind: String },

    #[error("{0}")]
    Failed(String),
}

pub type HandlerResult = Result<(), HandlerError>;

/// Identifies a registration so it can be removed later.
///
/// Ids are unique across every list in the process, so an id handed out by
/// one list never matches an entry in another, and ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

impl HandlerId {
    fn next() -> Self {
        HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Callback<T> = Box<dyn FnMut(&T) -> HandlerResult>;

pub struct Subscribers<T: ?Sized> {
    /// Label for logs and metrics (e.g. "status", "telemetry").
    label: String,
    entries: Vec<(HandlerId, Callback<T>)>,
}

impl<T: ?Sized> Subscribers<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, callback: F) -> HandlerId
    where
        F: FnMut(&T) -> HandlerResult + 'static,
    {
        let id = HandlerId::next();
        self.entries.push((id, Box::new(callback)));
        id
    }

    /// Returns `false` when `id` was not registered here.
    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invokes every subscriber and returns how many of them failed.
    pub fn notify(&mut self, event: &T) -> usize {
        let mut failures = 0;
        for (id, callback) in self.entries.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    metrics::record_handler_failure(&self.label, "error");
                    warn!(target_label = %self.label, handler = id.0, error = %e, "Handler failed");
                }
                Err(payload) => {
                    failures += 1;
                    metrics::record_handler_failure(&self.label, "panic");
                    error!(
                        target_label = %self.label,
                        handler = id.0,
                        panic = %panic_message(payload.as_ref()),
                        "Handler panicked"
                    );
                }
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
