//! # Wire Protocol
//!
//! JSON envelopes exchanged with the telemetry backend.
//!
//! ## Components
//! - `envelope`: frame parsing/validation and outbound encoding.
//! - `messages`: the typed payload union keyed by message `type`.

pub mod envelope;
pub mod messages;

pub use envelope::{decode, encode, CodecError, Envelope};
pub use messages::{
    kinds, AuthAck, CornerPatch, Message, Outbound, SnapshotPatch, StrategyUpdate,
};
