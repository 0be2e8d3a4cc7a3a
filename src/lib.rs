pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod router;
pub mod strategy;
pub mod telemetry;
pub mod types;

pub use client::TelemetryClient;
pub use config::ClientConfig;
pub use connection::{ConnectionState, StatusChange};
pub use types::{Category, Priority, Suggestion};
