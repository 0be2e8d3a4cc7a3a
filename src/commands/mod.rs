//! CLI command handlers.
//!
//! This module contains the implementation for each CLI subcommand.

mod config;
mod run;

pub use config::show_config;
pub use run::run_client;
