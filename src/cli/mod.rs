//! CLI argument parsing using clap.
//!
//! This module defines the command-line interface for the telemetry client
//! and how its flags override the loaded configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ClientConfig;

/// Blackbox - Race Telemetry Client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a JSON settings file (settings.local.json beside it overrides it)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Telemetry server WebSocket URL (ws:// or wss://)
    #[arg(long, global = true)]
    pub server_url: Option<String>,

    /// Credential sent to the server
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Set the verbosity level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub verbose: String,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the server and follow telemetry and strategy updates
    Run {
        /// Serve /health and /metrics on this port
        #[arg(long)]
        health_port: Option<u16>,
        /// Channels to subscribe to (comma-separated, e.g., "telemetry,timing")
        #[arg(long)]
        channels: Option<String>,
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Print the effective configuration (credential masked) and exit
    ShowConfig,
}

impl Cli {
    /// Applies flag values on top of file and environment configuration.
    pub fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Commands::Run {
            channels: Some(channels),
            ..
        } = &self.command
        {
            config.channels = parse_channels(channels);
        }
        config.normalize();
    }
}

/// Splits a comma-separated list, dropping blanks and duplicates.
pub fn parse_channels(raw: &str) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for channel in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if !channels.iter().any(|c| c == channel) {
            channels.push(channel.to_string());
        }
    }
    channels
}
