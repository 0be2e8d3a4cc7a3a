//! Logging setup and helpers
//!
//! - `init_tracing` - stdout subscriber plus optional JSON log file
//! - `LogThrottle` - rate limiting for repetitive warnings

pub mod throttle;

pub use throttle::LogThrottle;

use std::fs::{self, OpenOptions};
use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tracing subscriber already installed: {0}")]
    Init(#[from] TryInitError),
}

/// `RUST_LOG` wins over the level passed on the command line.
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global tracing subscriber.
///
/// With `log_path`, events are also written as JSON lines through a
/// non-blocking writer. Keep the returned guard alive for the lifetime of the
/// process or buffered lines are lost.
pub fn init_tracing(filter: &str, log_path: Option<&Path>) -> Result<Option<WorkerGuard>, LoggingError> {
    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_filter(env_filter(filter));

    let Some(path) = log_path else {
        tracing_subscriber::registry().with(stdout_layer).try_init()?;
        return Ok(None);
    };

    let open_err = |source| LoggingError::LogFile {
        path: path.display().to_string(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(open_err)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_err)?;

    let (writer, guard) = tracing_appender::non_blocking(file);
    let file_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer)
        .with_filter(env_filter(filter));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;
    Ok(Some(guard))
}
