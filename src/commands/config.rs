//! Show-config command handler.

use tracing::warn;

use crate::config::ClientConfig;

/// Print the effective configuration as JSON with the credential masked.
///
/// Validation problems are reported but do not fail the command.
pub fn show_config(config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    if let Err(e) = config.validate() {
        warn!("Configuration is not usable yet: {}", e);
    }
    Ok(())
}
