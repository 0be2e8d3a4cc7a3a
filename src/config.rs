//! Client configuration.
//!
//! Layers, lowest precedence first: built-in defaults, the user settings
//! file, `settings.local.json` beside it, environment variables, then CLI
//! flags (applied by the `cli` module).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::connection::{build_endpoint, ConnectionSettings, ReconnectPolicy};
use crate::strategy::AdvisorThresholds;
use crate::telemetry::DEFAULT_HISTORY_CAPACITY;

pub const ENV_SERVER_URL: &str = "BLACKBOX_SERVER_URL";
pub const ENV_API_KEY: &str = "BLACKBOX_API_KEY";
pub const LOCAL_SETTINGS_FILE: &str = "settings.local.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("server URL is not set (use --server-url or BLACKBOX_SERVER_URL)")]
    MissingServerUrl,

    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme '{0}', expected ws or wss")]
    UnsupportedScheme(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Everything the client accepts at construction. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub server_url: String,
    pub api_key: Option<String>,
    pub reconnect_interval: u64,
    pub max_reconnect_interval: u64,
    pub max_reconnect_attempts: u32,
    pub heartbeat_interval: u64,
    pub connection_timeout: u64,
    pub history_capacity: usize,
    pub channels: Vec<String>,
    pub advisor: AdvisorThresholds,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            server_url: String::new(),
            api_key: None,
            reconnect_interval: policy.base_interval_ms,
            max_reconnect_interval: policy.max_interval_ms,
            max_reconnect_attempts: policy.max_attempts,
            heartbeat_interval: 30_000,
            connection_timeout: 10_000,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            channels: default_channels(),
            advisor: AdvisorThresholds::default(),
        }
    }
}

pub fn default_channels() -> Vec<String> {
    ["telemetry", "session", "timing", "strategy"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl ClientConfig {
    /// Defaults overlaid with `path` and its `settings.local.json` sibling.
    /// Environment overrides are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(Self::default())?;

        if let Some(path) = path {
            merge_json(&mut merged, read_json(path)?);
            info!(path = %path.display(), "Loaded settings");

            let local = path.with_file_name(LOCAL_SETTINGS_FILE);
            if local != path && local.exists() {
                merge_json(&mut merged, read_json(&local)?);
                info!(path = %local.display(), "Loaded local settings override");
            }
        }

        let mut config: ClientConfig = serde_json::from_value(merged)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.normalize();
        Ok(config)
    }

    /// Applies `BLACKBOX_SERVER_URL` / `BLACKBOX_API_KEY` through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.trim().is_empty()) {
            debug!("Server URL taken from environment");
            self.server_url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            debug!("API key taken from environment");
            self.api_key = Some(key);
        }
        self.normalize();
    }

    /// An empty credential means "no credential".
    pub fn normalize(&mut self) {
        self.server_url = self.server_url.trim().to_string();
        if self.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.api_key = None;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parse_url()?;

        let positive = [
            ("reconnectInterval", self.reconnect_interval),
            ("maxReconnectInterval", self.max_reconnect_interval),
            ("heartbeatInterval", self.heartbeat_interval),
            ("connectionTimeout", self.connection_timeout),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.max_reconnect_interval < self.reconnect_interval {
            return Err(ConfigError::InvalidValue {
                field: "maxReconnectInterval",
                reason: format!("must be at least reconnectInterval ({})", self.reconnect_interval),
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "historyCapacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    fn parse_url(&self) -> Result<Url, ConfigError> {
        if self.server_url.is_empty() {
            return Err(ConfigError::MissingServerUrl);
        }
        let url = Url::parse(&self.server_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.server_url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_interval_ms: self.reconnect_interval,
            max_interval_ms: self.max_reconnect_interval,
            max_attempts: self.max_reconnect_attempts,
        }
    }

    /// Validated settings for the connection manager.
    pub fn connection_settings(&self) -> Result<ConnectionSettings, ConfigError> {
        self.validate()?;
        let endpoint = build_endpoint(&self.server_url, self.api_key.as_deref()).map_err(|e| {
            ConfigError::InvalidUrl {
                url: self.server_url.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(ConnectionSettings {
            endpoint,
            credential: self.api_key.clone(),
            reconnect: self.reconnect_policy(),
            heartbeat_interval_ms: self.heartbeat_interval,
            connect_timeout_ms: self.connection_timeout,
            channels: self.channels.clone(),
        })
    }

    /// Copy safe to print: the credential is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.api_key.is_some() {
            copy.api_key = Some("********".to_string());
        }
        copy
    }
}

fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(lift_network_section(value))
}

/// Older settings files keep the endpoint under
/// `"network": {"server_url", "api_key"}`.
fn lift_network_section(mut value: Value) -> Value {
    let Some(fields) = value.as_object_mut() else {
        return value;
    };
    if let Some(Value::Object(network)) = fields.remove("network") {
        if let Some(url) = network.get("server_url").cloned() {
            fields.entry("serverUrl").or_insert(url);
        }
        if let Some(key) = network.get("api_key").cloned() {
            fields.entry("apiKey").or_insert(key);
        }
    }
    value
}

/// Recursively overlays `overlay` onto `base`. Objects merge key by key;
/// anything else replaces.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("blackbox-config-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn valid() -> ClientConfig {
        ClientConfig {
            server_url: "wss://telemetry.example.com/ws".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect_interval, 3_000);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.heartbeat_interval, 30_000);
        assert_eq!(config.connection_timeout, 10_000);
        assert_eq!(config.history_capacity, 300);
        assert_eq!(config.channels, default_channels());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(valid().validate().is_ok());
        assert!(matches!(
            ClientConfig::default().validate(),
            Err(ConfigError::MissingServerUrl)
        ));
        let http = ClientConfig {
            server_url: "http://example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(http.validate(), Err(ConfigError::UnsupportedScheme(s)) if s == "http"));
        let zero = ClientConfig {
            heartbeat_interval: 0,
            ..valid()
        };
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidValue { field: "heartbeatInterval", .. })
        ));
        let empty_ring = ClientConfig {
            history_capacity: 0,
            ..valid()
        };
        assert!(empty_ring.validate().is_err());
    }

    #[test]
    fn test_env_overrides_and_empty_key() {
        let mut config = valid();
        config.apply_env(|key| match key {
            ENV_SERVER_URL => Some("ws://10.0.0.5:9000".to_string()),
            ENV_API_KEY => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.server_url, "ws://10.0.0.5:9000");
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn test_file_layers_merge_deeply() {
        let dir = scratch_dir("layers");
        let user = dir.join("settings.json");
        fs::write(
            &user,
            json!({
                "network": { "server_url": "wss://race.example.com/ws", "api_key": "abc" },
                "heartbeatInterval": 15000,
                "advisor": { "tireOverheatTemp": 105.0 }
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.join(LOCAL_SETTINGS_FILE),
            json!({ "advisor": { "defendGap": 0.8 } }).to_string(),
        )
        .unwrap();

        let mut merged = serde_json::to_value(ClientConfig::default()).unwrap();
        merge_json(&mut merged, read_json(&user).unwrap());
        merge_json(&mut merged, read_json(&dir.join(LOCAL_SETTINGS_FILE)).unwrap());
        let config: ClientConfig = serde_json::from_value(merged).unwrap();

        assert_eq!(config.server_url, "wss://race.example.com/ws");
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.heartbeat_interval, 15_000);
        assert_eq!(config.advisor.tire_overheat_temp, 105.0);
        assert_eq!(config.advisor.defend_gap, 0.8);
        // untouched nested default survives
        assert_eq!(config.advisor.overtake_gap, 1.0);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = scratch_dir("malformed");
        let path = dir.join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_json(&path), Err(ConfigError::Json { .. })));
        assert!(matches!(
            read_json(&dir.join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_connection_settings_carry_credential() {
        let config = ClientConfig {
            api_key: Some("k".to_string()),
            ..valid()
        };
        let settings = config.connection_settings().unwrap();
        assert_eq!(settings.endpoint.query(), Some("auth=k"));
        assert_eq!(settings.credential.as_deref(), Some("k"));
        assert_eq!(settings.reconnect.max_interval_ms, 30_000);
        assert_eq!(config.redacted().api_key.as_deref(), Some("********"));
    }
}
