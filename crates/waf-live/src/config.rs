//! Client configuration.
//!
//! Loaded from TOML, with optional overrides from the environment:
//! - `WAF_LIVE_ENDPOINT`: feed endpoint URL
//! - `WAF_LIVE_API_URL`: REST API base URL
//! - `WAF_LIVE_TRANSPORT`: `auto`, `websocket` or `polling`

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::LiveError;
use crate::heartbeat::HeartbeatConfig;
use crate::reconnect::ReconnectPolicy;

/// Environment variable overriding [`LiveConfig::endpoint`].
pub const ENV_ENDPOINT: &str = "WAF_LIVE_ENDPOINT";
/// Environment variable overriding [`LiveConfig::api_url`].
pub const ENV_API_URL: &str = "WAF_LIVE_API_URL";
/// Environment variable overriding [`LiveConfig::transport`].
pub const ENV_TRANSPORT: &str = "WAF_LIVE_TRANSPORT";

/// Which transport to open the feed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// WebSocket first, HTTP polling if the upgrade fails.
    #[default]
    Auto,
    /// WebSocket only.
    WebSocket,
    /// HTTP polling only.
    Polling,
}

impl FromStr for TransportKind {
    type Err = LiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "websocket" | "ws" => Ok(Self::WebSocket),
            "polling" | "xhr" => Ok(Self::Polling),
            other => Err(LiveError::Config(format!("unknown transport: {other}"))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::WebSocket => "websocket",
            Self::Polling => "polling",
        };
        f.write_str(s)
    }
}

/// Reconnection settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectSettings {
    /// Consecutive drops tolerated before giving up.
    pub max_attempts: u32,
    /// Fixed delay between retries in milliseconds.
    pub delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 5_000,
        }
    }
}

impl From<ReconnectSettings> for ReconnectPolicy {
    fn from(settings: ReconnectSettings) -> Self {
        Self {
            delay: Duration::from_millis(settings.delay_ms),
            max_attempts: settings.max_attempts,
        }
    }
}

/// Heart-beat settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeartbeatSettings {
    /// Outgoing heart-beat offer in milliseconds (0 disables).
    pub outgoing_ms: u64,
    /// Incoming heart-beat request in milliseconds (0 disables).
    pub incoming_ms: u64,
    /// Missed server intervals tolerated before the link counts as dropped.
    pub grace_factor: u32,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            outgoing_ms: 10_000,
            incoming_ms: 10_000,
            grace_factor: 2,
        }
    }
}

impl From<HeartbeatSettings> for HeartbeatConfig {
    fn from(settings: HeartbeatSettings) -> Self {
        Self {
            outgoing: Duration::from_millis(settings.outgoing_ms),
            incoming: Duration::from_millis(settings.incoming_ms),
            grace_factor: settings.grace_factor,
        }
    }
}

/// Projection buffer sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BufferSettings {
    /// Recent attacks kept.
    pub attacks: usize,
    /// Traffic samples kept.
    pub traffic: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            attacks: crate::projection::ATTACK_FEED_CAPACITY,
            traffic: crate::projection::TRAFFIC_WINDOW_CAPACITY,
        }
    }
}

/// Live feed client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LiveConfig {
    /// Feed endpoint (`http(s)://host:port/ws`).
    pub endpoint: String,
    /// REST API base URL used for initial snapshots.
    pub api_url: String,
    /// Transport selection.
    pub transport: TransportKind,
    /// Upper bound on opening a session, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Reconnection settings.
    pub reconnect: ReconnectSettings,
    /// Heart-beat settings.
    pub heartbeat: HeartbeatSettings,
    /// Projection buffer sizes.
    pub buffers: BufferSettings,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081/ws".to_string(),
            api_url: "http://localhost:8080/api".to_string(),
            transport: TransportKind::Auto,
            connect_timeout_ms: 10_000,
            reconnect: ReconnectSettings::default(),
            heartbeat: HeartbeatSettings::default(),
            buffers: BufferSettings::default(),
        }
    }
}

impl LiveConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LiveError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            LiveError::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, LiveError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| LiveError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, LiveError> {
        toml::to_string_pretty(self).map_err(|e| LiveError::Config(format!("cannot render TOML: {e}")))
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is invalid.
    pub fn apply_env(&mut self) -> Result<(), LiveError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is invalid.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), LiveError> {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(api_url) = lookup(ENV_API_URL) {
            self.api_url = api_url;
        }
        if let Some(transport) = lookup(ENV_TRANSPORT) {
            self.transport = transport.parse()?;
        }
        self.validate()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), LiveError> {
        let endpoint = self.endpoint_url()?;
        if !matches!(endpoint.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(LiveError::Config(
                "endpoint must use http, https, ws or wss".to_string(),
            ));
        }

        let api = self.api_base()?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(LiveError::Config(
                "api_url must use http or https".to_string(),
            ));
        }

        if self.connect_timeout_ms == 0 {
            return Err(LiveError::Config(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.max_attempts == 0 {
            return Err(LiveError::Config(
                "reconnect.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.heartbeat.grace_factor == 0 {
            return Err(LiveError::Config(
                "heartbeat.grace_factor must be greater than 0".to_string(),
            ));
        }

        if self.buffers.attacks == 0 || self.buffers.traffic == 0 {
            return Err(LiveError::Config(
                "buffer sizes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed feed endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL.
    pub fn endpoint_url(&self) -> Result<Url, LiveError> {
        Url::parse(&self.endpoint)
            .map_err(|e| LiveError::Config(format!("invalid endpoint '{}': {e}", self.endpoint)))
    }

    /// Parsed REST API base.
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL is not a valid URL.
    pub fn api_base(&self) -> Result<Url, LiveError> {
        Url::parse(&self.api_url)
            .map_err(|e| LiveError::Config(format!("invalid api_url '{}': {e}", self.api_url)))
    }

    /// Connect timeout as a duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Reconnection policy.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect.into()
    }

    /// Heart-beat configuration.
    #[must_use]
    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        self.heartbeat.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("failed to write temp file");
        file
    }

    #[test]
    fn test_defaults() {
        let config = LiveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint, "http://localhost:8081/ws");
        assert_eq!(config.transport, TransportKind::Auto);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(config.heartbeat_config(), HeartbeatConfig::default());
        assert_eq!(config.buffers.attacks, 50);
        assert_eq!(config.buffers.traffic, 100);
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = LiveConfig::from_toml("").expect("empty config");
        assert_eq!(config, LiveConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = LiveConfig::from_toml(
            r#"
endpoint = "https://waf.example.com/ws"
api_url = "https://waf.example.com/api"
transport = "polling"
connect_timeout_ms = 3000

[reconnect]
max_attempts = 3
delay_ms = 1000

[heartbeat]
outgoing_ms = 0
incoming_ms = 20000
grace_factor = 3

[buffers]
attacks = 10
traffic = 20
"#,
        )
        .expect("full config");

        assert_eq!(config.transport, TransportKind::Polling);
        assert_eq!(config.reconnect_policy().delay, Duration::from_secs(1));
        assert_eq!(config.heartbeat_config().advertisement().to_header(), "0,20000");
        assert_eq!(config.buffers.attacks, 10);
    }

    #[test]
    fn test_load_from_file() {
        let file = create_temp_config("endpoint = \"http://10.0.0.5:8081/ws\"\n");
        let config = LiveConfig::from_file(file.path()).expect("load");
        assert_eq!(config.endpoint, "http://10.0.0.5:8081/ws");
    }

    #[test]
    fn test_file_not_found() {
        let err = LiveConfig::from_file("/nonexistent/waf-live.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let config = LiveConfig {
            transport: TransportKind::WebSocket,
            ..LiveConfig::default()
        };
        let rendered = config.to_toml().expect("render");
        assert_eq!(LiveConfig::from_toml(&rendered).expect("parse"), config);
    }

    #[test_case("endpoint = \"not a url\"" ; "unparseable endpoint")]
    #[test_case("endpoint = \"ftp://host/ws\"" ; "bad endpoint scheme")]
    #[test_case("api_url = \"ws://host/api\"" ; "bad api scheme")]
    #[test_case("connect_timeout_ms = 0" ; "zero timeout")]
    #[test_case("[reconnect]\nmax_attempts = 0" ; "zero attempts")]
    #[test_case("[heartbeat]\ngrace_factor = 0" ; "zero grace")]
    #[test_case("[buffers]\nattacks = 0" ; "zero buffer")]
    #[test_case("transport = \"carrier-pigeon\"" ; "unknown transport")]
    fn test_invalid_config_rejected(content: &str) {
        assert!(matches!(
            LiveConfig::from_toml(content),
            Err(LiveError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_ENDPOINT, "wss://edge.example.com/ws"),
            (ENV_TRANSPORT, "WebSocket"),
        ]
        .into_iter()
        .collect();

        let mut config = LiveConfig::default();
        config
            .apply_env_from(|key| env.get(key).map(ToString::to_string))
            .expect("overrides");

        assert_eq!(config.endpoint, "wss://edge.example.com/ws");
        assert_eq!(config.transport, TransportKind::WebSocket);
        assert_eq!(config.api_url, "http://localhost:8080/api");
    }

    #[test]
    fn test_env_override_invalid_transport() {
        let mut config = LiveConfig::default();
        let result = config.apply_env_from(|key| (key == ENV_TRANSPORT).then(|| "smoke".to_string()));
        assert!(result.is_err());
    }
}
