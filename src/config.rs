//! Relay connection configuration.
//!
//! The core consumes a plain configuration value; where it comes from
//! (settings dialog, encrypted store, file) is the caller's concern.
//! TOML loading is provided for convenience and tests.

use serde::Deserialize;

/// How the byte stream to the relay is carried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Plain TCP.
    #[default]
    Plain,
    /// TLS over TCP.
    Tls,
    /// WebSocket (`ws://`).
    WebSocket,
    /// WebSocket over TLS (`wss://`).
    WebSocketTls,
}

impl ConnectionType {
    /// Whether this type uses the WebSocket framing layer.
    pub fn is_websocket(&self) -> bool {
        matches!(self, Self::WebSocket | Self::WebSocketTls)
    }

    /// Whether this type encrypts the stream.
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls | Self::WebSocketTls)
    }
}

/// How authentication is performed at connect time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeMode {
    /// Negotiate a password hash algorithm before `init`.
    #[default]
    Modern,
    /// Send the password in clear text inside `init`, for relays that
    /// predate the `handshake` command.
    Legacy,
}

/// Connection settings for one relay.
#[derive(Clone, Debug, Deserialize)]
pub struct RelayConfig {
    /// Relay hostname or address.
    pub host: String,
    /// Relay port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Stream carrier.
    #[serde(default)]
    pub connection_type: ConnectionType,
    /// Relay password, already decrypted by the caller.
    #[serde(default)]
    pub password: String,
    /// Authentication style.
    #[serde(default)]
    pub handshake_mode: HandshakeMode,
    /// Number of backlog lines requested per buffer.
    #[serde(default = "default_backlog_size")]
    pub backlog_size: u32,
    /// Input history entries retained per buffer (consumed by the UI
    /// layer; carried here so one config object covers the session).
    #[serde(default = "default_history_size")]
    pub history_size: u32,
    /// Seconds between keep-alive pings.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Seconds the caller should wait before a post-login reconnect.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Seconds allowed for TCP connect and TLS/WebSocket handshakes.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// URL path for WebSocket connections.
    #[serde(default = "default_websocket_path")]
    pub websocket_path: String,
}

fn default_port() -> u16 {
    9001
}

fn default_backlog_size() -> u32 {
    100
}

fn default_history_size() -> u32 {
    50
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_websocket_path() -> String {
    "/weechat".to_string()
}

impl RelayConfig {
    /// A config for `host:port` with every other field defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connection_type: ConnectionType::default(),
            password: String::new(),
            handshake_mode: HandshakeMode::default(),
            backlog_size: default_backlog_size(),
            history_size: default_history_size(),
            ping_interval_secs: default_ping_interval_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            websocket_path: default_websocket_path(),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, crate::error::RelayError> {
        toml::from_str(raw).map_err(|e| crate::error::RelayError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<Self, crate::error::RelayError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_toml_gets_defaults() {
        let config = RelayConfig::from_toml_str(r#"host = "relay.example.org""#).unwrap();
        assert_eq!(config.host, "relay.example.org");
        assert_eq!(config.port, 9001);
        assert_eq!(config.connection_type, ConnectionType::Plain);
        assert_eq!(config.handshake_mode, HandshakeMode::Modern);
        assert_eq!(config.ping_interval_secs, 30);
        assert_eq!(config.reconnect_delay_secs, 10);
        assert_eq!(config.websocket_path, "/weechat");
    }

    #[test]
    fn test_full_toml() {
        let raw = r#"
            host = "example.net"
            port = 8000
            connection_type = "web_socket_tls"
            password = "hunter2"
            handshake_mode = "legacy"
            backlog_size = 500
        "#;
        let config = RelayConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.connection_type, ConnectionType::WebSocketTls);
        assert!(config.connection_type.is_tls());
        assert!(config.connection_type.is_websocket());
        assert_eq!(config.handshake_mode, HandshakeMode::Legacy);
        assert_eq!(config.backlog_size, 500);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"localhost\"\nport = 9000").unwrap();
        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = RelayConfig::from_toml_str("port = \"not a number\"").unwrap_err();
        assert!(matches!(err, crate::error::RelayError::Config(_)));
    }
}
