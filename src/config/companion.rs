//! Companion configuration types
//!
//! Defines the main configuration structures for the companion daemon.

use crate::error::CompanionError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default gateway host (the head unit's address on its own AP)
fn default_gateway_host() -> String {
    "10.0.0.1".to_string()
}

/// Default gateway handshake/telemetry port
fn default_gateway_port() -> u16 {
    9876
}

/// Default handshake connect timeout in seconds
fn default_connect_timeout() -> u64 {
    5
}

/// Default handshake read timeout in seconds
fn default_read_timeout() -> u64 {
    10
}

/// Default telemetry push interval in seconds
fn default_push_interval() -> u64 {
    5
}

/// Root configuration structure
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Companion configuration
    pub companion: CompanionConfig,
}

impl Config {
    /// Validate the whole configuration
    pub fn validate(&self) -> Result<(), CompanionError> {
        self.companion.validate()
    }
}

/// Companion client configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompanionConfig {
    /// Gateway host to connect to
    #[serde(default = "default_gateway_host")]
    pub gateway_host: String,

    /// Gateway port to connect to
    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,

    /// Shared secret (lowercase hex), as derived during pairing.
    /// May be absent in the file and supplied via `--pair`.
    #[serde(default)]
    pub shared_secret: Option<String>,

    /// Identifier of the paired vehicle, if known
    #[serde(default)]
    pub vehicle_id: Option<String>,

    /// Network name of the paired vehicle, if known
    #[serde(default)]
    pub vehicle_ssid: Option<String>,

    /// Path of the vehicle registry file
    #[serde(default)]
    pub registry_path: Option<PathBuf>,

    /// Handshake connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Handshake read timeout in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,

    /// Telemetry push interval in seconds
    #[serde(default = "default_push_interval")]
    pub push_interval: u64,

    /// SOCKS5 relay configuration
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            gateway_host: default_gateway_host(),
            gateway_port: default_gateway_port(),
            shared_secret: None,
            vehicle_id: None,
            vehicle_ssid: None,
            registry_path: None,
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            push_interval: default_push_interval(),
            relay: RelayConfig::default(),
        }
    }
}

impl CompanionConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), CompanionError> {
        if self.gateway_host.trim().is_empty() {
            return Err(CompanionError::Config(
                "gateway_host must not be empty".to_string(),
            ));
        }
        if self.gateway_port == 0 {
            return Err(CompanionError::Config(
                "gateway_port must be non-zero".to_string(),
            ));
        }
        if self.push_interval == 0 {
            return Err(CompanionError::Config(
                "push_interval must be at least 1 second".to_string(),
            ));
        }
        if let Some(secret) = &self.shared_secret {
            if secret.trim().is_empty() {
                return Err(CompanionError::Config(
                    "shared_secret must not be blank when present".to_string(),
                ));
            }
        }
        self.relay.validate()
    }
}

/// Default relay bind address
fn default_relay_bind_addr() -> String {
    "0.0.0.0".to_string()
}

/// Default relay listening port
fn default_relay_port() -> u16 {
    1080
}

/// Default cap on concurrently served relay connections
fn default_relay_max_connections() -> usize {
    20
}

/// Default relay egress connect timeout in seconds
fn default_relay_connect_timeout() -> u64 {
    10
}

/// Default relay client idle-read timeout in seconds
fn default_relay_idle_timeout() -> u64 {
    120
}

/// Default relay enabled flag
fn default_relay_enabled() -> bool {
    true
}

/// SOCKS5 relay configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelayConfig {
    /// Whether the relay listener is started at all
    #[serde(default = "default_relay_enabled")]
    pub enabled: bool,

    /// Local address the listener binds to
    #[serde(default = "default_relay_bind_addr")]
    pub bind_addr: String,

    /// Local port the listener binds to (0 picks an ephemeral port)
    #[serde(default = "default_relay_port")]
    pub port: u16,

    /// Cap on concurrently served connections; excess is closed after accept
    #[serde(default = "default_relay_max_connections")]
    pub max_connections: usize,

    /// Egress connect timeout in seconds
    #[serde(default = "default_relay_connect_timeout")]
    pub connect_timeout: u64,

    /// Client idle-read timeout in seconds
    #[serde(default = "default_relay_idle_timeout")]
    pub idle_timeout: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: default_relay_enabled(),
            bind_addr: default_relay_bind_addr(),
            port: default_relay_port(),
            max_connections: default_relay_max_connections(),
            connect_timeout: default_relay_connect_timeout(),
            idle_timeout: default_relay_idle_timeout(),
        }
    }
}

impl RelayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), CompanionError> {
        if self.max_connections == 0 {
            return Err(CompanionError::Config(
                "relay.max_connections must be at least 1".to_string(),
            ));
        }
        if self.bind_addr.trim().is_empty() {
            return Err(CompanionError::Config(
                "relay.bind_addr must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
