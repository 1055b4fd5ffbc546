//! Daemon configuration.
//!
//! Settings merge from three layers: built-in defaults, an optional TOML
//! file, and command-line overrides applied last by the binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{BridgeError, Result};

/// Default viewer TCP port.
pub const DEFAULT_TCP_PORT: u16 = 4000;

/// Default CAN bitrate in bits per second.
pub const DEFAULT_BITRATE: u32 = 1_000_000;

/// Default CAN bus index (`can0`).
pub const DEFAULT_CAN_INDEX: u8 = 0;

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    #[serde(default)]
    pub can: CanSettings,
    #[serde(default)]
    pub tcp: TcpSettings,
}

/// CAN side settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanSettings {
    /// Bus index; the interface name is `can<index>`.
    #[serde(default = "default_can_index")]
    pub index: u8,
    /// Bitrate handed to the provisioning tools.
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
}

/// Viewer side settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpSettings {
    /// Viewer port on the local host.
    #[serde(default = "default_tcp_port")]
    pub port: u16,
}

fn default_can_index() -> u8 {
    DEFAULT_CAN_INDEX
}

fn default_bitrate() -> u32 {
    DEFAULT_BITRATE
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

impl Default for CanSettings {
    fn default() -> Self {
        Self {
            index: DEFAULT_CAN_INDEX,
            bitrate: DEFAULT_BITRATE,
        }
    }
}

impl Default for TcpSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_TCP_PORT,
        }
    }
}

impl BridgeConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.can.index, 0);
        assert_eq!(config.can.bitrate, 1_000_000);
        assert_eq!(config.tcp.port, 4000);
    }

    #[test]
    fn test_parse_full_config() {
        let config = BridgeConfig::from_toml(
            r#"
            [can]
            index = 1
            bitrate = 500000

            [tcp]
            port = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.can.index, 1);
        assert_eq!(config.can.bitrate, 500_000);
        assert_eq!(config.tcp.port, 5000);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = BridgeConfig::from_toml(
            r#"
            [tcp]
            port = 4001
            "#,
        )
        .unwrap();

        assert_eq!(config.can.index, 0);
        assert_eq!(config.can.bitrate, 1_000_000);
        assert_eq!(config.tcp.port, 4001);

        let empty = BridgeConfig::from_toml("").unwrap();
        assert_eq!(empty, BridgeConfig::default());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = BridgeConfig::from_toml(
            r#"
            [can]
            speed = 9600
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = BridgeConfig::from_file(Path::new("/nonexistent/canbridge.toml")).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
