//! TOML configuration for the hub binary.
//!
//! ```toml
//! [connection]
//! url = "ws://127.0.0.1:8080/"
//!
//! [registry]
//! inactive_timeout_ms = 5000
//!
//! [schema]
//! path = "commands.json"     # omit to use the built-in schema
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field has a serde default, so an empty file (or no file at all) is a
//! valid configuration.  CLI flags are applied on top by `main.rs`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level hub configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the gateway lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// WebSocket URL of the controller gateway.
    #[serde(default = "default_url")]
    pub url: String,
}

/// Device lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySettings {
    /// A device silent for longer than this is pruned.
    #[serde(default = "default_inactive_timeout_ms")]
    pub inactive_timeout_ms: u64,
}

/// Command schema source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaConfig {
    /// JSON schema document.  `None` selects the built-in command set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_url() -> String {
    "ws://127.0.0.1:8080/".to_string()
}
fn default_inactive_timeout_ms() -> u64 {
    5000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            inactive_timeout_ms: default_inactive_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Loading and saving ────────────────────────────────────────────────────────

impl HubConfig {
    /// Reads a config file.  Unlike a first-run default, a missing file is an
    /// error here: the path was given explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if the TOML is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Renders the config as pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn inactive_timeout(&self) -> Duration {
        Duration::from_millis(self.registry.inactive_timeout_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        // Arrange / Act
        let cfg = HubConfig::default();

        // Assert
        assert_eq!(cfg.connection.url, "ws://127.0.0.1:8080/");
        assert_eq!(cfg.registry.inactive_timeout_ms, 5000);
        assert_eq!(cfg.schema.path, None);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg = HubConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, HubConfig::default());
    }

    #[test]
    fn test_partial_toml_fills_missing_fields() {
        // Arrange
        let text = r#"
            [registry]
            inactive_timeout_ms = 2500

            [schema]
            path = "commands.json"
        "#;

        // Act
        let cfg = HubConfig::from_toml_str(text).unwrap();

        // Assert
        assert_eq!(cfg.inactive_timeout(), Duration::from_millis(2500));
        assert_eq!(cfg.schema.path, Some(PathBuf::from("commands.json")));
        assert_eq!(cfg.connection.url, "ws://127.0.0.1:8080/");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let result = HubConfig::from_toml_str("[registry]\ninactive_timeout_ms = \"soon\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_serializes_and_deserializes_round_trip() {
        // Arrange
        let mut cfg = HubConfig::default();
        cfg.connection.url = "ws://10.0.0.7:9000/".to_string();
        cfg.schema.path = Some(PathBuf::from("/etc/wandlink/commands.json"));

        // Act
        let text = cfg.to_toml_string().unwrap();
        let restored = HubConfig::from_toml_str(&text).unwrap();

        // Assert
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = HubConfig::load("/definitely/not/here/hub.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
