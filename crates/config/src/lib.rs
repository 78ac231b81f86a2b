//! Configuration loading and validation for flowdesk.
//!
//! Loads configuration from `~/.flowdesk/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.flowdesk/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gateway HTTP server
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Workflow engine registry
    #[serde(default)]
    pub engine: EngineConfig,

    /// Process-instance query index
    #[serde(default)]
    pub index: IndexConfig,

    /// User directory
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Notification storage
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8460
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the workflow registry
    #[serde(default = "default_engine_url")]
    pub registry_url: String,

    #[serde(default = "default_engine_timeout")]
    pub request_timeout_secs: u64,
}

fn default_engine_url() -> String {
    "http://localhost:8200".into()
}
fn default_engine_timeout() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_url: default_engine_url(),
            request_timeout_secs: default_engine_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the query index
    #[serde(default = "default_index_url")]
    pub base_url: String,

    #[serde(default = "default_index_timeout")]
    pub request_timeout_secs: u64,
}

fn default_index_url() -> String {
    "http://localhost:8300".into()
}
fn default_index_timeout() -> u64 {
    15
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: default_index_url(),
            request_timeout_secs: default_index_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL of the user directory
    #[serde(default = "default_directory_url")]
    pub base_url: String,
}

fn default_directory_url() -> String {
    "http://localhost:8400".into()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_directory_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Storage backend: "sqlite" or "memory"
    #[serde(default = "default_notify_backend")]
    pub backend: String,

    /// SQLite database path; defaults to `~/.flowdesk/notifications.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

fn default_notify_backend() -> String {
    "sqlite".into()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            backend: default_notify_backend(),
            db_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.flowdesk/config.toml).
    ///
    /// Environment variables override file values:
    /// - `FLOWDESK_ENGINE_URL` — engine registry base URL
    /// - `FLOWDESK_INDEX_URL` — query index base URL
    /// - `FLOWDESK_DIRECTORY_URL` — user directory base URL
    /// - `FLOWDESK_DB_PATH` — notification database path
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(url) = std::env::var("FLOWDESK_ENGINE_URL") {
            config.engine.registry_url = url;
        }
        if let Ok(url) = std::env::var("FLOWDESK_INDEX_URL") {
            config.index.base_url = url;
        }
        if let Ok(url) = std::env::var("FLOWDESK_DIRECTORY_URL") {
            config.directory.base_url = url;
        }
        if let Ok(path) = std::env::var("FLOWDESK_DB_PATH") {
            config.notifications.db_path = Some(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".flowdesk")
    }

    /// Resolved notification database path.
    pub fn notification_db_path(&self) -> PathBuf {
        match &self.notifications.db_path {
            Some(path) => PathBuf::from(path),
            None => Self::config_dir().join("notifications.db"),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("engine.registry_url", &self.engine.registry_url),
            ("index.base_url", &self.index.base_url),
            ("directory.base_url", &self.directory.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must start with http:// or https:// (got '{url}')"
                )));
            }
        }

        if self.engine.request_timeout_secs == 0 || self.index.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }

        match self.notifications.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "notifications.backend must be 'sqlite' or 'memory' (got '{other}')"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            engine: EngineConfig::default(),
            index: IndexConfig::default(),
            directory: DirectoryConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for flowdesk_core::Error {
    fn from(e: ConfigError) -> Self {
        flowdesk_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.port, 8460);
        assert_eq!(config.notifications.backend, "sqlite");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.engine.registry_url, config.engine.registry_url);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().index.base_url, "http://localhost:8300");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[gateway]
port = 9000

[engine]
registry_url = "http://engine.internal:8200"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.engine.registry_url, "http://engine.internal:8200");
        assert_eq!(config.engine.request_timeout_secs, 30);
        assert_eq!(config.directory.base_url, "http://localhost:8400");
    }

    #[test]
    fn invalid_scheme_rejected() {
        let config = AppConfig {
            engine: EngineConfig {
                registry_url: "ftp://engine".into(),
                request_timeout_secs: 30,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = AppConfig {
            index: IndexConfig {
                base_url: default_index_url(),
                request_timeout_secs: 0,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let config = AppConfig {
            notifications: NotificationsConfig {
                backend: "postgres".into(),
                db_path: None,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[notifications]
backend = "memory"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.notifications.backend, "memory");
    }

    #[test]
    fn explicit_db_path_wins() {
        let config = AppConfig {
            notifications: NotificationsConfig {
                backend: "sqlite".into(),
                db_path: Some("/var/lib/flowdesk/notify.db".into()),
            },
            ..AppConfig::default()
        };
        assert_eq!(
            config.notification_db_path(),
            PathBuf::from("/var/lib/flowdesk/notify.db")
        );
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("8460"));
        assert!(toml_str.contains("registry_url"));
        assert!(toml_str.contains("sqlite"));
    }
}
