//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "EVENT_GATEWAY_CONFIG";

/// Used when neither an argument nor [`CONFIG_ENV`] is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

/// Top-level gateway configuration. Every section is optional in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub schema: SchemaConfig,
    pub broker: BrokerConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port for `POST /event` and `GET /healthz`.
    pub port: u16,
    /// Port for the admin API.
    pub admin_port: u16,
    /// Log level, used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            admin_port: 8081,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Address of the event listener.
    pub fn event_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address of the admin listener.
    pub fn admin_addr(&self) -> String {
        format!("{}:{}", self.host, self.admin_port)
    }
}

/// Channel registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON file mapping event type to channel.
    pub channels_path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channels_path: PathBuf::from("config/channels.json"),
        }
    }
}

/// Schema directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Directory of `<name>.schema.json` documents.
    pub dir: PathBuf,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("config/schema"),
        }
    }
}

/// Broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Bootstrap brokers.
    pub brokers: Vec<String>,
    /// Upper bound on one publish, in milliseconds.
    pub delivery_timeout_ms: u64,
    /// Create missing topics at startup (development clusters).
    pub ensure_topics: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            delivery_timeout_ms: 5_000,
            ensure_topics: false,
        }
    }
}

impl BrokerConfig {
    /// Delivery deadline as a [`Duration`].
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

/// Picks the configuration file: explicit argument, then environment, then
/// [`DEFAULT_CONFIG_PATH`].
pub fn resolve_config_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Loads configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    let content = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.as_ref().display(), e)))?;
    parse_config(&content)
}

/// Loads configuration, falling back to defaults when the file does not exist.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        Ok(GatewayConfig::default())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.admin_port, 8081);
        assert_eq!(config.broker.delivery_timeout(), Duration::from_secs(5));
        assert!(!config.broker.ensure_topics);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [server]
            port = 9000

            [broker]
            brokers = ["kafka-1:9092", "kafka-2:9092"]
            ensure_topics = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.admin_port, 8081);
        assert_eq!(config.broker.brokers.len(), 2);
        assert!(config.broker.ensure_topics);
        assert_eq!(config.broker.delivery_timeout_ms, 5_000);
        assert_eq!(config.registry.channels_path, PathBuf::from("config/channels.json"));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = parse_config("[server\nport = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));

        let err = parse_config("[server]\nport = \"eighty\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 8080);

        assert!(matches!(
            load_config(dir.path().join("absent.toml")),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[schema]\ndir = \"/etc/gateway/schema\"\n").unwrap();

        let config = load_config_or_default(&path).unwrap();
        assert_eq!(config.schema.dir, PathBuf::from("/etc/gateway/schema"));
    }

    #[test]
    fn test_resolve_config_path() {
        assert_eq!(
            resolve_config_path(Some("a.toml".into()), Some("b.toml".into())),
            PathBuf::from("a.toml")
        );
        assert_eq!(
            resolve_config_path(None, Some("b.toml".into())),
            PathBuf::from("b.toml")
        );
        assert_eq!(resolve_config_path(None, None), PathBuf::from(DEFAULT_CONFIG_PATH));
    }
}
