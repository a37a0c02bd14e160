use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::relay::RelayConfig;
use super::server::ServerConfig;
use super::upstream::UpstreamConfig;

/// Main configuration structure for Ferrous Proxy
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Listening socket (port, bind address)
    #[serde(default)]
    pub server: ServerConfig,

    /// Resolver the queries are forwarded to
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// UDP forwarding core tuning
    #[serde(default)]
    pub relay: RelayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. ferrous-proxy.toml in current directory
    /// 3. /etc/ferrous-proxy/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if let Some(path) = Self::get_config_path() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Apply command-line overrides to configuration
    pub fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(port) = overrides.dns_port {
            self.server.dns_port = port;
        }
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(resolver) = overrides.resolver {
            self.upstream.resolver = resolver;
        }
        if let Some(max) = overrides.max_connections {
            self.relay.max_connections = max;
        }
        if overrides.tcp_only {
            self.relay.tcp_only = true;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.dns_port == 0 {
            return Err(ConfigError::Validation("DNS port cannot be 0".to_string()));
        }

        self.server
            .listen_addr()
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                ConfigError::Validation(format!(
                    "Invalid bind address '{}': {}",
                    self.server.bind_address, e
                ))
            })?;

        self.upstream.resolver_addr()?;

        if self.relay.max_connections == 0 {
            return Err(ConfigError::Validation(
                "max_connections must be at least 1".to_string(),
            ));
        }

        if self.relay.query_timeout == 0 {
            return Err(ConfigError::Validation(
                "query_timeout must be at least 1 second".to_string(),
            ));
        }

        if self.relay.retry_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "retry_delay_ms must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the path to the configuration file being used
    pub fn get_config_path() -> Option<String> {
        if std::path::Path::new("ferrous-proxy.toml").exists() {
            Some("ferrous-proxy.toml".to_string())
        } else if std::path::Path::new("/etc/ferrous-proxy/config.toml").exists() {
            Some("/etc/ferrous-proxy/config.toml".to_string())
        } else {
            None
        }
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub dns_port: Option<u16>,
    pub bind_address: Option<String>,
    pub resolver: Option<String>,
    pub max_connections: Option<usize>,
    pub tcp_only: bool,
    pub log_level: Option<String>,
}
