use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use super::errors::ConfigError;

/// The single resolver every UDP query is forwarded to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_resolver")]
    pub resolver: String,
}

impl UpstreamConfig {
    pub fn resolver_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.resolver.parse().map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid resolver address '{}': {}",
                self.resolver, e
            ))
        })
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            resolver: default_resolver(),
        }
    }
}

fn default_resolver() -> String {
    "9.9.9.9:53".to_string()
}
