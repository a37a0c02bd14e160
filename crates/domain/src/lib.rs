//! Ferrous Proxy Domain Layer
pub mod config;
pub mod errors;

pub use config::{CliOverrides, Config, RelayConfig};
pub use errors::DomainError;
