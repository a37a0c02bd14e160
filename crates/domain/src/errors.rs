use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Request {0} is no longer tracked")]
    RequestNotFound(u64),

    #[error("Send to {target} failed: {reason}")]
    SendFailed { target: String, reason: String },

    #[error("Send to {target} abandoned after {retries} retries")]
    RetryBudgetExhausted { target: String, retries: u8 },

    #[error("Request registry is empty")]
    RegistryEmpty,

    #[error("Socket setup failed: {0}")]
    SocketSetup(String),

    #[error("Unable to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Event registration failed: {0}")]
    EventRegistration(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<crate::config::ConfigError> for DomainError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
