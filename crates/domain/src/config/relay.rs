use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning of the UDP forwarding core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Maximum number of in-flight UDP requests. When reached, the oldest
    /// request is evicted to admit a new one.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Seconds an admitted request may wait for a resolver reply.
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    /// Delay between two attempts of a send that failed transiently.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Answer every query with a truncated reply so clients retry over TCP.
    #[serde(default)]
    pub tcp_only: bool,

    /// Receive and send buffer size requested on both UDP sockets.
    #[serde(default = "default_socket_buffer_size")]
    pub socket_buffer_size: usize,

    /// UDP payload size advertised in the OPT record added to queries that
    /// carry none. Values up to 512 disable the OPT record.
    #[serde(default = "default_edns_payload_size")]
    pub edns_payload_size: u16,
}

impl RelayConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            query_timeout: default_query_timeout(),
            retry_delay_ms: default_retry_delay_ms(),
            tcp_only: false,
            socket_buffer_size: default_socket_buffer_size(),
            edns_payload_size: default_edns_payload_size(),
        }
    }
}

fn default_max_connections() -> usize {
    250
}

fn default_query_timeout() -> u64 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_socket_buffer_size() -> usize {
    2 * 1024 * 1024
}

fn default_edns_payload_size() -> u16 {
    1252
}
