#![allow(dead_code)]
pub mod builders;
pub mod dns_server_mock;
pub mod scripted_socket;

pub use builders::{client, relay_config, QueryBuilder, RelayHarness, RESOLVER};
pub use dns_server_mock::MockDnsServer;
pub use scripted_socket::ScriptedSocket;
