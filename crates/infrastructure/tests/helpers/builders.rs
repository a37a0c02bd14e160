#![allow(dead_code)]
use ferrous_proxy_domain::RelayConfig;
use ferrous_proxy_infrastructure::udp::Relay;
use std::net::SocketAddr;
use std::sync::Arc;

use super::scripted_socket::ScriptedSocket;

pub const RESOLVER: &str = "192.0.2.53:53";

pub fn client(port: u16) -> SocketAddr {
    SocketAddr::from(([198, 51, 100, 7], port))
}

/// Relay settings for tests: no OPT record is added to queries so forwarded
/// bytes equal the bytes received.
pub fn relay_config(max_connections: usize) -> RelayConfig {
    RelayConfig {
        max_connections,
        edns_payload_size: 512,
        ..RelayConfig::default()
    }
}

pub struct RelayHarness {
    pub relay: Relay<Arc<ScriptedSocket>>,
    pub listener: Arc<ScriptedSocket>,
    pub resolver: Arc<ScriptedSocket>,
}

impl RelayHarness {
    pub fn new(config: RelayConfig) -> Self {
        let listener = Arc::new(ScriptedSocket::new());
        let resolver = Arc::new(ScriptedSocket::new());
        let relay = Relay::new(
            listener.clone(),
            resolver.clone(),
            RESOLVER.parse().unwrap(),
            &config,
        );
        Self {
            relay,
            listener,
            resolver,
        }
    }

    pub fn resolver_addr(&self) -> SocketAddr {
        RESOLVER.parse().unwrap()
    }

    /// Feeds one client query through the client-ingress path.
    pub fn client_query(&mut self, query: &[u8], from: SocketAddr) {
        self.listener.push_datagram(query, from);
        self.relay.handle_client_datagram();
    }

    /// Feeds one datagram through the resolver-ingress path.
    pub fn resolver_reply(&mut self, reply: &[u8], from: SocketAddr) {
        self.resolver.push_datagram(reply, from);
        self.relay.handle_resolver_datagram();
    }
}

pub struct QueryBuilder {
    id: u16,
    labels: Vec<String>,
    opt_payload: Option<u16>,
}

impl QueryBuilder {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            labels: vec!["example".to_string(), "com".to_string()],
            opt_payload: None,
        }
    }

    pub fn domain(mut self, domain: &str) -> Self {
        self.labels = domain.split('.').map(str::to_string).collect();
        self
    }

    /// A name of `count` labels of 60 characters each.
    pub fn long_name(mut self, count: usize) -> Self {
        self.labels = (0..count).map(|_| "a".repeat(60)).collect();
        self
    }

    pub fn with_opt(mut self, payload: u16) -> Self {
        self.opt_payload = Some(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let arcount = u8::from(self.opt_payload.is_some());
        let id = self.id.to_be_bytes();
        let mut buf = vec![
            id[0], id[1], // ID
            0x01, 0x00, // flags: RD set
            0x00, 0x01, // QDCOUNT = 1
            0x00, 0x00, // ANCOUNT = 0
            0x00, 0x00, // NSCOUNT = 0
            0x00, arcount, // ARCOUNT
        ];
        for label in &self.labels {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0x00); // root label
        buf.extend_from_slice(&[0x00, 0x01]); // QTYPE = A
        buf.extend_from_slice(&[0x00, 0x01]); // QCLASS = IN
        if let Some(payload) = self.opt_payload {
            buf.push(0x00); // NAME = root
            buf.extend_from_slice(&[0x00, 41]); // TYPE = OPT
            buf.extend_from_slice(&payload.to_be_bytes()); // CLASS = UDP payload size
            buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // extended RCODE, version, flags
            buf.extend_from_slice(&[0x00, 0x00]); // RDLEN = 0
        }
        buf
    }
}

/// A datagram of exactly `len` bytes starting with a query header.
pub fn padded_query(id: u16, len: usize) -> Vec<u8> {
    let mut buf = QueryBuilder::new(id).build();
    buf.resize(len, 0);
    buf
}

/// Minimal reply to `query`: same ID and question, QR/RD/RA set.
pub fn reply_to(query: &[u8]) -> Vec<u8> {
    let mut reply = query.to_vec();
    reply[2] = 0x81;
    reply[3] = 0x80;
    reply
}
