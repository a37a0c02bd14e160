//! UDP forwarding core of Ferrous Proxy.
pub mod dns;
pub mod udp;
