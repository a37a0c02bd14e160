pub mod udp;

pub use udp::run_udp_proxy;
