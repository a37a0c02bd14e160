use ferrous_proxy_domain::{Config, DomainError, RelayConfig};
use ferrous_proxy_infrastructure::udp::{RunningUdpListener, UdpListener};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod helpers;
use helpers::{relay_config, MockDnsServer, QueryBuilder};

const LOCALHOST: &str = "127.0.0.1:0";

fn spawn_proxy(
    resolver: SocketAddr,
    config: RelayConfig,
) -> (SocketAddr, CancellationToken, JoinHandle<RunningUdpListener>) {
    let listener = match UdpListener::bind(LOCALHOST.parse().unwrap(), resolver, &config) {
        Ok(listener) => listener,
        Err(e) => panic!("bind failed: {e}"),
    };
    let mut running = match listener.start() {
        Ok(running) => running,
        Err(e) => panic!("start failed: {e}"),
    };
    let addr = running.local_addr();
    let token = CancellationToken::new();
    let shutdown = token.clone();
    let handle = tokio::spawn(async move {
        running.serve(shutdown).await;
        running
    });
    (addr, token, handle)
}

async fn exchange(proxy: SocketAddr, query: &[u8]) -> Vec<u8> {
    let client = UdpSocket::bind(LOCALHOST).await.unwrap();
    client.send_to(query, proxy).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let (len, from) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("no reply from proxy")
        .unwrap();
    assert_eq!(from, proxy);
    buf.truncate(len);
    buf
}

#[tokio::test]
async fn test_query_relayed_through_resolver() {
    let resolver = MockDnsServer::start().await.unwrap();
    let (proxy, token, handle) = spawn_proxy(resolver.addr(), relay_config(16));

    let query = QueryBuilder::new(0x5a5a).domain("example.com").build();
    let reply = exchange(proxy, &query).await;

    assert_eq!(&reply[..2], &[0x5a, 0x5a]);
    assert_eq!(reply[2] & 0x80, 0x80, "QR set");
    assert_eq!(reply[2] & 0x02, 0, "not truncated");
    assert_eq!(resolver.queries(), 1);

    token.cancel();
    let running = handle.await.unwrap();
    assert_eq!(running.relay().live(), 0);
    assert_eq!(running.stop(), 0);
}

#[tokio::test]
async fn test_tcp_only_proxy_never_contacts_resolver() {
    let resolver = MockDnsServer::start().await.unwrap();
    let config = RelayConfig {
        tcp_only: true,
        ..relay_config(16)
    };
    let (proxy, token, handle) = spawn_proxy(resolver.addr(), config);

    let query = QueryBuilder::new(0x0102).build();
    let reply = exchange(proxy, &query).await;

    assert_eq!(reply.len(), query.len());
    assert_eq!(&reply[..2], &query[..2]);
    assert_eq!(reply[2] & 0x82, 0x82, "QR and TC set");
    assert_eq!(reply[3] & 0x80, 0x80, "RA set");
    assert_eq!(resolver.queries(), 0);

    token.cancel();
    assert_eq!(handle.await.unwrap().stop(), 0);
}

#[tokio::test]
async fn test_stop_drains_outstanding_requests() {
    // The resolver never answers: queries stay outstanding.
    let silent = std::net::UdpSocket::bind(LOCALHOST).unwrap();
    let (proxy, token, handle) = spawn_proxy(silent.local_addr().unwrap(), relay_config(16));

    let client = UdpSocket::bind(LOCALHOST).await.unwrap();
    for id in 0..3u16 {
        client
            .send_to(&QueryBuilder::new(id).build(), proxy)
            .await
            .unwrap();
    }

    let mut received = 0;
    let mut buf = [0u8; 512];
    while received < 3 {
        let _ = tokio::time::timeout(Duration::from_secs(2), silent_recv(&silent, &mut buf))
            .await
            .expect("queries not forwarded");
        received += 1;
    }

    token.cancel();
    let running = handle.await.unwrap();
    assert_eq!(running.relay().live(), 3);
    assert_eq!(running.relay().pending_timers(), 3);
    assert_eq!(running.stop(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_honoured_during_client_flood() {
    let silent = std::net::UdpSocket::bind(LOCALHOST).unwrap();
    let (proxy, token, handle) = spawn_proxy(silent.local_addr().unwrap(), relay_config(64));

    let flooding = Arc::new(AtomicBool::new(true));
    let flooders: Vec<_> = (0..4u16)
        .map(|id| {
            let flooding = flooding.clone();
            std::thread::spawn(move || {
                let socket = std::net::UdpSocket::bind(LOCALHOST).unwrap();
                let query = QueryBuilder::new(id).build();
                while flooding.load(Ordering::Relaxed) {
                    let _ = socket.send_to(&query, proxy);
                }
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();
    let served = tokio::time::timeout(Duration::from_secs(2), handle).await;

    flooding.store(false, Ordering::Relaxed);
    for flooder in flooders {
        flooder.join().unwrap();
    }

    let running = served
        .expect("serve kept reading past shutdown")
        .unwrap();
    assert!(running.relay().live() <= 64);
    running.stop();
}

async fn silent_recv(socket: &std::net::UdpSocket, buf: &mut [u8]) -> (usize, SocketAddr) {
    socket.set_nonblocking(true).unwrap();
    loop {
        match socket.recv_from(buf) {
            Ok(received) => return received,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Err(e) => panic!("recv failed: {e}"),
        }
    }
}

#[test]
fn test_bind_to_port_in_use_fails() {
    let taken = std::net::UdpSocket::bind(LOCALHOST).unwrap();
    let addr = taken.local_addr().unwrap();

    let result = UdpListener::bind(addr, "127.0.0.1:53".parse().unwrap(), &relay_config(4));

    match result {
        Err(DomainError::Bind { addr: failed, .. }) => assert_eq!(failed, addr.to_string()),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("bind to a port in use succeeded"),
    }
}

#[test]
fn test_from_config_binds_configured_address() {
    let mut config = Config::default();
    config.server.bind_address = "127.0.0.1".to_string();
    config.server.dns_port = 0;

    let listener = match UdpListener::from_config(&config) {
        Ok(listener) => listener,
        Err(e) => panic!("from_config failed: {e}"),
    };
    assert!(listener.local_addr().ip().is_loopback());
    assert_ne!(listener.local_addr().port(), 0);
}

#[test]
fn test_from_config_rejects_invalid_resolver() {
    let mut config = Config::default();
    config.server.dns_port = 0;
    config.upstream.resolver = "not-an-address".to_string();

    assert!(matches!(
        UdpListener::from_config(&config),
        Err(DomainError::ConfigError(_))
    ));
}
