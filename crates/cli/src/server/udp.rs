use ferrous_proxy_domain::Config;
use ferrous_proxy_infrastructure::udp::UdpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run_udp_proxy(config: &Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = UdpListener::from_config(config)?;
    let mut running = listener.start()?;

    info!(
        bind_address = %running.local_addr(),
        resolver = %config.upstream.resolver,
        max_connections = config.relay.max_connections,
        tcp_only = config.relay.tcp_only,
        "DNS proxy ready"
    );

    running.serve(shutdown).await;
    running.stop();
    Ok(())
}
