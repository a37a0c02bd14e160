use clap::Parser;
use ferrous_proxy_domain::CliOverrides;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bootstrap;
mod server;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ferrous-proxy")]
#[command(version)]
#[command(about = "Ferrous Proxy - UDP DNS forwarder")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// DNS server port
    #[arg(short = 'd', long)]
    dns_port: Option<u16>,

    /// Bind address
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Resolver address (ip:port)
    #[arg(short = 'r', long)]
    resolver: Option<String>,

    /// Maximum number of in-flight UDP queries
    #[arg(long)]
    max_connections: Option<usize>,

    /// Answer every UDP query with a truncated reply
    #[arg(long)]
    tcp_only: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        dns_port: cli.dns_port,
        bind_address: cli.bind.clone(),
        resolver: cli.resolver.clone(),
        max_connections: cli.max_connections,
        tcp_only: cli.tcp_only,
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config);

    info!("Starting Ferrous Proxy v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Unable to listen for shutdown signal");
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    server::run_udp_proxy(&config, shutdown).await?;

    info!("Server shutdown complete");
    Ok(())
}
