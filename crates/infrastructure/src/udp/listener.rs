use ferrous_proxy_domain::{Config, DomainError, RelayConfig};
use socket2::Socket;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::registry::RequestRegistry;
use super::relay::{ReadOutcome, Relay};
use super::tune::{create_udp_socket, tune};
use crate::dns::{EdnsSection, EnvelopeOverhead, OptRecordAppender};

type SharedFd = Arc<AsyncFd<UdpSocket>>;

/// Both UDP sockets, created, bound and tuned but not yet registered with the
/// runtime.
pub struct UdpListener {
    listener: UdpSocket,
    resolver: UdpSocket,
    local_addr: SocketAddr,
    resolver_addr: SocketAddr,
    registry: RequestRegistry,
    relay_config: RelayConfig,
    edns: Box<dyn EdnsSection>,
    envelope: EnvelopeOverhead,
}

impl UdpListener {
    pub fn from_config(config: &Config) -> Result<Self, DomainError> {
        let bind_addr: SocketAddr = config.server.listen_addr().parse().map_err(|e| {
            DomainError::ConfigError(format!(
                "Invalid bind address '{}': {}",
                config.server.bind_address, e
            ))
        })?;
        let resolver_addr = config.upstream.resolver_addr()?;
        Self::bind(bind_addr, resolver_addr, &config.relay)
    }

    /// Creates the client-facing socket bound to `bind_addr` and the
    /// resolver-facing socket in the family of `resolver_addr`.
    ///
    /// On failure every socket created so far is closed.
    pub fn bind(
        bind_addr: SocketAddr,
        resolver_addr: SocketAddr,
        relay_config: &RelayConfig,
    ) -> Result<Self, DomainError> {
        let listener = create_udp_socket(bind_addr).map_err(|e| {
            error!(error = %e, "Unable to create a socket (UDP)");
            DomainError::SocketSetup(e.to_string())
        })?;
        listener.bind(&bind_addr.into()).map_err(|e| {
            error!(bind_address = %bind_addr, error = %e, "Unable to bind (UDP)");
            DomainError::Bind {
                addr: bind_addr.to_string(),
                reason: e.to_string(),
            }
        })?;
        tune(&listener, relay_config.socket_buffer_size, bind_addr.is_ipv6());

        let resolver = create_udp_socket(resolver_addr).map_err(|e| {
            error!(error = %e, "Unable to create a socket to the resolver");
            DomainError::SocketSetup(e.to_string())
        })?;
        tune(
            &resolver,
            relay_config.socket_buffer_size,
            resolver_addr.is_ipv6(),
        );

        let local_addr = local_addr(&listener)?;
        info!(bind_address = %local_addr, resolver = %resolver_addr, "UDP listener bound");

        Ok(Self {
            listener: listener.into(),
            resolver: resolver.into(),
            local_addr,
            resolver_addr,
            registry: RequestRegistry::new(relay_config.max_connections),
            edns: Box::new(OptRecordAppender::new(relay_config.edns_payload_size)),
            envelope: EnvelopeOverhead::default(),
            relay_config: relay_config.clone(),
        })
    }

    pub fn with_edns(mut self, edns: Box<dyn EdnsSection>) -> Self {
        self.edns = edns;
        self
    }

    pub fn with_envelope(mut self, envelope: EnvelopeOverhead) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Registers both sockets for read readiness. Must run inside a tokio
    /// runtime.
    pub fn start(self) -> Result<RunningUdpListener, DomainError> {
        let listener_fd = register(self.listener)?;
        let resolver_fd = match register(self.resolver) {
            Ok(fd) => fd,
            Err(e) => {
                drop(listener_fd);
                return Err(e);
            }
        };

        let relay = Relay::new(
            listener_fd,
            resolver_fd,
            self.resolver_addr,
            &self.relay_config,
        )
        .with_registry(self.registry)
        .with_edns(self.edns)
        .with_envelope(self.envelope);

        info!(bind_address = %self.local_addr, "UDP listener started");

        Ok(RunningUdpListener {
            relay,
            local_addr: self.local_addr,
        })
    }
}

/// The listener while it services traffic. Outside of `serve`, the relay
/// holds the only handles to both registered sockets.
pub struct RunningUdpListener {
    relay: Relay<SharedFd>,
    local_addr: SocketAddr,
}

impl RunningUdpListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn relay(&self) -> &Relay<SharedFd> {
        &self.relay
    }

    /// Dispatches readiness and timer events until `shutdown` is cancelled.
    ///
    /// At most [`MAX_READS_PER_WAKEUP`] datagrams are read per readiness
    /// event; a socket that is still readable afterwards keeps its readiness
    /// and is picked up again after shutdown, timers and the other socket
    /// have been polled.
    pub async fn serve(&mut self, shutdown: CancellationToken) {
        let listener_fd = self.relay.listener_socket().clone();
        let Some(resolver_fd) = self.relay.resolver_socket().cloned() else {
            warn!("Resolver socket already closed");
            return;
        };

        loop {
            let saturated = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                Some(event) = self.relay.next_timer() => {
                    self.relay.handle_timer(event);
                    false
                }

                guard = resolver_fd.readable() => {
                    let Ok(mut guard) = guard else {
                        warn!("Resolver socket readiness failed");
                        break;
                    };
                    let drained = read_batch(|| self.relay.handle_resolver_datagram());
                    if drained {
                        guard.clear_ready();
                    }
                    !drained
                }

                guard = listener_fd.readable() => {
                    let Ok(mut guard) = guard else {
                        warn!("Client socket readiness failed");
                        break;
                    };
                    let drained = read_batch(|| self.relay.handle_client_datagram());
                    if drained {
                        guard.clear_ready();
                    }
                    !drained
                }
            };

            if saturated {
                tokio::task::yield_now().await;
            }
        }
    }

    /// Deregisters the resolver socket, then destroys every in-flight request
    /// together with its timers. Returns the number of requests destroyed.
    pub fn stop(self) -> usize {
        let RunningUdpListener { mut relay, .. } = self;

        drop(relay.take_resolver());
        let drained = relay.drain();
        drop(relay);

        info!(drained, "UDP listener shut down");
        drained
    }
}

/// Upper bound of datagrams read from one socket per readiness event.
pub const MAX_READS_PER_WAKEUP: usize = 32;

/// Runs `read` until the socket is drained or the batch is used up. Returns
/// `true` when the socket was drained.
fn read_batch(mut read: impl FnMut() -> ReadOutcome) -> bool {
    for _ in 0..MAX_READS_PER_WAKEUP {
        if read() == ReadOutcome::Drained {
            return true;
        }
    }
    false
}

fn register(socket: UdpSocket) -> Result<SharedFd, DomainError> {
    AsyncFd::with_interest(socket, Interest::READABLE)
        .map(Arc::new)
        .map_err(|e| {
            error!(error = %e, "Unable to register UDP socket with the event loop");
            DomainError::EventRegistration(e.to_string())
        })
}

fn local_addr(socket: &Socket) -> Result<SocketAddr, DomainError> {
    socket
        .local_addr()
        .ok()
        .and_then(|addr| addr.as_socket())
        .ok_or_else(|| DomainError::SocketSetup("unable to read local address".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_batch_stops_at_cap_on_busy_socket() {
        let mut reads = 0;
        let drained = read_batch(|| {
            reads += 1;
            ReadOutcome::Handled
        });
        assert!(!drained);
        assert_eq!(reads, MAX_READS_PER_WAKEUP);
    }

    #[test]
    fn test_read_batch_reports_drained_socket() {
        let mut pending = 3;
        let drained = read_batch(|| {
            if pending == 0 {
                return ReadOutcome::Drained;
            }
            pending -= 1;
            ReadOutcome::Handled
        });
        assert!(drained);
        assert_eq!(pending, 0);
    }
}
