//! The UDP forwarding core.
//!
//! A [`Relay`] owns both sockets, the registry of in-flight requests and one
//! timer queue carrying retry and query-timeout timers. It is driven by three
//! events: the client socket is readable, the resolver socket is readable, a
//! timer expired. Nothing here blocks or awaits except [`Relay::next_timer`].

mod ingress;
mod sender;

use ferrous_proxy_domain::{DomainError, RelayConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::time::DelayQueue;
use tracing::debug;

use super::registry::RequestRegistry;
use super::request::{Request, RequestId, RequestState, SocketRole};
use super::socket::DatagramSocket;
use crate::dns::wire::DNS_MAX_PACKET_SIZE_UDP;
use crate::dns::{EdnsSection, EnvelopeOverhead, OptRecordAppender};

pub use sender::SendStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Retry(RequestId),
    Timeout(RequestId),
}

/// Result of servicing one readiness event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A datagram was consumed (or the read was interrupted); read again.
    Handled,
    /// Nothing left to read, or the socket reported an error.
    Drained,
}

pub struct Relay<S: DatagramSocket> {
    listener: S,
    resolver: Option<S>,
    resolver_addr: SocketAddr,
    registry: RequestRegistry,
    timers: DelayQueue<TimerEvent>,
    edns: Box<dyn EdnsSection>,
    envelope: EnvelopeOverhead,
    query_timeout: Duration,
    retry_delay: Duration,
    tcp_only: bool,
    recv_buf: Box<[u8]>,
}

impl<S: DatagramSocket> Relay<S> {
    pub fn new(listener: S, resolver: S, resolver_addr: SocketAddr, config: &RelayConfig) -> Self {
        Self {
            listener,
            resolver: Some(resolver),
            resolver_addr,
            registry: RequestRegistry::new(config.max_connections),
            timers: DelayQueue::new(),
            edns: Box::new(OptRecordAppender::new(config.edns_payload_size)),
            envelope: EnvelopeOverhead::default(),
            query_timeout: config.query_timeout(),
            retry_delay: config.retry_delay(),
            tcp_only: config.tcp_only,
            recv_buf: vec![0u8; DNS_MAX_PACKET_SIZE_UDP + 1].into_boxed_slice(),
        }
    }

    pub fn with_registry(mut self, registry: RequestRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_edns(mut self, edns: Box<dyn EdnsSection>) -> Self {
        self.edns = edns;
        self
    }

    pub fn with_envelope(mut self, envelope: EnvelopeOverhead) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.registry.get(id)
    }

    pub fn live(&self) -> usize {
        self.registry.live()
    }

    /// Retry and timeout timers currently armed.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn resolver_addr(&self) -> SocketAddr {
        self.resolver_addr
    }

    pub fn listener_socket(&self) -> &S {
        &self.listener
    }

    /// `None` once [`Relay::take_resolver`] has run.
    pub fn resolver_socket(&self) -> Option<&S> {
        self.resolver.as_ref()
    }

    /// Hands the resolver-facing socket back to the caller. Replies are no
    /// longer read and sends to the resolver fail from then on.
    pub fn take_resolver(&mut self) -> Option<S> {
        self.resolver.take()
    }

    fn socket(&self, role: SocketRole) -> Option<&S> {
        match role {
            SocketRole::Listener => Some(&self.listener),
            SocketRole::Resolver => self.resolver.as_ref(),
        }
    }

    /// Registers `request`, evicting the oldest one first when the registry
    /// is full, and arms its query timeout.
    pub fn admit(&mut self, request: Request) -> RequestId {
        if self.registry.is_full() {
            if let Err(e) = self.evict_oldest() {
                debug!(error = %e, "Registry full but nothing to evict");
            }
        }

        let id = self.registry.admit(request);
        let key = self.timers.insert(TimerEvent::Timeout(id), self.query_timeout);
        if let Some(request) = self.registry.get_mut(id) {
            request.timeout_timer = Some(key);
        }
        debug_assert!(self.registry.live() <= self.registry.capacity().max(1));
        id
    }

    /// Destroys the oldest registered request.
    pub fn evict_oldest(&mut self) -> Result<RequestId, DomainError> {
        let id = self.registry.oldest_id().ok_or(DomainError::RegistryEmpty)?;
        debug!(request = %id, live = self.registry.live(), "Evicting oldest UDP request");
        self.destroy(id);
        Ok(id)
    }

    /// Tears a request down: cancels its timers, releases the pending send
    /// and removes it from the registry.
    ///
    /// Returns `false` when the request is unknown or already dying.
    pub fn destroy(&mut self, id: RequestId) -> bool {
        let Some(request) = self.registry.get_mut(id) else {
            return false;
        };
        if request.is_dying() {
            return false;
        }
        request.set_state(RequestState::Dying);

        if let Some(timer) = request.retry_timer.take() {
            if let Some(key) = timer.key {
                self.timers.remove(&key);
            }
        }
        if let Some(key) = request.timeout_timer.take() {
            self.timers.remove(&key);
        }

        self.registry.remove(id);
        true
    }

    /// Destroys every registered request, oldest first. Returns how many.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.evict_oldest().is_ok() {
            drained += 1;
        }
        drained
    }

    /// Waits for the next retry or timeout timer. Resolves to `None` at once
    /// when no timer is armed.
    pub async fn next_timer(&mut self) -> Option<TimerEvent> {
        std::future::poll_fn(|cx| self.timers.poll_expired(cx))
            .await
            .map(|expired| expired.into_inner())
    }

    /// Runs the action of an expired timer.
    pub fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Retry(id) => self.retry(id),
            TimerEvent::Timeout(id) => {
                if let Some(request) = self.registry.get_mut(id) {
                    request.timeout_timer = None;
                }
                debug!(request = %id, "UDP request timed out");
                self.destroy(id);
            }
        }
    }
}
