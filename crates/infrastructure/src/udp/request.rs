use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;
use tokio_util::time::delay_queue;

/// Stable handle of an in-flight request. Never reused while the relay runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Allocated, not yet tracked by the registry.
    Active,
    InRegistry,
    /// Teardown in progress; every further teardown is a no-op.
    Dying,
}

/// Which of the two relay sockets a datagram goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketRole {
    /// Client-facing socket.
    Listener,
    /// Resolver-facing socket.
    Resolver,
}

/// What happens to the request once a send fully completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Query forwarded; the request stays registered until the reply.
    AwaitReply,
    /// Reply delivered to the client; the request is destroyed.
    Retire,
}

/// One `sendto` attempt, owned by the retry timer while it waits.
#[derive(Debug, Clone)]
pub struct SendOp {
    pub request: RequestId,
    pub socket: SocketRole,
    pub dest: SocketAddr,
    pub buffer: Bytes,
    pub flags: libc::c_int,
    pub completion: Completion,
}

impl SendOp {
    pub fn new(
        request: RequestId,
        socket: SocketRole,
        dest: SocketAddr,
        buffer: Bytes,
        completion: Completion,
    ) -> Self {
        Self {
            request,
            socket,
            dest,
            buffer,
            flags: 0,
            completion,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Same request, same bytes, same completion: a re-attempt of this send.
    pub fn same_operation(&self, other: &SendOp) -> bool {
        self.request == other.request
            && self.buffer == other.buffer
            && self.completion == other.completion
    }
}

/// A retry timer and the send it re-attempts. `key` is `None` once the timer
/// fired and until it is re-armed.
#[derive(Debug)]
pub(crate) struct RetryTimer {
    pub(crate) key: Option<delay_queue::Key>,
    pub(crate) op: SendOp,
}

/// State tracked for one client query.
#[derive(Debug)]
pub struct Request {
    client_addr: SocketAddr,
    ingress: SocketRole,
    retries: u8,
    state: RequestState,
    pub(crate) retry_timer: Option<RetryTimer>,
    pub(crate) timeout_timer: Option<delay_queue::Key>,
}

impl Request {
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            client_addr,
            ingress: SocketRole::Listener,
            retries: 0,
            state: RequestState::Active,
            retry_timer: None,
            timeout_timer: None,
        }
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn ingress(&self) -> SocketRole {
        self.ingress
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_dying(&self) -> bool {
        self.state == RequestState::Dying
    }

    pub fn has_retry_timer(&self) -> bool {
        self.retry_timer.is_some()
    }

    pub fn has_timeout_timer(&self) -> bool {
        self.timeout_timer.is_some()
    }

    pub(crate) fn set_state(&mut self, state: RequestState) {
        self.state = state;
    }

    /// Counts one more failed attempt and returns the new total.
    pub(crate) fn record_retry(&mut self) -> u8 {
        self.retries = self.retries.saturating_add(1);
        self.retries
    }
}
