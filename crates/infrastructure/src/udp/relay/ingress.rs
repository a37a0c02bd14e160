use bytes::{Bytes, BytesMut};
use std::io;
use tracing::{debug, trace, warn};

use super::{ReadOutcome, Relay};
use crate::dns::wire::{
    self, DNS_HEADER_SIZE, DNS_MAX_PACKET_SIZE_UDP, DNS_MAX_PACKET_SIZE_UDP_SEND,
};
use crate::udp::request::{Completion, Request, RequestId, SocketRole, SendOp};
use crate::udp::socket::DatagramSocket;

impl<S: DatagramSocket> Relay<S> {
    /// Reads one query from the client-facing socket and either forwards it
    /// to the resolver or answers it with a truncated reply.
    pub fn handle_client_datagram(&mut self) -> ReadOutcome {
        let (len, client_addr) = match self.listener.try_recv_from(&mut self.recv_buf) {
            Ok(received) => received,
            Err(e) => return read_failure(e, "client"),
        };

        if len < DNS_HEADER_SIZE || len > DNS_MAX_PACKET_SIZE_UDP {
            warn!(client = %client_addr, len, "Short or oversized query received");
            return ReadOutcome::Handled;
        }

        let mut query = BytesMut::from(&self.recv_buf[..len]);
        let id = self.admit(Request::new(client_addr));
        trace!(request = %id, client = %client_addr, len, "Query received");

        let edns_payload_size = self.edns.add_section(&mut query, DNS_MAX_PACKET_SIZE_UDP);
        let max_query_size = edns_payload_size
            .max(DNS_MAX_PACKET_SIZE_UDP_SEND)
            .min(DNS_MAX_PACKET_SIZE_UDP);

        if self.tcp_only {
            self.send_truncated(id, query);
            return ReadOutcome::Handled;
        }

        if !self.envelope.fits(query.len(), max_query_size) {
            debug!(request = %id, len = query.len(), max_query_size, "Query too large for UDP, truncating");
            self.send_truncated(id, query);
            return ReadOutcome::Handled;
        }

        let op = SendOp::new(
            id,
            SocketRole::Resolver,
            self.resolver_addr,
            query.freeze(),
            Completion::AwaitReply,
        );
        if let Err(e) = self.send(op) {
            debug!(request = %id, error = %e, "Query not forwarded");
        }
        ReadOutcome::Handled
    }

    /// Reads one reply from the resolver-facing socket and relays it to the
    /// client of the oldest outstanding request.
    pub fn handle_resolver_datagram(&mut self) -> ReadOutcome {
        let Some(resolver) = self.resolver.as_ref() else {
            return ReadOutcome::Drained;
        };
        let (len, from) = match resolver.try_recv_from(&mut self.recv_buf) {
            Ok(received) => received,
            Err(e) => return read_failure(e, "resolver"),
        };

        if from != self.resolver_addr {
            warn!(
                expected = %self.resolver_addr,
                received_from = %from,
                "Received a resolver reply from a different resolver"
            );
            return ReadOutcome::Handled;
        }

        // Replies are not matched by transaction id or client: the oldest
        // outstanding request receives whatever the resolver sends next. With
        // several queries in flight a reply can reach the wrong client.
        let Some((id, request)) = self.registry.oldest() else {
            debug!(len, "Resolver reply with no outstanding request");
            return ReadOutcome::Handled;
        };
        let (socket, client_addr) = (request.ingress(), request.client_addr());

        let op = SendOp::new(
            id,
            socket,
            client_addr,
            Bytes::copy_from_slice(&self.recv_buf[..len]),
            Completion::Retire,
        );
        if let Err(e) = self.send(op) {
            debug!(request = %id, error = %e, "Reply not relayed");
        }
        ReadOutcome::Handled
    }

    /// Answers the request with its own query flagged QR, TC and RA, then
    /// retires it.
    pub fn send_truncated(&mut self, id: RequestId, mut reply: BytesMut) {
        if !wire::set_truncated(&mut reply) {
            self.destroy(id);
            return;
        }
        let Some(request) = self.registry.get(id) else {
            return;
        };

        let op = SendOp::new(
            id,
            request.ingress(),
            request.client_addr(),
            reply.freeze(),
            Completion::Retire,
        );
        if let Err(e) = self.send(op) {
            debug!(request = %id, error = %e, "Truncated reply not sent");
        }
    }
}

fn read_failure(err: io::Error, peer: &str) -> ReadOutcome {
    match err.kind() {
        io::ErrorKind::WouldBlock => ReadOutcome::Drained,
        io::ErrorKind::Interrupted => ReadOutcome::Handled,
        _ => {
            warn!(peer, error = %err, "recvfrom failed");
            ReadOutcome::Drained
        }
    }
}
