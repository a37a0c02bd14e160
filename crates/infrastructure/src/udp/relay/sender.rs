use ferrous_proxy_domain::DomainError;
use std::io;
use tracing::{debug, trace, warn};

use super::{Relay, TimerEvent};
use crate::dns::wire::DNS_QUERY_TIMEOUT;
use crate::udp::request::{Completion, RequestId, RetryTimer, SendOp};
use crate::udp::socket::{is_retriable, DatagramSocket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Every byte left; the completion already ran.
    Sent,
    /// A transient error deferred the send to the retry timer.
    RetryScheduled,
}

impl<S: DatagramSocket> Relay<S> {
    /// Attempts `op` once without blocking.
    ///
    /// A full send releases any retry timer of the request before running the
    /// completion. A transient failure arms the single retry timer of the
    /// request; once the retry budget is spent, or on any other failure, the
    /// request is destroyed.
    pub fn send(&mut self, op: SendOp) -> Result<SendStatus, DomainError> {
        if !self.registry.contains(op.request) {
            return Err(DomainError::RequestNotFound(op.request.0));
        }

        let Some(socket) = self.socket(op.socket) else {
            self.destroy(op.request);
            return Err(DomainError::SendFailed {
                target: op.dest.to_string(),
                reason: "socket closed".to_string(),
            });
        };

        match socket.try_send_to(&op.buffer, op.dest, op.flags) {
            Ok(sent) if sent == op.len() => {
                self.complete(op);
                Ok(SendStatus::Sent)
            }
            Ok(sent) => {
                let err = io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short send: {} of {} bytes", sent, op.len()),
                );
                self.fail(op, err)
            }
            Err(e) => self.fail(op, e),
        }
    }

    /// Timer path: re-attempts the send held by the request's retry timer.
    pub(super) fn retry(&mut self, id: RequestId) {
        let Some(request) = self.registry.get_mut(id) else {
            return;
        };
        let Some(timer) = request.retry_timer.as_mut() else {
            return;
        };
        timer.key = None;
        let op = timer.op.clone();

        trace!(request = %id, retries = request.retries(), "Retrying send");
        if let Err(e) = self.send(op) {
            debug!(request = %id, error = %e, "Retried send abandoned");
        }
    }

    fn complete(&mut self, op: SendOp) {
        self.release_retry_timer(op.request);

        match op.completion {
            Completion::AwaitReply => {
                trace!(request = %op.request, dest = %op.dest, bytes = op.len(), "Query forwarded");
            }
            Completion::Retire => {
                trace!(request = %op.request, dest = %op.dest, bytes = op.len(), "Reply delivered");
                self.destroy(op.request);
            }
        }
    }

    fn fail(&mut self, op: SendOp, err: io::Error) -> Result<SendStatus, DomainError> {
        warn!(request = %op.request, dest = %op.dest, error = %err, "sendto failed");

        if !is_retriable(&err) {
            self.destroy(op.request);
            return Err(DomainError::SendFailed {
                target: op.dest.to_string(),
                reason: err.to_string(),
            });
        }

        let Some(request) = self.registry.get_mut(op.request) else {
            return Err(DomainError::RequestNotFound(op.request.0));
        };
        let retries = request.record_retry();
        if retries > DNS_QUERY_TIMEOUT {
            self.destroy(op.request);
            return Err(DomainError::RetryBudgetExhausted {
                target: op.dest.to_string(),
                retries: DNS_QUERY_TIMEOUT,
            });
        }

        self.arm_retry(op);
        Ok(SendStatus::RetryScheduled)
    }

    fn arm_retry(&mut self, op: SendOp) {
        let id = op.request;
        let delay = self.retry_delay;
        let Some(request) = self.registry.get_mut(id) else {
            return;
        };

        match request.retry_timer.as_mut() {
            Some(timer) => {
                if !timer.op.same_operation(&op) {
                    debug!(request = %id, "Pending retry superseded by a new send");
                    timer.op = op;
                }
                match timer.key {
                    Some(ref key) => self.timers.reset(key, delay),
                    None => timer.key = Some(self.timers.insert(TimerEvent::Retry(id), delay)),
                }
            }
            None => {
                let key = self.timers.insert(TimerEvent::Retry(id), delay);
                request.retry_timer = Some(RetryTimer { key: Some(key), op });
            }
        }
    }

    fn release_retry_timer(&mut self, id: RequestId) {
        let Some(request) = self.registry.get_mut(id) else {
            return;
        };
        if let Some(timer) = request.retry_timer.take() {
            if let Some(key) = timer.key {
                self.timers.remove(&key);
            }
        }
    }
}
