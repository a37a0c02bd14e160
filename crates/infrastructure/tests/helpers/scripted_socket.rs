#![allow(dead_code)]
use ferrous_proxy_infrastructure::udp::DatagramSocket;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory socket: datagrams to read are queued by the test, sends can be
/// made to fail with a chosen errno.
#[derive(Default)]
pub struct ScriptedSocket {
    inbox: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    send_errors: Mutex<VecDeque<i32>>,
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    attempts: AtomicUsize,
}

impl ScriptedSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_datagram(&self, data: &[u8], from: SocketAddr) {
        self.inbox.lock().unwrap().push_back((data.to_vec(), from));
    }

    /// The next `times` sends fail with `errno`.
    pub fn fail_next_sends(&self, errno: i32, times: usize) {
        let mut errors = self.send_errors.lock().unwrap();
        for _ in 0..times {
            errors.push_back(errno);
        }
    }

    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl DatagramSocket for ScriptedSocket {
    fn try_send_to(&self, buf: &[u8], target: SocketAddr, _flags: i32) -> io::Result<usize> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(errno) = self.send_errors.lock().unwrap().pop_front() {
            return Err(io::Error::from_raw_os_error(errno));
        }
        self.sent.lock().unwrap().push((buf.to_vec(), target));
        Ok(buf.len())
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let Some((data, from)) = self.inbox.lock().unwrap().pop_front() else {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        };
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok((len, from))
    }
}
