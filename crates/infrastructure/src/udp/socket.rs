use socket2::{SockAddr, SockRef};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use tokio::io::unix::AsyncFd;

/// Non-blocking datagram I/O used by the relay.
///
/// Both calls must return `ErrorKind::WouldBlock` instead of waiting.
pub trait DatagramSocket {
    fn try_send_to(&self, buf: &[u8], target: SocketAddr, flags: libc::c_int)
        -> io::Result<usize>;

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl DatagramSocket for UdpSocket {
    fn try_send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
        flags: libc::c_int,
    ) -> io::Result<usize> {
        SockRef::from(self).send_to_with_flags(buf, &SockAddr::from(target), flags)
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf)
    }
}

impl<T: DatagramSocket + std::os::fd::AsRawFd> DatagramSocket for AsyncFd<T> {
    fn try_send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
        flags: libc::c_int,
    ) -> io::Result<usize> {
        self.get_ref().try_send_to(buf, target, flags)
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.get_ref().try_recv_from(buf)
    }
}

impl<T: DatagramSocket + ?Sized> DatagramSocket for Arc<T> {
    fn try_send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
        flags: libc::c_int,
    ) -> io::Result<usize> {
        (**self).try_send_to(buf, target, flags)
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        (**self).try_recv_from(buf)
    }
}

/// Send errors worth another attempt: EAGAIN/EWOULDBLOCK, EINTR, ENOBUFS and
/// ENOMEM.
pub fn is_retriable(err: &io::Error) -> bool {
    match err.raw_os_error() {
        Some(code) => {
            code == libc::EAGAIN
                || code == libc::EWOULDBLOCK
                || code == libc::EINTR
                || code == libc::ENOBUFS
                || code == libc::ENOMEM
        }
        None => matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::OutOfMemory
        ),
    }
}
